pub mod random;
pub mod rank;
pub mod selection_strategy;
pub mod tournament;

pub use random::RandomSelection;
pub use rank::RankBasedSelection;
pub use selection_strategy::ParentSelector;
pub use tournament::TournamentSelection;
