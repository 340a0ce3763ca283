use std::fmt::Debug;

use crate::error::{GeneticError, Result};
use crate::rng::RandomNumberGenerator;

/// Trait for parent-selection policies used by recombination tasks.
///
/// A selector only sees the fitness values of the pool, in pool order
/// (ascending, best first), and returns the positions of the mother and
/// father. Lower fitness is better.
///
/// # Examples
///
/// ```
/// use genpool::selection::{ParentSelector, TournamentSelection};
/// use genpool::rng::RandomNumberGenerator;
/// use genpool::error::Result;
///
/// fn main() -> Result<()> {
///     let fitness = vec![-3.0, -2.5, -1.0, 0.5];
///     let mut rng = RandomNumberGenerator::from_seed(3);
///
///     let selection = TournamentSelection::new(2)?;
///     let (mother, father) = selection.select_parents(&fitness, &mut rng)?;
///
///     assert_ne!(mother, father);
///     assert!(mother < fitness.len() && father < fitness.len());
///     Ok(())
/// }
/// ```
pub trait ParentSelector: Debug + Send + Sync {
    /// Selects two distinct positions from `fitness`.
    ///
    /// # Errors
    ///
    /// Returns an error if fewer than two individuals are available.
    fn select_parents(
        &self,
        fitness: &[f64],
        rng: &mut RandomNumberGenerator,
    ) -> Result<(usize, usize)>;
}

pub(crate) fn ensure_two(fitness: &[f64]) -> Result<()> {
    match fitness.len() {
        0 => Err(GeneticError::EmptyPopulation),
        1 => Err(GeneticError::Evolution(
            "At least two individuals are needed to select parents".to_string(),
        )),
        _ => Ok(()),
    }
}
