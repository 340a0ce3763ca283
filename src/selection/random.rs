use crate::error::Result;
use crate::rng::RandomNumberGenerator;
use crate::selection::selection_strategy::{ensure_two, ParentSelector};

/// Picks two distinct parents uniformly at random, ignoring fitness.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct RandomSelection;

impl ParentSelector for RandomSelection {
    fn select_parents(
        &self,
        fitness: &[f64],
        rng: &mut RandomNumberGenerator,
    ) -> Result<(usize, usize)> {
        ensure_two(fitness)?;
        let n = fitness.len();
        let mother = rng.gen_index(n);
        // Draw from the n - 1 remaining positions and skip over the mother.
        let mut father = rng.gen_index(n - 1);
        if father >= mother {
            father += 1;
        }
        Ok((mother, father))
    }
}
