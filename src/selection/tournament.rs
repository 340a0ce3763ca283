use crate::error::{GeneticError, Result};
use crate::rng::RandomNumberGenerator;
use crate::selection::selection_strategy::{ensure_two, ParentSelector};

/// Selects parents through tournament selection.
///
/// Each parent is the best of `tournament_size` uniformly drawn contestants.
/// The father's tournament excludes the mother so the two parents are always
/// distinct individuals.
///
/// Smaller tournaments favour exploration, larger ones exploitation.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TournamentSelection {
    tournament_size: usize,
}

impl TournamentSelection {
    /// Creates a new TournamentSelection strategy.
    ///
    /// # Errors
    ///
    /// Returns an error if `tournament_size` is 0.
    pub fn new(tournament_size: usize) -> Result<Self> {
        if tournament_size < 1 {
            return Err(GeneticError::Configuration(
                "Tournament size must be at least 1".to_string(),
            ));
        }

        Ok(Self { tournament_size })
    }

    pub fn tournament_size(&self) -> usize {
        self.tournament_size
    }

    /// Runs a single tournament and returns the index of the winner,
    /// never picking `excluded`.
    fn run_tournament(
        &self,
        fitness: &[f64],
        rng: &mut RandomNumberGenerator,
        excluded: Option<usize>,
    ) -> Result<usize> {
        let eligible: Vec<usize> = (0..fitness.len())
            .filter(|i| Some(*i) != excluded)
            .collect();

        if eligible.is_empty() {
            return Err(GeneticError::Configuration(
                "No eligible individuals for tournament selection".to_string(),
            ));
        }

        let mut best_idx = eligible[rng.gen_index(eligible.len())];
        for _ in 1..self.tournament_size {
            let idx = eligible[rng.gen_index(eligible.len())];
            if fitness[idx] < fitness[best_idx] {
                best_idx = idx;
            }
        }

        Ok(best_idx)
    }
}

impl Default for TournamentSelection {
    fn default() -> Self {
        Self { tournament_size: 2 }
    }
}

impl ParentSelector for TournamentSelection {
    fn select_parents(
        &self,
        fitness: &[f64],
        rng: &mut RandomNumberGenerator,
    ) -> Result<(usize, usize)> {
        ensure_two(fitness)?;
        let mother = self.run_tournament(fitness, rng, None)?;
        let father = self.run_tournament(fitness, rng, Some(mother))?;
        Ok((mother, father))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tournament_selects_distinct_parents() {
        let fitness = vec![0.1, 0.3, 0.5, 0.8, 0.9];
        let mut rng = RandomNumberGenerator::from_seed(42);
        let selection = TournamentSelection::default();

        for _ in 0..200 {
            let (m, f) = selection.select_parents(&fitness, &mut rng).unwrap();
            assert_ne!(m, f);
            assert!(m < fitness.len());
            assert!(f < fitness.len());
        }
    }

    #[test]
    fn test_full_tournament_prefers_lowest_fitness() {
        let fitness = vec![-5.0, -4.0, -1.0];
        let mut rng = RandomNumberGenerator::from_seed(7);
        // Large tournaments almost surely contain the best individual.
        let selection = TournamentSelection::new(64).unwrap();

        let (m, f) = selection.select_parents(&fitness, &mut rng).unwrap();
        assert_eq!(m, 0);
        assert_eq!(f, 1);
    }

    #[test]
    fn test_two_individuals_always_both_selected() {
        let fitness = vec![1.0, 2.0];
        let mut rng = RandomNumberGenerator::from_seed(1);
        let selection = TournamentSelection::new(3).unwrap();

        let (m, f) = selection.select_parents(&fitness, &mut rng).unwrap();
        assert_eq!(m + f, 1);
    }

    #[test]
    fn test_too_small_population() {
        let mut rng = RandomNumberGenerator::from_seed(1);
        let selection = TournamentSelection::default();

        assert!(matches!(
            selection.select_parents(&[], &mut rng),
            Err(GeneticError::EmptyPopulation)
        ));
        assert!(selection.select_parents(&[1.0], &mut rng).is_err());
    }

    #[test]
    fn test_tournament_selection_invalid_size() {
        assert!(TournamentSelection::new(0).is_err());
    }
}
