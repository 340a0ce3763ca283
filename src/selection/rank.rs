use crate::error::{GeneticError, Result};
use crate::rng::RandomNumberGenerator;
use crate::selection::selection_strategy::{ensure_two, ParentSelector};

/// Selects parents with linear ranking.
///
/// Each individual gets a selection probability based on its rank rather
/// than on its absolute fitness, which keeps a few outstanding individuals
/// from dominating the offspring. Works with negative fitness values.
///
/// # Examples
///
/// ```
/// use genpool::selection::{ParentSelector, RankBasedSelection};
/// use genpool::rng::RandomNumberGenerator;
///
/// let selection = RankBasedSelection::new(1.8).unwrap();
/// let mut rng = RandomNumberGenerator::from_seed(11);
/// let (m, f) = selection.select_parents(&[-2.0, -1.0, 4.0], &mut rng).unwrap();
/// assert_ne!(m, f);
/// ```
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RankBasedSelection {
    /// Higher values increase selection pressure.
    selection_pressure: f64,
}

impl RankBasedSelection {
    /// Creates a new RankBasedSelection strategy.
    ///
    /// At a pressure of 1.0 every individual is equally likely; at 2.0 the
    /// worst individual is never chosen.
    ///
    /// # Errors
    ///
    /// Returns a `GeneticError::Configuration` error if `selection_pressure`
    /// is not in the range [1.0, 2.0].
    pub fn new(selection_pressure: f64) -> Result<Self> {
        if !(1.0..=2.0).contains(&selection_pressure) {
            return Err(GeneticError::Configuration(
                "Selection pressure must be in the range [1.0, 2.0]".to_string(),
            ));
        }

        Ok(Self { selection_pressure })
    }

    /// Selection probability of every position, best rank first.
    fn probabilities(&self, fitness: &[f64]) -> Vec<f64> {
        let n = fitness.len();
        let mut indices: Vec<usize> = (0..n).collect();
        indices.sort_by(|&a, &b| {
            let (fa, fb) = (fitness[a], fitness[b]);
            if fa.is_nan() {
                return std::cmp::Ordering::Greater;
            }
            if fb.is_nan() {
                return std::cmp::Ordering::Less;
            }
            fa.partial_cmp(&fb).unwrap_or(std::cmp::Ordering::Equal)
        });

        let n_f = n as f64;
        let s = self.selection_pressure;
        let mut probs = vec![0.0; n];
        for (rank, &idx) in indices.iter().enumerate() {
            let reverse_rank = (n - 1 - rank) as f64;
            probs[idx] = (2.0 - s) / n_f + 2.0 * reverse_rank * (s - 1.0) / (n_f * (n_f - 1.0));
        }
        probs
    }

    fn spin(probs: &[f64], rng: &mut RandomNumberGenerator, excluded: Option<usize>) -> usize {
        let total: f64 = probs
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != excluded)
            .map(|(_, p)| p)
            .sum();
        let target = rng.gen_unit() * total;

        let mut cumulative = 0.0;
        let mut last_eligible = 0;
        for (i, p) in probs.iter().enumerate() {
            if Some(i) == excluded {
                continue;
            }
            last_eligible = i;
            cumulative += p;
            if target < cumulative {
                return i;
            }
        }
        // Rounding can leave `target` just above the final cumulative sum.
        last_eligible
    }
}

impl Default for RankBasedSelection {
    fn default() -> Self {
        Self {
            selection_pressure: 1.5,
        }
    }
}

impl ParentSelector for RankBasedSelection {
    fn select_parents(
        &self,
        fitness: &[f64],
        rng: &mut RandomNumberGenerator,
    ) -> Result<(usize, usize)> {
        ensure_two(fitness)?;
        let probs = self.probabilities(fitness);
        let mother = Self::spin(&probs, rng, None);
        let father = Self::spin(&probs, rng, Some(mother));
        Ok((mother, father))
    }
}
