use std::fmt::Debug;

use crate::individual::Optimizable;

/// Decides whether two individuals are different enough to coexist in a
/// non-niched pool.
///
/// On insertion the newcomer is compared with its better neighbour (not
/// diverse: rejected) and then with its worse neighbour (not diverse: the
/// neighbour is replaced).
pub trait DiversityChecker<I: Optimizable>: Debug + Send + Sync {
    fn are_diverse(&self, a: &I, b: &I) -> bool;
}

/// Two individuals are diverse when their fitness differs by more than
/// `threshold`.
#[derive(Debug, Clone, Copy)]
pub struct FitnessDiversity {
    threshold: f64,
}

impl FitnessDiversity {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.abs(),
        }
    }
}

impl<I: Optimizable> DiversityChecker<I> for FitnessDiversity {
    fn are_diverse(&self, a: &I, b: &I) -> bool {
        (a.fitness() - b.fitness()).abs() > self.threshold
    }
}
