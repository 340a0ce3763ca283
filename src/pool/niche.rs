//! Niche partitioning.
//!
//! A niche is a named diversity bucket. When niching is enabled every
//! individual is assigned to exactly one niche when it enters the pool and
//! each niche holds a bounded number of entries, which keeps a single basin
//! from taking over the whole population.

use std::collections::HashMap;
use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::error::{GeneticError, Result};
use crate::individual::Optimizable;

/// A string-keyed diversity bucket with an optional explicit capacity.
///
/// Without an explicit capacity the pool-wide limit
/// (`PoolConfig::max_per_niche`) applies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Niche {
    id: String,
    capacity: Option<usize>,
}

impl Niche {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            capacity: None,
        }
    }

    pub fn with_capacity(id: impl Into<String>, capacity: usize) -> Self {
        Self {
            id: id.into(),
            capacity: Some(capacity),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}

/// Assigns individuals to niches.
///
/// Implementations may be stateful and expensive, so they are cached per
/// worker like any other helper and get `&mut self`.
pub trait NicheComputer<I: Optimizable>: Debug + Send + Sync {
    fn compute_niche(&mut self, individual: &I) -> Result<Niche>;

    /// Duplicates this computer into a new box.
    fn clone_box(&self) -> Box<dyn NicheComputer<I>>;
}

impl<I: Optimizable> Clone for Box<dyn NicheComputer<I>> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Buckets individuals by fitness into bins of equal width.
///
/// Mostly useful as a baseline and in tests; real applications usually
/// bucket on structural descriptors of the payload.
#[derive(Debug, Clone)]
pub struct FitnessBinNiches {
    width: f64,
    capacity: Option<usize>,
}

impl FitnessBinNiches {
    /// # Errors
    ///
    /// Returns a `GeneticError::Configuration` error if `width` is not a
    /// positive finite number.
    pub fn new(width: f64) -> Result<Self> {
        if !(width.is_finite() && width > 0.0) {
            return Err(GeneticError::Configuration(format!(
                "Niche bin width must be positive and finite, got {}",
                width
            )));
        }
        Ok(Self {
            width,
            capacity: None,
        })
    }

    /// Gives every bin an explicit capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }
}

impl<I: Optimizable> NicheComputer<I> for FitnessBinNiches {
    fn compute_niche(&mut self, individual: &I) -> Result<Niche> {
        let fitness = individual.fitness();
        if !fitness.is_finite() {
            return Err(GeneticError::InvalidNumericValue(format!(
                "Cannot bin individual {} with fitness {}",
                individual.id(),
                fitness
            )));
        }
        let bin = (fitness / self.width).floor() as i64;
        Ok(Niche {
            id: format!("bin{}", bin),
            capacity: self.capacity,
        })
    }

    fn clone_box(&self) -> Box<dyn NicheComputer<I>> {
        Box::new(self.clone())
    }
}

/// Occupancy count per niche id.
#[derive(Debug, Clone, Default)]
pub struct NicheCensus {
    counts: HashMap<String, usize>,
}

impl NicheCensus {
    pub fn count(&self, niche_id: &str) -> usize {
        self.counts.get(niche_id).copied().unwrap_or(0)
    }

    pub fn report(&mut self, niche_id: &str) {
        *self.counts.entry(niche_id.to_string()).or_insert(0) += 1;
    }

    pub fn remove(&mut self, niche_id: &str) {
        if let Some(count) = self.counts.get_mut(niche_id) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.counts.remove(niche_id);
            }
        }
    }

    pub fn clear(&mut self) {
        self.counts.clear();
    }

    /// Occupied niches sorted by id.
    pub fn populations(&self) -> Vec<(String, usize)> {
        let mut pops: Vec<(String, usize)> =
            self.counts.iter().map(|(k, v)| (k.clone(), *v)).collect();
        pops.sort();
        pops
    }
}
