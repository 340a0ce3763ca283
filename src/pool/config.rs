//! # PoolConfig
//!
//! Capacity, acceptance target, niche limit and checkpoint cadence of a
//! [`Pool`](crate::pool::Pool).
//!
//! ## Example
//!
//! ```rust
//! use genpool::pool::PoolConfig;
//!
//! let config = PoolConfig::builder()
//!     .capacity(50)
//!     .acceptable_fitness(-120.0)
//!     .max_per_niche(5)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.capacity(), 50);
//! assert_eq!(config.adds_to_checkpoint(), 1000);
//! ```

use std::path::{Path, PathBuf};

use crate::error::{GeneticError, Result};

#[derive(Debug, Clone)]
pub struct PoolConfig {
    capacity: usize,
    acceptable_fitness: f64,
    max_per_niche: usize,
    adds_to_checkpoint: usize,
    checkpoint_after_new_best: bool,
    checkpoint_path: Option<PathBuf>,
    adds_to_stats: usize,
}

impl PoolConfig {
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::default()
    }

    /// Maximum number of retained entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Fitness at or below which the run may stop early.
    pub fn acceptable_fitness(&self) -> f64 {
        self.acceptable_fitness
    }

    /// Occupancy limit of a niche that carries no explicit capacity.
    pub fn max_per_niche(&self) -> usize {
        self.max_per_niche
    }

    /// Number of insertions between two automatic checkpoints.
    pub fn adds_to_checkpoint(&self) -> usize {
        self.adds_to_checkpoint
    }

    pub fn checkpoint_after_new_best(&self) -> bool {
        self.checkpoint_after_new_best
    }

    /// Where automatic checkpoints go. `None` disables them.
    pub fn checkpoint_path(&self) -> Option<&Path> {
        self.checkpoint_path.as_deref()
    }

    /// Number of gated insertions between two niche population reports.
    pub fn adds_to_stats(&self) -> usize {
        self.adds_to_stats
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            acceptable_fitness: f64::NEG_INFINITY,
            max_per_niche: 1000,
            adds_to_checkpoint: 1000,
            checkpoint_after_new_best: false,
            checkpoint_path: None,
            adds_to_stats: 10000,
        }
    }
}

/// Builder for `PoolConfig`.
#[derive(Debug, Clone, Default)]
pub struct PoolConfigBuilder {
    capacity: Option<usize>,
    acceptable_fitness: Option<f64>,
    max_per_niche: Option<usize>,
    adds_to_checkpoint: Option<usize>,
    checkpoint_after_new_best: Option<bool>,
    checkpoint_path: Option<PathBuf>,
    adds_to_stats: Option<usize>,
}

impl PoolConfigBuilder {
    pub fn capacity(mut self, value: usize) -> Self {
        self.capacity = Some(value);
        self
    }

    pub fn acceptable_fitness(mut self, value: f64) -> Self {
        self.acceptable_fitness = Some(value);
        self
    }

    /// Defaults to the pool capacity, i.e. no extra per-niche limit.
    pub fn max_per_niche(mut self, value: usize) -> Self {
        self.max_per_niche = Some(value);
        self
    }

    pub fn adds_to_checkpoint(mut self, value: usize) -> Self {
        self.adds_to_checkpoint = Some(value);
        self
    }

    pub fn checkpoint_after_new_best(mut self, value: bool) -> Self {
        self.checkpoint_after_new_best = Some(value);
        self
    }

    pub fn checkpoint_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.checkpoint_path = Some(path.into());
        self
    }

    pub fn adds_to_stats(mut self, value: usize) -> Self {
        self.adds_to_stats = Some(value);
        self
    }

    /// Builds the `PoolConfig` instance.
    ///
    /// # Errors
    ///
    /// Returns a `GeneticError::Configuration` error for a zero capacity,
    /// a zero checkpoint or statistics interval, or a NaN acceptable fitness.
    pub fn build(self) -> Result<PoolConfig> {
        let defaults = PoolConfig::default();
        let capacity = self.capacity.unwrap_or(defaults.capacity);
        let config = PoolConfig {
            capacity,
            acceptable_fitness: self.acceptable_fitness.unwrap_or(defaults.acceptable_fitness),
            max_per_niche: self.max_per_niche.unwrap_or(capacity),
            adds_to_checkpoint: self.adds_to_checkpoint.unwrap_or(defaults.adds_to_checkpoint),
            checkpoint_after_new_best: self
                .checkpoint_after_new_best
                .unwrap_or(defaults.checkpoint_after_new_best),
            checkpoint_path: self.checkpoint_path,
            adds_to_stats: self.adds_to_stats.unwrap_or(defaults.adds_to_stats),
        };

        if config.capacity == 0 {
            return Err(GeneticError::Configuration(
                "Pool capacity must be at least 1".to_string(),
            ));
        }
        if config.adds_to_checkpoint == 0 || config.adds_to_stats == 0 {
            return Err(GeneticError::Configuration(
                "Checkpoint and statistics intervals must be at least 1".to_string(),
            ));
        }
        if config.acceptable_fitness.is_nan() {
            return Err(GeneticError::Configuration(
                "Acceptable fitness must not be NaN".to_string(),
            ));
        }
        Ok(config)
    }
}
