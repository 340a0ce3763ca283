//! # OptimizationOptions
//!
//! Run-level settings for [`GlobalOptimization`](super::GlobalOptimization):
//! thread count, number of global recombination steps, dispatcher throttle,
//! helper cache switches and the file-system locations used by a run.
//!
//! ## Example
//!
//! ```rust
//! use genpool::optimization::OptimizationOptions;
//!
//! let options = OptimizationOptions::builder()
//!     .threads(4)
//!     .global_steps(10_000)
//!     .seed_dir("seeds")
//!     .output_dir("run")
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(options.threads(), 4);
//! assert_eq!(options.subs_to_wait(), 1000);
//! assert!(options.use_cache());
//! ```

use std::path::{Path, PathBuf};

use crate::dispatch::{DEFAULT_STOP_MARKER, DEFAULT_SUBS_TO_WAIT};
use crate::error::{GeneticError, Result};

#[derive(Debug, Clone)]
pub struct OptimizationOptions {
    threads: usize,
    global_steps: usize,
    subs_to_wait: usize,
    use_cache: bool,
    debug: bool,
    seed_dir: Option<PathBuf>,
    stop_marker: Option<PathBuf>,
    output_dir: Option<PathBuf>,
}

impl OptimizationOptions {
    /// Returns a builder for creating an `OptimizationOptions` instance.
    pub fn builder() -> OptimizationOptionsBuilder {
        OptimizationOptionsBuilder::default()
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Number of recombination tasks of the global phase.
    pub fn global_steps(&self) -> usize {
        self.global_steps
    }

    pub fn subs_to_wait(&self) -> usize {
        self.subs_to_wait
    }

    pub fn use_cache(&self) -> bool {
        self.use_cache
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn seed_dir(&self) -> Option<&Path> {
        self.seed_dir.as_deref()
    }

    pub fn stop_marker(&self) -> Option<&Path> {
        self.stop_marker.as_deref()
    }

    /// Directory receiving the post-initialization and final pool snapshots.
    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }
}

impl Default for OptimizationOptions {
    fn default() -> Self {
        Self {
            threads: rayon::current_num_threads(),
            global_steps: 1000,
            subs_to_wait: DEFAULT_SUBS_TO_WAIT,
            use_cache: true,
            debug: false,
            seed_dir: None,
            stop_marker: Some(PathBuf::from(DEFAULT_STOP_MARKER)),
            output_dir: None,
        }
    }
}

/// Builder for `OptimizationOptions`.
///
/// Provides a fluent interface for constructing `OptimizationOptions` instances.
#[derive(Debug, Clone, Default)]
pub struct OptimizationOptionsBuilder {
    threads: Option<usize>,
    global_steps: Option<usize>,
    subs_to_wait: Option<usize>,
    use_cache: Option<bool>,
    debug: Option<bool>,
    seed_dir: Option<PathBuf>,
    stop_marker: Option<Option<PathBuf>>,
    output_dir: Option<PathBuf>,
}

impl OptimizationOptionsBuilder {
    pub fn threads(mut self, value: usize) -> Self {
        self.threads = Some(value);
        self
    }

    pub fn global_steps(mut self, value: usize) -> Self {
        self.global_steps = Some(value);
        self
    }

    pub fn subs_to_wait(mut self, value: usize) -> Self {
        self.subs_to_wait = Some(value);
        self
    }

    pub fn use_cache(mut self, value: bool) -> Self {
        self.use_cache = Some(value);
        self
    }

    /// Debug mode hands every task a fresh helper duplicate.
    pub fn debug(mut self, value: bool) -> Self {
        self.debug = Some(value);
        self
    }

    pub fn seed_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.seed_dir = Some(path.into());
        self
    }

    /// `None` disables the stop marker check.
    pub fn stop_marker(mut self, path: Option<PathBuf>) -> Self {
        self.stop_marker = Some(path);
        self
    }

    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    /// Builds the `OptimizationOptions` instance.
    ///
    /// # Errors
    ///
    /// Returns a `GeneticError::Configuration` error for zero threads or a
    /// zero `subs_to_wait`.
    pub fn build(self) -> Result<OptimizationOptions> {
        let defaults = OptimizationOptions::default();
        let options = OptimizationOptions {
            threads: self.threads.unwrap_or(defaults.threads),
            global_steps: self.global_steps.unwrap_or(defaults.global_steps),
            subs_to_wait: self.subs_to_wait.unwrap_or(defaults.subs_to_wait),
            use_cache: self.use_cache.unwrap_or(defaults.use_cache),
            debug: self.debug.unwrap_or(defaults.debug),
            seed_dir: self.seed_dir,
            stop_marker: self.stop_marker.unwrap_or(defaults.stop_marker),
            output_dir: self.output_dir,
        };
        if options.threads == 0 {
            return Err(GeneticError::Configuration(
                "At least one thread is required".to_string(),
            ));
        }
        if options.subs_to_wait == 0 {
            return Err(GeneticError::Configuration(
                "subs_to_wait must be at least 1".to_string(),
            ));
        }
        Ok(options)
    }
}
