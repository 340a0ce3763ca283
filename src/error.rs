//! # Error Types
//!
//! This module defines the error type shared by every component of the engine.
//! Normal outcomes such as a rejected candidate are never errors; the variants
//! below cover invalid configuration, contract violations (for example asking
//! the pool about a position beyond its size), helper-slot starvation,
//! protocol violations in the distributed variant and I/O or serialization
//! failures while checkpointing.
//!
//! ## Examples
//!
//! Using the `Result` type:
//!
//! ```rust
//! use genpool::error::{GeneticError, Result};
//!
//! fn check_capacity(capacity: usize) -> Result<usize> {
//!     if capacity == 0 {
//!         return Err(GeneticError::Configuration("capacity must be positive".to_string()));
//!     }
//!     Ok(capacity)
//! }
//!
//! assert!(check_capacity(0).is_err());
//! ```
//!
//! Using the `ResultExt` trait to add context to errors:
//!
//! ```rust
//! use genpool::error::{Result, ResultExt};
//! use std::fs::File;
//!
//! fn open_seed(path: &str) -> Result<()> {
//!     File::open(path).context("Failed to open seed file")?;
//!     Ok(())
//! }
//! ```
//!
//! Using the `OptionExt` trait to convert `Option` to `Result`:
//!
//! ```rust
//! use genpool::error::{GeneticError, OptionExt};
//!
//! fn best(fitnesses: &[f64]) -> genpool::error::Result<f64> {
//!     fitnesses.first().copied().ok_or_else_genetic(|| GeneticError::EmptyPopulation)
//! }
//! ```

use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Represents errors that can occur in the optimization engine.
#[derive(Error, Debug)]
pub enum GeneticError {
    /// Error that occurs when an optimization phase cannot continue.
    #[error("Evolution error: {0}")]
    Evolution(String),

    /// Error that occurs when an invalid configuration is provided.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Error that occurs when an operation needs a non-empty pool.
    #[error("Empty population error: Cannot operate on an empty population")]
    EmptyPopulation,

    /// A position was requested beyond the current size of a collection.
    #[error("Out of bounds: position {position} requested but size is {size}")]
    OutOfBounds { position: usize, size: usize },

    /// Error that occurs when NaN or infinity values are encountered.
    #[error("Invalid numeric value: {0}")]
    InvalidNumericValue(String),

    /// No free helper slot could be found within the retry budget.
    ///
    /// This almost always means that a worker failed to release its slot.
    #[error("No unused entry in cache: {slots} slots busy after {tries} scans")]
    CacheExhausted { slots: usize, tries: usize },

    /// A task body failed.
    #[error("Task error: {0}")]
    Task(String),

    /// The coordinator/worker protocol was violated.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The message transport failed (peer gone, channel closed, ...).
    #[error("Transport error: {0}")]
    Transport(String),

    /// Error that occurs when (de)serializing a checkpoint or payload.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Error that occurs when an I/O operation fails.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A generic error with a custom message.
    #[error("{0}")]
    Other(String),
}

/// A specialized Result type for engine operations.
pub type Result<T> = std::result::Result<T, GeneticError>;

/// Extension trait for Result to add context to errors.
///
/// ## Examples
///
/// ```rust
/// use genpool::error::ResultExt;
/// use std::fs::File;
///
/// fn read_file(path: &str) -> genpool::error::Result<()> {
///     File::open(path).context("Failed to open file")?;
///     Ok(())
/// }
/// ```
pub trait ResultExt<T, E> {
    /// Converts the error to a `GeneticError::Other` prefixed with `context`.
    fn context<C>(self, context: C) -> Result<T>
    where
        C: fmt::Display + Send + Sync + 'static;
}

impl<T, E> ResultExt<T, E> for std::result::Result<T, E>
where
    E: StdError + Send + Sync + 'static,
{
    fn context<C>(self, context: C) -> Result<T>
    where
        C: fmt::Display + Send + Sync + 'static,
    {
        self.map_err(|e| GeneticError::Other(format!("{}: {}", context, e)))
    }
}

/// Extension trait for Option to convert to Result with a custom error.
pub trait OptionExt<T> {
    /// Converts an `Option<T>` to a `Result<T, GeneticError>` using `err_fn`
    /// to build the error.
    fn ok_or_else_genetic<F>(self, err_fn: F) -> Result<T>
    where
        F: FnOnce() -> GeneticError;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_else_genetic<F>(self, err_fn: F) -> Result<T>
    where
        F: FnOnce() -> GeneticError,
    {
        self.ok_or_else(err_fn)
    }
}
