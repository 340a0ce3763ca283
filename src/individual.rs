//! # Optimizable Trait
//!
//! The `Optimizable` trait is the narrow contract the engine requires from a
//! candidate solution: a unique identity that can be assigned once per
//! creation, a fitness value (lower is better) and duplication through
//! `Clone`. Serde is required so that pools, ledgers and distributed payloads
//! can be checkpointed.
//!
//! ## Example
//!
//! ```rust
//! use genpool::individual::Optimizable;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Clone, Debug, Serialize, Deserialize)]
//! struct Cluster {
//!     id: u64,
//!     energy: f64,
//!     coords: Vec<[f64; 3]>,
//! }
//!
//! impl Optimizable for Cluster {
//!     fn id(&self) -> u64 {
//!         self.id
//!     }
//!
//!     fn set_id(&mut self, id: u64) {
//!         self.id = id;
//!     }
//!
//!     fn fitness(&self) -> f64 {
//!         self.energy
//!     }
//! }
//! ```

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// A candidate solution managed by the pool.
///
/// Types implementing this trait must also implement `Clone`, `Debug`, `Send`
/// and `Sync` so that they can be shared across worker threads, and serde's
/// `Serialize`/`DeserializeOwned` for checkpoints and distributed payloads.
///
/// Once an individual has been handed to the pool it is never mutated again.
pub trait Optimizable:
    Clone + Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// Returns the identity assigned to this individual.
    fn id(&self) -> u64;

    /// Assigns the identity. Called exactly once by the task that creates
    /// the individual.
    fn set_id(&mut self, id: u64);

    /// Returns the fitness. Lower values are better.
    fn fitness(&self) -> f64;
}
