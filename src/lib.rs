//! Concurrent pool-based global optimization engine: a bounded, ranked pool
//! under concurrent mutation, per-worker helper caches, a throttled thread
//! dispatcher, a lineage ledger and a coordinator/worker protocol for
//! running the same search across processes.

pub mod cache;
pub mod dispatch;
pub mod distributed;
pub mod error;
pub mod individual;
pub mod ledger;
pub mod operators;
pub mod optimization;
pub mod pool;
pub mod rng;
pub mod selection;

// Re-export commonly used types for convenience
pub use error::{GeneticError, OptionExt, Result, ResultExt};
pub use individual::Optimizable;
