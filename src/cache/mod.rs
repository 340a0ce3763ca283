//! # Object Cache
//!
//! A fixed set of reusable helper objects (local optimizers, niche computers,
//! file readers, ...) shared by the worker threads of a dispatcher. Building
//! such helpers can be expensive, so every task borrows an already built
//! duplicate instead of constructing its own.
//!
//! The cache holds `2 * workers` independent clones of a reference helper.
//! [`ObjectCache::get_unused_entry`] hands out an exclusive [`CacheSlot`]
//! guard; dropping the guard releases the slot, which also happens while
//! unwinding from a panicking task. If no slot becomes free within the retry
//! budget the call fails with [`GeneticError::CacheExhausted`]: with twice as
//! many slots as workers this only happens when a slot has leaked.
//!
//! ## Example
//!
//! ```rust
//! use genpool::cache::ObjectCache;
//!
//! let cache = ObjectCache::new(2, String::from("optimizer")).unwrap();
//! assert_eq!(cache.len(), 4);
//!
//! {
//!     let mut slot = cache.get_unused_entry().unwrap();
//!     slot.push_str("-busy");
//!     assert_eq!(cache.in_use(), 1);
//! }
//! assert_eq!(cache.in_use(), 0);
//! ```

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::thread;

use parking_lot::{Mutex, MutexGuard};
use tracing::{error, trace};

use crate::error::{GeneticError, Result};

/// Number of full scans over all slots before giving up.
pub const DEFAULT_MAX_TRIES: usize = 1000;

/// A pool of duplicated helper objects with exclusive checkout.
pub struct ObjectCache<H> {
    original: H,
    slots: Vec<Mutex<H>>,
    in_use: Mutex<Vec<bool>>,
    max_tries: usize,
}

impl<H> ObjectCache<H>
where
    H: Clone + Send,
{
    /// Creates a cache with `2 * workers` clones of `reference`.
    ///
    /// # Errors
    ///
    /// Returns a `GeneticError::Configuration` error if `workers` is 0.
    pub fn new(workers: usize, reference: H) -> Result<Self> {
        if workers == 0 {
            return Err(GeneticError::Configuration(
                "Object cache needs at least one worker".to_string(),
            ));
        }
        let size = 2 * workers;
        let slots = (0..size).map(|_| Mutex::new(reference.clone())).collect();
        Ok(Self {
            original: reference,
            slots,
            in_use: Mutex::new(vec![false; size]),
            max_tries: DEFAULT_MAX_TRIES,
        })
    }

    /// Overrides the number of scans performed before a checkout fails.
    pub fn with_max_tries(mut self, max_tries: usize) -> Self {
        self.max_tries = max_tries.max(1);
        self
    }
}

impl<H> ObjectCache<H> {
    /// Checks out a free slot.
    ///
    /// # Errors
    ///
    /// Returns `GeneticError::CacheExhausted` if every slot stayed busy for
    /// the whole retry budget.
    pub fn get_unused_entry(&self) -> Result<CacheSlot<'_, H>> {
        for _ in 0..self.max_tries {
            if let Some(index) = self.claim() {
                trace!(slot = index, "checked out cache slot");
                return Ok(CacheSlot {
                    cache: self,
                    index,
                    guard: Some(self.slots[index].lock()),
                });
            }
            thread::yield_now();
        }

        error!(
            slots = self.slots.len(),
            tries = self.max_tries,
            "no unused entry in cache, a worker probably never released its slot"
        );
        Err(GeneticError::CacheExhausted {
            slots: self.slots.len(),
            tries: self.max_tries,
        })
    }

    /// The reference helper the slots were cloned from. It is never handed
    /// out through a slot.
    pub fn get_original_entry(&self) -> &H {
        &self.original
    }

    /// Total number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of slots currently checked out.
    pub fn in_use(&self) -> usize {
        self.in_use.lock().iter().filter(|busy| **busy).count()
    }

    fn claim(&self) -> Option<usize> {
        let mut flags = self.in_use.lock();
        let index = flags.iter().position(|busy| !*busy)?;
        flags[index] = true;
        Some(index)
    }

    fn release(&self, index: usize) {
        self.in_use.lock()[index] = false;
        trace!(slot = index, "released cache slot");
    }
}

impl<H: fmt::Debug> fmt::Debug for ObjectCache<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectCache")
            .field("original", &self.original)
            .field("slots", &self.slots.len())
            .field("in_use", &self.in_use())
            .field("max_tries", &self.max_tries)
            .finish()
    }
}

/// Exclusive access to one cached helper. Released on drop.
pub struct CacheSlot<'a, H> {
    cache: &'a ObjectCache<H>,
    index: usize,
    guard: Option<MutexGuard<'a, H>>,
}

impl<H> CacheSlot<'_, H> {
    /// Position of the slot inside the cache.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl<H> Deref for CacheSlot<'_, H> {
    type Target = H;

    fn deref(&self) -> &H {
        match &self.guard {
            Some(guard) => &**guard,
            None => unreachable!("cache slot guard is only taken on drop"),
        }
    }
}

impl<H> DerefMut for CacheSlot<'_, H> {
    fn deref_mut(&mut self) -> &mut H {
        match &mut self.guard {
            Some(guard) => &mut **guard,
            None => unreachable!("cache slot guard is only taken on drop"),
        }
    }
}

impl<H> Drop for CacheSlot<'_, H> {
    fn drop(&mut self) {
        // Unlock the helper before clearing its in-use flag.
        drop(self.guard.take());
        self.cache.release(self.index);
    }
}
