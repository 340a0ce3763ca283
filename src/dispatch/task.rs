//! Units of work and the shared environment they run against.

use std::fmt;
use std::sync::Arc;

use crate::cache::ObjectCache;
use crate::error::Result;
use crate::individual::Optimizable;
use crate::ledger::Ledger;
use crate::pool::{Niche, NicheComputer, Pool};

/// A unit of work run on a worker thread.
pub trait Task: Send {
    /// Id of the task; also the id of the individual it creates.
    fn id(&self) -> u64;

    fn run(self) -> Result<()>;
}

/// Builds one task per id for a dispatcher phase.
pub trait TaskFactory: Sync {
    type Task: Task;

    fn create_task(&self, id: u64) -> Self::Task;

    /// Whether the run already reached its target and no further tasks are
    /// worth submitting.
    fn acceptable_fitness_reached(&self) -> bool {
        false
    }
}

/// Everything a task needs: the shared pool and ledger, the helper cache and
/// the optional niche machinery.
pub struct TaskEnv<I: Optimizable, H> {
    pool: Arc<Pool<I>>,
    ledger: Arc<Ledger>,
    helpers: ObjectCache<H>,
    niches: Option<ObjectCache<Box<dyn NicheComputer<I>>>>,
    use_cache: bool,
    debug: bool,
}

impl<I, H> TaskEnv<I, H>
where
    I: Optimizable,
    H: Clone + Send + Sync,
{
    /// Builds the environment with a helper cache of `2 * workers` clones of
    /// `helper`.
    pub fn new(pool: Arc<Pool<I>>, ledger: Arc<Ledger>, helper: H, workers: usize) -> Result<Self> {
        Ok(Self {
            pool,
            ledger,
            helpers: ObjectCache::new(workers, helper)?,
            niches: None,
            use_cache: true,
            debug: false,
        })
    }

    /// Enables niching with a cache of duplicates of `computer`.
    pub fn with_niche_computer(mut self, computer: Box<dyn NicheComputer<I>>) -> Result<Self> {
        let workers = self.helpers.len() / 2;
        self.niches = Some(ObjectCache::new(workers, computer)?);
        Ok(self)
    }

    /// Without the cache every task works on a fresh duplicate of the
    /// reference helper.
    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    /// Debug mode also bypasses the cache.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn pool(&self) -> &Arc<Pool<I>> {
        &self.pool
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn helper_cache(&self) -> &ObjectCache<H> {
        &self.helpers
    }

    pub fn niching(&self) -> bool {
        self.niches.is_some()
    }

    fn cached(&self) -> bool {
        self.use_cache && !self.debug
    }

    /// Runs `body` with exclusive access to a helper. A cached slot is
    /// released on every exit path, including unwinding.
    pub fn with_helper<R>(&self, body: impl FnOnce(&mut H) -> Result<R>) -> Result<R> {
        if self.cached() {
            let mut slot = self.helpers.get_unused_entry()?;
            body(&mut *slot)
        } else {
            let mut helper = self.helpers.get_original_entry().clone();
            body(&mut helper)
        }
    }

    /// Computes the niche of `individual`, or `None` when niching is off.
    pub fn compute_niche(&self, individual: &I) -> Result<Option<Niche>> {
        let Some(cache) = &self.niches else {
            return Ok(None);
        };
        let niche = if self.cached() {
            let mut slot = cache.get_unused_entry()?;
            slot.compute_niche(individual)?
        } else {
            cache.get_original_entry().clone().compute_niche(individual)?
        };
        Ok(Some(niche))
    }
}

impl<I: Optimizable, H> fmt::Debug for TaskEnv<I, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskEnv")
            .field("pool_size", &self.pool.len())
            .field("helper_slots", &self.helpers.len())
            .field("niching", &self.niches.is_some())
            .field("use_cache", &self.use_cache)
            .field("debug", &self.debug)
            .finish()
    }
}
