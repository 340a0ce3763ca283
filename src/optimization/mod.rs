//! # Global Optimization Driver
//!
//! Runs a complete in-process optimization against one shared pool and
//! ledger:
//!
//! 1. seeding from a directory of pre-built individuals (optional);
//! 2. initialization until the pool capacity is used up;
//! 3. a check that the pool holds at least two individuals;
//! 4. a post-initialization pool snapshot;
//! 5. the global phase of recombination tasks;
//! 6. flushing the ledger, summary statistics and a final pool snapshot.
//!
//! Each phase is one [`ThreadDispatcher`] run over its own task factory.
//! Task ids are contiguous over the whole run: seeds and initial
//! individuals take `[0, capacity)`, recombination tasks follow.

pub mod options;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::dispatch::{
    DispatchReport, DispatcherConfig, InitTaskFactory, RecombineTaskFactory, SeedTaskFactory,
    TaskEnv, TaskFactory, ThreadDispatcher,
};
use crate::error::{GeneticError, OptionExt, Result};
use crate::individual::Optimizable;
use crate::ledger::{Ledger, LedgerTotals};
use crate::operators::{FitnessFunction, IndividualReader, Initializer, Recombiner};
use crate::pool::{NicheComputer, Pool};
use crate::selection::{ParentSelector, TournamentSelection};

pub use options::{OptimizationOptions, OptimizationOptionsBuilder};

/// File name of the snapshot taken after initialization.
pub const POST_INIT_SNAPSHOT: &str = "post_init_pool.json";
/// File name of the snapshot taken at the end of the run.
pub const FINAL_SNAPSHOT: &str = "final_pool.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Seeding,
    Initialization,
    GlobalOptimization,
}

#[derive(Debug, Clone)]
pub struct PhaseReport {
    pub phase: Phase,
    pub dispatch: DispatchReport,
    pub elapsed: Duration,
}

/// Outcome of a complete run.
#[derive(Debug, Clone)]
pub struct OptimizationResult<I> {
    pub best: Option<I>,
    pub pool_size: usize,
    pub totals: LedgerTotals,
    pub phases: Vec<PhaseReport>,
    pub elapsed: Duration,
}

/// Drives the seeding, initialization and global phases of a run.
#[derive(Debug)]
pub struct GlobalOptimization<I: Optimizable> {
    options: OptimizationOptions,
    pool: Arc<Pool<I>>,
    ledger: Arc<Ledger>,
    selector: Arc<dyn ParentSelector>,
    niche_computer: Option<Box<dyn NicheComputer<I>>>,
}

impl<I: Optimizable> GlobalOptimization<I> {
    /// Parents are picked by binary tournament unless
    /// [`with_selector`](Self::with_selector) says otherwise.
    pub fn new(options: OptimizationOptions, pool: Arc<Pool<I>>, ledger: Arc<Ledger>) -> Self {
        Self {
            options,
            pool,
            ledger,
            selector: Arc::new(TournamentSelection::default()),
            niche_computer: None,
        }
    }

    pub fn with_selector(mut self, selector: Arc<dyn ParentSelector>) -> Self {
        self.selector = selector;
        self
    }

    /// Enables niching for every phase.
    pub fn with_niche_computer(mut self, computer: Box<dyn NicheComputer<I>>) -> Self {
        self.niche_computer = Some(computer);
        self
    }

    pub fn options(&self) -> &OptimizationOptions {
        &self.options
    }

    pub fn pool(&self) -> &Arc<Pool<I>> {
        &self.pool
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    /// Runs initialization and the global phase without seeding.
    pub fn run<N, R>(&self, initializer: N, recombiner: R) -> Result<OptimizationResult<I>>
    where
        N: Initializer<I>,
        R: Recombiner<I>,
    {
        self.run_phases(Instant::now(), Vec::new(), 0, initializer, recombiner)
    }

    /// Seeds from the configured seed directory, then runs initialization
    /// and the global phase.
    pub fn run_seeded<S, N, R>(
        &self,
        seed_helpers: S,
        initializer: N,
        recombiner: R,
    ) -> Result<OptimizationResult<I>>
    where
        S: IndividualReader<I> + FitnessFunction<I>,
        N: Initializer<I>,
        R: Recombiner<I>,
    {
        let start = Instant::now();
        let seeding = self.seed_phase(seed_helpers)?;
        let seeded = seeding.dispatch.submitted;
        self.run_phases(start, vec![seeding], seeded, initializer, recombiner)
    }

    /// Force-inserts up to `capacity` individuals read from the seed
    /// directory, with task ids starting at 0.
    pub fn seed_phase<S>(&self, seed_helpers: S) -> Result<PhaseReport>
    where
        S: IndividualReader<I> + FitnessFunction<I>,
    {
        let dir = self.options.seed_dir().ok_or_else_genetic(|| {
            GeneticError::Configuration("No seed directory configured".to_string())
        })?;
        let factory = SeedTaskFactory::from_dir(self.env(seed_helpers)?, dir)?;
        let seeds = factory.seed_count().min(self.pool.capacity());
        if factory.seed_count() > seeds {
            warn!(
                found = factory.seed_count(),
                used = seeds,
                "more seeds than pool capacity, ignoring the rest"
            );
        }
        self.dispatch(Phase::Seeding, &factory, 0, seeds)
    }

    /// Fills the pool with `capacity - already_seeded` fresh individuals.
    pub fn init_phase<N>(&self, initializer: N, already_seeded: usize) -> Result<PhaseReport>
    where
        N: Initializer<I>,
    {
        let iterations = self.pool.capacity().saturating_sub(already_seeded);
        let factory = InitTaskFactory::new(self.env(initializer)?);
        self.dispatch(Phase::Initialization, &factory, already_seeded as u64, iterations)
    }

    /// Runs `global_steps` recombination tasks with ids following the
    /// initial individuals.
    pub fn global_phase<R>(&self, recombiner: R) -> Result<PhaseReport>
    where
        R: Recombiner<I>,
    {
        let factory = RecombineTaskFactory::new(self.env(recombiner)?, Arc::clone(&self.selector));
        self.dispatch(
            Phase::GlobalOptimization,
            &factory,
            self.pool.capacity() as u64,
            self.options.global_steps(),
        )
    }

    fn run_phases<N, R>(
        &self,
        start: Instant,
        mut phases: Vec<PhaseReport>,
        seeded: usize,
        initializer: N,
        recombiner: R,
    ) -> Result<OptimizationResult<I>>
    where
        N: Initializer<I>,
        R: Recombiner<I>,
    {
        phases.push(self.init_phase(initializer, seeded)?);

        let size = self.pool.len();
        if size < 2 {
            return Err(GeneticError::Evolution(format!(
                "Pool holds {} individual(s) after initialization, at least two are needed",
                size
            )));
        }
        if size < self.pool.capacity() {
            warn!(
                size,
                capacity = self.pool.capacity(),
                "pool is not full after initialization"
            );
        }
        self.write_snapshot(POST_INIT_SNAPSHOT)?;
        for line in self.pool.formatted_pool() {
            debug!("{}", line);
        }

        phases.push(self.global_phase(recombiner)?);

        self.ledger.flush_records();
        let totals = self.ledger.write_total_stats();
        self.write_snapshot(FINAL_SNAPSHOT)?;

        let elapsed = start.elapsed();
        for phase in &phases {
            info!(
                phase = ?phase.phase,
                tasks = phase.dispatch.submitted,
                elapsed_ms = phase.elapsed.as_millis() as u64,
                "phase timing"
            );
        }
        let best = self.pool.best();
        info!(
            elapsed_ms = elapsed.as_millis() as u64,
            best_fitness = best.as_ref().map(|b| b.fitness()),
            "global optimization finished"
        );

        Ok(OptimizationResult {
            best,
            pool_size: self.pool.len(),
            totals,
            phases,
            elapsed,
        })
    }

    fn env<H>(&self, helper: H) -> Result<Arc<TaskEnv<I, H>>>
    where
        H: Clone + Send + Sync,
    {
        let mut env = TaskEnv::new(
            Arc::clone(&self.pool),
            Arc::clone(&self.ledger),
            helper,
            self.options.threads(),
        )?
        .with_cache(self.options.use_cache())
        .with_debug(self.options.debug());
        if let Some(computer) = &self.niche_computer {
            env = env.with_niche_computer(computer.clone())?;
        }
        Ok(Arc::new(env))
    }

    fn dispatch<F: TaskFactory>(
        &self,
        phase: Phase,
        factory: &F,
        offset: u64,
        iterations: usize,
    ) -> Result<PhaseReport> {
        let config = DispatcherConfig::builder()
            .threads(self.options.threads())
            .offset(offset)
            .iterations(iterations)
            .subs_to_wait(self.options.subs_to_wait())
            .stop_marker(self.options.stop_marker().map(|p| p.to_path_buf()))
            .build()?;
        info!(phase = ?phase, offset, iterations, "starting phase");
        let start = Instant::now();
        let dispatch = ThreadDispatcher::new(config).run(factory)?;
        Ok(PhaseReport {
            phase,
            dispatch,
            elapsed: start.elapsed(),
        })
    }

    fn write_snapshot(&self, name: &str) -> Result<()> {
        if let Some(dir) = self.options.output_dir() {
            std::fs::create_dir_all(dir)?;
            self.pool.write_snapshot(dir.join(name))?;
        }
        Ok(())
    }
}
