//! Global optimization as a distributed [`Job`].
//!
//! The coordinator side ([`GlobOptJob`]) owns the pool and the ledger. It
//! first hands out `capacity` initial tasks, seed files before fresh
//! initializations, and waits until every initial result is back. Then it
//! hands out `global_steps` recombination tasks, picking the parents itself
//! so that workers never need to see the pool.
//!
//! Workers run [`GlobOptTask::execute`] against a boxed
//! [`GlobOptOperators`] context.

use std::collections::VecDeque;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::distributed::job::{Job, JobState, RemoteTask};
use crate::error::{GeneticError, Result};
use crate::individual::Optimizable;
use crate::ledger::{Ledger, LedgerTotals, LineageRecord};
use crate::operators::{FitnessFunction, IndividualReader, Initializer, Recombiner};
use crate::pool::{Niche, NicheComputer, Pool};
use crate::rng::RandomNumberGenerator;
use crate::selection::{ParentSelector, TournamentSelection};

/// One unit of distributed global-optimization work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GlobOptTask<I> {
    Seed { id: u64, path: PathBuf, template: I },
    Init { id: u64, template: I },
    Recombine { id: u64, mother: I, father: I },
}

/// What a worker sends back. `None` stands for "nothing usable".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GlobOptOutcome<I> {
    Initial {
        id: u64,
        individual: Option<I>,
    },
    Offspring {
        id: u64,
        mother: u64,
        father: u64,
        child: Option<I>,
    },
}

/// The operators a worker needs for every task kind.
pub trait GlobOptOperators<I: Optimizable>: Debug + Send {
    fn initialize(&mut self, template: &I, id: u64) -> Result<I>;

    fn recombine(&mut self, id: u64, mother: &I, father: &I) -> Result<Option<I>>;

    /// Reads a seed file and evaluates the individual.
    fn read_seed(&mut self, template: &I, path: &Path) -> Result<I>;
}

/// Bundles the in-process operator traits into a [`GlobOptOperators`].
#[derive(Debug, Clone)]
pub struct OperatorSet<N, R, S> {
    pub initializer: N,
    pub recombiner: R,
    pub seed_helpers: Option<S>,
}

impl<N, R, S> OperatorSet<N, R, S> {
    pub fn new(initializer: N, recombiner: R) -> Self {
        Self {
            initializer,
            recombiner,
            seed_helpers: None,
        }
    }

    pub fn with_seed_helpers(mut self, helpers: S) -> Self {
        self.seed_helpers = Some(helpers);
        self
    }
}

impl<I, N, R, S> GlobOptOperators<I> for OperatorSet<N, R, S>
where
    I: Optimizable,
    N: Initializer<I>,
    R: Recombiner<I>,
    S: IndividualReader<I> + FitnessFunction<I>,
{
    fn initialize(&mut self, template: &I, id: u64) -> Result<I> {
        self.initializer.initialize(template, id)
    }

    fn recombine(&mut self, id: u64, mother: &I, father: &I) -> Result<Option<I>> {
        self.recombiner.recombine(id, mother, father)
    }

    fn read_seed(&mut self, template: &I, path: &Path) -> Result<I> {
        let helpers = self.seed_helpers.as_mut().ok_or_else(|| {
            GeneticError::Configuration("Worker has no seed reader configured".to_string())
        })?;
        let individual = helpers.read_individual(template, path)?;
        helpers.evaluate(individual)
    }
}

impl<I: Optimizable> RemoteTask for GlobOptTask<I> {
    type Output = GlobOptOutcome<I>;
    type Context = Box<dyn GlobOptOperators<I>>;

    /// Operator failures and non-finite fitness values are logged and
    /// reported as an empty outcome.
    fn execute(self, operators: &mut Self::Context, rank: usize) -> Result<Self::Output> {
        let outcome = match self {
            GlobOptTask::Seed { id, path, template } => {
                let individual = operators
                    .read_seed(&template, &path)
                    .map(|mut individual| {
                        individual.set_id(id);
                        individual
                    });
                GlobOptOutcome::Initial {
                    id,
                    individual: keep(individual, id, rank).and_then(|i| finite(i, id)),
                }
            }
            GlobOptTask::Init { id, template } => GlobOptOutcome::Initial {
                id,
                individual: keep(operators.initialize(&template, id), id, rank)
                    .and_then(|i| finite(i, id)),
            },
            GlobOptTask::Recombine { id, mother, father } => {
                let child = operators
                    .recombine(id, &mother, &father)
                    .map(|child| {
                        child.map(|mut child| {
                            child.set_id(id);
                            child
                        })
                    });
                GlobOptOutcome::Offspring {
                    id,
                    mother: mother.id(),
                    father: father.id(),
                    child: keep(child, id, rank)
                        .flatten()
                        .and_then(|c| finite(c, id)),
                }
            }
        };
        Ok(outcome)
    }
}

fn keep<T>(result: Result<T>, task: u64, rank: usize) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(task, worker = rank, error = %e, "operator failed");
            None
        }
    }
}

/// Drops an individual whose fitness is NaN or infinite.
fn finite<I: Optimizable>(individual: I, task: u64) -> Option<I> {
    let fitness = individual.fitness();
    if fitness.is_finite() {
        Some(individual)
    } else {
        warn!(task, fitness, "discarding individual with non-finite fitness");
        None
    }
}

/// Coordinator-side state of a distributed global optimization.
#[derive(Debug)]
pub struct GlobOptJob<I: Optimizable> {
    pool: Arc<Pool<I>>,
    ledger: Arc<Ledger>,
    selector: Arc<dyn ParentSelector>,
    niche_computer: Option<Box<dyn NicheComputer<I>>>,
    rng: RandomNumberGenerator,
    seeds: VecDeque<PathBuf>,
    initial: usize,
    global_steps: usize,
    issued_initial: usize,
    received_initial: usize,
    issued_global: usize,
    received_global: usize,
}

impl<I: Optimizable> GlobOptJob<I> {
    /// `capacity` initial tasks followed by `global_steps` recombinations.
    pub fn new(pool: Arc<Pool<I>>, ledger: Arc<Ledger>, global_steps: usize) -> Self {
        let initial = pool.capacity();
        Self {
            pool,
            ledger,
            selector: Arc::new(TournamentSelection::default()),
            niche_computer: None,
            rng: RandomNumberGenerator::new(),
            seeds: VecDeque::new(),
            initial,
            global_steps,
            issued_initial: 0,
            received_initial: 0,
            issued_global: 0,
            received_global: 0,
        }
    }

    /// Seed files replace the first initial tasks; extras beyond the pool
    /// capacity are ignored.
    pub fn with_seeds(mut self, mut seeds: Vec<PathBuf>) -> Self {
        if seeds.len() > self.initial {
            warn!(
                found = seeds.len(),
                used = self.initial,
                "more seeds than pool capacity, ignoring the rest"
            );
            seeds.truncate(self.initial);
        }
        self.seeds = seeds.into();
        self
    }

    pub fn with_selector(mut self, selector: Arc<dyn ParentSelector>) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_niche_computer(mut self, computer: Box<dyn NicheComputer<I>>) -> Self {
        self.niche_computer = Some(computer);
        self
    }

    pub fn with_rng(mut self, rng: RandomNumberGenerator) -> Self {
        self.rng = rng;
        self
    }

    pub fn pool(&self) -> &Arc<Pool<I>> {
        &self.pool
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    fn initial_complete(&self) -> bool {
        self.received_initial == self.initial
    }

    /// Flushes pending lineage records and writes the summary statistics.
    pub fn close(&self) -> LedgerTotals {
        self.ledger.flush_records();
        self.ledger.write_total_stats()
    }

    fn state(&self) -> JobState {
        if self.is_finished() {
            JobState::Finished
        } else {
            JobState::Running
        }
    }

    fn niche_for(&mut self, individual: &I) -> Result<Option<Niche>> {
        match self.niche_computer.as_mut() {
            Some(computer) => computer.compute_niche(individual).map(Some),
            None => Ok(None),
        }
    }

    fn absorb_initial(&mut self, id: u64, individual: Option<I>) -> Result<()> {
        self.received_initial += 1;
        if let Some(individual) = individual.and_then(|i| finite(i, id)) {
            let niche = self.niche_for(&individual)?;
            let retained = self.pool.add_individual_forced(individual, niche)?;
            debug!(task = id, retained, "initial individual received");
        } else {
            debug!(task = id, "initial task produced nothing");
        }
        if self.initial_complete() {
            let size = self.pool.len();
            if size < self.initial {
                warn!(size, capacity = self.initial, "pool is not full after initialization");
            }
            info!(size, "initial pool complete");
        }
        Ok(())
    }

    fn absorb_offspring(
        &mut self,
        id: u64,
        mother: u64,
        father: u64,
        child: Option<I>,
    ) -> Result<()> {
        self.received_global += 1;
        let Some(child) = child.and_then(|c| finite(c, id)) else {
            self.ledger.add_family(LineageRecord::null(id, mother, father));
            return Ok(());
        };
        let fitness = child.fitness();
        if !self.pool.has_chance_to_be_added(fitness) {
            self.ledger
                .add_family(LineageRecord::offspring(id, mother, father, fitness, false));
            return Ok(());
        }
        let niche = self.niche_for(&child)?;
        let accepted = self.pool.add_individual(child, niche)?;
        self.ledger
            .add_family(LineageRecord::offspring(id, mother, father, fitness, accepted));
        if accepted {
            debug!(task = id, fitness, "child accepted into pool");
        }
        Ok(())
    }
}

impl<I: Optimizable> Job for GlobOptJob<I> {
    type Task = GlobOptTask<I>;

    fn next_task(&mut self) -> Result<Option<GlobOptTask<I>>> {
        if self.is_finished() {
            return Ok(None);
        }
        if self.issued_initial < self.initial {
            let id = self.issued_initial as u64;
            self.issued_initial += 1;
            let template = self.pool.example().clone();
            let task = match self.seeds.pop_front() {
                Some(path) => GlobOptTask::Seed { id, path, template },
                None => GlobOptTask::Init { id, template },
            };
            return Ok(Some(task));
        }
        if !self.initial_complete() || self.issued_global >= self.global_steps {
            return Ok(None);
        }

        let size = self.pool.len();
        if size < 2 {
            return Err(GeneticError::Evolution(format!(
                "Pool holds {} individual(s) after initialization, at least two are needed",
                size
            )));
        }
        let (mother, father) = self.pool.get_parents(self.selector.as_ref(), &mut self.rng)?;
        let id = (self.initial + self.issued_global) as u64;
        self.issued_global += 1;
        Ok(Some(GlobOptTask::Recombine { id, mother, father }))
    }

    fn submit_result(&mut self, result: GlobOptOutcome<I>) -> Result<JobState> {
        match result {
            GlobOptOutcome::Initial { id, individual } => self.absorb_initial(id, individual)?,
            GlobOptOutcome::Offspring {
                id,
                mother,
                father,
                child,
            } => self.absorb_offspring(id, mother, father, child)?,
        }
        Ok(self.state())
    }

    /// A lost initial task leaves its slot empty, a lost recombination is
    /// recorded as a null attempt.
    fn task_lost(&mut self, task: GlobOptTask<I>, error: &GeneticError) -> Result<JobState> {
        match task {
            GlobOptTask::Seed { id, .. } | GlobOptTask::Init { id, .. } => {
                warn!(task = id, error = %error, "initial result lost");
                self.absorb_initial(id, None)?;
            }
            GlobOptTask::Recombine { id, mother, father } => {
                warn!(task = id, error = %error, "offspring result lost");
                self.absorb_offspring(id, mother.id(), father.id(), None)?;
            }
        }
        Ok(self.state())
    }

    /// All results are in, or the pool reached the acceptable fitness once
    /// initialization was complete.
    fn is_finished(&self) -> bool {
        self.initial_complete()
            && (self.received_global == self.global_steps
                || self.pool.acceptable_fitness_reached())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LedgerConfig;
    use crate::pool::PoolConfig;

    #[derive(Clone, Debug, Serialize, Deserialize)]
    struct Point {
        id: u64,
        fitness: f64,
    }

    impl Optimizable for Point {
        fn id(&self) -> u64 {
            self.id
        }
        fn set_id(&mut self, id: u64) {
            self.id = id;
        }
        fn fitness(&self) -> f64 {
            self.fitness
        }
    }

    fn job(capacity: usize, steps: usize) -> GlobOptJob<Point> {
        let pool = Pool::new(
            PoolConfig::builder().capacity(capacity).build().unwrap(),
            Point { id: 0, fitness: 0.0 },
        );
        let ledger = Ledger::new(LedgerConfig::builder().silent(true).build().unwrap());
        GlobOptJob::new(Arc::new(pool), Arc::new(ledger), steps)
            .with_rng(RandomNumberGenerator::from_seed(7))
    }

    fn initial(id: u64, fitness: f64) -> GlobOptOutcome<Point> {
        GlobOptOutcome::Initial {
            id,
            individual: Some(Point { id, fitness }),
        }
    }

    #[test]
    fn test_seeds_come_first_and_globals_wait_for_initial_results() {
        let seeds = ["a", "b", "c", "d"].iter().map(PathBuf::from).collect();
        let mut job = job(3, 2).with_seeds(seeds);

        let tasks: Vec<_> = (0..3).map(|_| job.next_task().unwrap().unwrap()).collect();
        assert!(tasks.iter().all(|t| matches!(t, GlobOptTask::Seed { .. })));
        assert!(job.next_task().unwrap().is_none());

        job.submit_result(initial(0, 3.0)).unwrap();
        job.submit_result(initial(1, 1.0)).unwrap();
        assert!(job.next_task().unwrap().is_none());
        job.submit_result(initial(2, 2.0)).unwrap();

        match job.next_task().unwrap() {
            Some(GlobOptTask::Recombine { id, .. }) => assert_eq!(id, 3),
            other => panic!("expected a recombination, got {:?}", other),
        }
    }

    #[test]
    fn test_finishes_after_all_global_results() {
        let mut job = job(2, 2);
        for _ in 0..2 {
            job.next_task().unwrap();
        }
        job.submit_result(initial(0, 1.0)).unwrap();
        assert_eq!(job.submit_result(initial(1, 2.0)).unwrap(), JobState::Running);

        job.next_task().unwrap();
        job.next_task().unwrap();
        let state = job
            .submit_result(GlobOptOutcome::Offspring {
                id: 2,
                mother: 0,
                father: 1,
                child: None,
            })
            .unwrap();
        assert_eq!(state, JobState::Running);
        let state = job
            .submit_result(GlobOptOutcome::Offspring {
                id: 3,
                mother: 0,
                father: 1,
                child: Some(Point { id: 3, fitness: 0.5 }),
            })
            .unwrap();
        assert_eq!(state, JobState::Finished);
        assert!(job.next_task().unwrap().is_none());

        let totals = job.close();
        assert_eq!(totals.total, 2);
        assert_eq!(totals.null, 1);
        assert_eq!(totals.accepted, 1);
        assert_eq!(job.pool().fitness_at(0).unwrap(), 0.5);
    }

    #[test]
    fn test_non_finite_results_count_as_empty() {
        let mut job = job(2, 2);
        for _ in 0..2 {
            job.next_task().unwrap();
        }
        job.submit_result(initial(0, f64::NAN)).unwrap();
        job.submit_result(initial(1, 2.0)).unwrap();
        assert_eq!(job.pool().all_fitnesses(), vec![2.0]);
        // Initialization is complete, but one individual cannot breed.
        assert!(matches!(job.next_task(), Err(GeneticError::Evolution(_))));
    }

    #[test]
    fn test_lost_and_non_finite_offspring_are_null_attempts() {
        let mut job = job(2, 2);
        for _ in 0..2 {
            job.next_task().unwrap();
        }
        job.submit_result(initial(0, 1.0)).unwrap();
        job.submit_result(initial(1, 2.0)).unwrap();

        let first = job.next_task().unwrap().unwrap();
        job.next_task().unwrap();
        let lost = GeneticError::Other("unreadable".to_string());
        assert_eq!(job.task_lost(first, &lost).unwrap(), JobState::Running);
        let state = job
            .submit_result(GlobOptOutcome::Offspring {
                id: 3,
                mother: 0,
                father: 1,
                child: Some(Point {
                    id: 3,
                    fitness: f64::INFINITY,
                }),
            })
            .unwrap();
        assert_eq!(state, JobState::Finished);

        let totals = job.close();
        assert_eq!(totals.total, 2);
        assert_eq!(totals.null, 2);
        assert_eq!(job.pool().all_fitnesses(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_too_small_pool_is_an_error() {
        let mut job = job(2, 1);
        job.next_task().unwrap();
        job.next_task().unwrap();
        job.submit_result(initial(0, 1.0)).unwrap();
        job.submit_result(GlobOptOutcome::Initial {
            id: 1,
            individual: None,
        })
        .unwrap();
        assert!(matches!(job.next_task(), Err(GeneticError::Evolution(_))));
    }
}
