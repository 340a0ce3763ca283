use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::dispatch::task::{Task, TaskEnv, TaskFactory};
use crate::error::{GeneticError, Result};
use crate::individual::Optimizable;
use crate::operators::{FitnessFunction, IndividualReader};

/// Shared queue of seed files. Each path is handed out at most once.
type SeedQueue = Arc<Mutex<VecDeque<PathBuf>>>;

/// Reads one externally produced individual, evaluates it and force-inserts
/// it into the pool. A no-op once every seed file has been consumed.
#[derive(Debug)]
pub struct SeedTask<I: Optimizable, H> {
    env: Arc<TaskEnv<I, H>>,
    seeds: SeedQueue,
    id: u64,
}

impl<I, H> Task for SeedTask<I, H>
where
    I: Optimizable,
    H: IndividualReader<I> + FitnessFunction<I>,
{
    fn id(&self) -> u64 {
        self.id
    }

    fn run(self) -> Result<()> {
        let Some(path) = self.seeds.lock().pop_front() else {
            debug!(task = self.id, "no seed left");
            return Ok(());
        };

        let env = &self.env;
        let id = self.id;
        env.with_helper(|helpers| {
            let mut individual = helpers.read_individual(env.pool().example(), &path)?;
            individual.set_id(id);
            let individual = helpers.evaluate(individual)?;
            let fitness = individual.fitness();
            let niche = env.compute_niche(&individual)?;
            let retained = env.pool().add_individual_forced(individual, niche)?;
            debug!(task = id, seed = %path.display(), fitness, retained, "seeded individual");
            Ok(())
        })
    }
}

#[derive(Debug)]
pub struct SeedTaskFactory<I: Optimizable, H> {
    env: Arc<TaskEnv<I, H>>,
    seeds: SeedQueue,
    count: usize,
}

impl<I: Optimizable, H> SeedTaskFactory<I, H> {
    /// Queues the given seed files in order.
    pub fn new(env: Arc<TaskEnv<I, H>>, seeds: Vec<PathBuf>) -> Self {
        let count = seeds.len();
        Self {
            env,
            seeds: Arc::new(Mutex::new(seeds.into())),
            count,
        }
    }

    /// Queues every regular file of `dir`, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns a `GeneticError::Configuration` error if `dir` is not a
    /// directory, or an I/O error if it cannot be listed.
    pub fn from_dir(env: Arc<TaskEnv<I, H>>, dir: impl AsRef<Path>) -> Result<Self> {
        let seeds = list_seed_files(dir.as_ref())?;
        info!(dir = %dir.as_ref().display(), seeds = seeds.len(), "found seed files");
        Ok(Self::new(env, seeds))
    }

    /// Number of seed files queued at construction.
    pub fn seed_count(&self) -> usize {
        self.count
    }

    /// Number of seed files not yet handed out.
    pub fn remaining(&self) -> usize {
        self.seeds.lock().len()
    }
}

impl<I, H> TaskFactory for SeedTaskFactory<I, H>
where
    I: Optimizable,
    H: IndividualReader<I> + FitnessFunction<I>,
{
    type Task = SeedTask<I, H>;

    fn create_task(&self, id: u64) -> Self::Task {
        SeedTask {
            env: Arc::clone(&self.env),
            seeds: Arc::clone(&self.seeds),
            id,
        }
    }
}

/// Regular files of `dir`, sorted by name.
pub fn list_seed_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(GeneticError::Configuration(format!(
            "Seed location {} is not a directory",
            dir.display()
        )));
    }
    let mut seeds = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            seeds.push(entry.path());
        }
    }
    seeds.sort();
    Ok(seeds)
}
