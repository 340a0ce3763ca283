//! # Pool
//!
//! The bounded, ranked population shared by every worker thread.
//!
//! Entries are kept in ascending fitness order (best first, ties in arrival
//! order) and the pool never holds more than `capacity` of them. All mutation
//! goes through a single writer lock; readers (parent selection, formatted
//! output, statistics) only block against writers.
//!
//! Acceptance is split in two:
//!
//! - [`Pool::has_chance_to_be_added`] reads an atomically published gate
//!   value (the worst retained fitness while the pool is full) without
//!   taking the lock, so a worker can drop a hopeless candidate before
//!   paying for niche computation. Two workers may both pass it for the
//!   same last slot.
//! - [`Pool::add_individual`] re-checks everything under the writer lock and
//!   is the only authoritative decision.
//!
//! With niching, each entry belongs to one [`Niche`] and a full niche only
//! admits a newcomer that beats the niche's own worst entry, which is then
//! evicted.
//!
//! ## Example
//!
//! ```rust
//! use genpool::individual::Optimizable;
//! use genpool::pool::{Pool, PoolConfig};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Clone, Debug, Serialize, Deserialize)]
//! struct Candidate {
//!     id: u64,
//!     fitness: f64,
//! }
//!
//! impl Optimizable for Candidate {
//!     fn id(&self) -> u64 { self.id }
//!     fn set_id(&mut self, id: u64) { self.id = id; }
//!     fn fitness(&self) -> f64 { self.fitness }
//! }
//!
//! let config = PoolConfig::builder().capacity(2).build().unwrap();
//! let pool = Pool::new(config, Candidate { id: 0, fitness: 0.0 });
//!
//! assert!(pool.add_individual(Candidate { id: 1, fitness: 3.0 }, None).unwrap());
//! assert!(pool.add_individual(Candidate { id: 2, fitness: 1.0 }, None).unwrap());
//! assert!(!pool.has_chance_to_be_added(5.0));
//! assert!(!pool.add_individual(Candidate { id: 3, fitness: 5.0 }, None).unwrap());
//! assert_eq!(pool.fitness_at(0).unwrap(), 1.0);
//! ```

pub mod config;
pub mod diversity;
pub mod niche;

use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::{GeneticError, Result, ResultExt};
use crate::individual::Optimizable;
use crate::rng::RandomNumberGenerator;
use crate::selection::ParentSelector;

pub use config::{PoolConfig, PoolConfigBuilder};
pub use diversity::{DiversityChecker, FitnessDiversity};
pub use niche::{FitnessBinNiches, Niche, NicheCensus, NicheComputer};

/// Format tag written into every pool snapshot.
pub const SNAPSHOT_FORMAT: &str = "genpool-pool";
/// Current pool snapshot version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// An individual together with the niche it was assigned on insertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolEntry<I> {
    individual: I,
    niche: Option<Niche>,
}

impl<I: Optimizable> PoolEntry<I> {
    pub fn new(individual: I, niche: Option<Niche>) -> Self {
        Self { individual, niche }
    }

    pub fn individual(&self) -> &I {
        &self.individual
    }

    pub fn niche(&self) -> Option<&Niche> {
        self.niche.as_ref()
    }

    pub fn fitness(&self) -> f64 {
        self.individual.fitness()
    }

    pub fn into_individual(self) -> I {
        self.individual
    }

    fn niche_id(&self) -> Option<&str> {
        self.niche.as_ref().map(|n| n.id())
    }
}

/// A self-describing, versioned copy of the pool content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSnapshot<I> {
    pub format: String,
    pub version: u32,
    pub capacity: usize,
    pub entries: Vec<PoolEntry<I>>,
}

#[derive(Serialize)]
struct SnapshotRef<'a, I> {
    format: &'static str,
    version: u32,
    capacity: usize,
    entries: &'a [PoolEntry<I>],
}

enum DiversityVerdict {
    Insert,
    Replace(usize),
    Reject,
}

#[derive(Debug)]
struct PoolState<I> {
    entries: Vec<PoolEntry<I>>,
    census: NicheCensus,
    adds_since_checkpoint: usize,
    adds_since_stats: usize,
}

impl<I: Optimizable> PoolState<I> {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            census: NicheCensus::default(),
            adds_since_checkpoint: 0,
            adds_since_stats: 0,
        }
    }

    fn best(&self) -> Option<f64> {
        self.entries.first().map(PoolEntry::fitness)
    }

    fn worst(&self) -> Option<f64> {
        self.entries.last().map(PoolEntry::fitness)
    }

    /// Inserts behind every entry with equal or better fitness.
    fn insert_sorted(&mut self, entry: PoolEntry<I>) -> usize {
        let fitness = entry.fitness();
        let position = self.entries.partition_point(|e| e.fitness() <= fitness);
        if let Some(id) = entry.niche_id() {
            self.census.report(id);
        }
        self.entries.insert(position, entry);
        position
    }

    fn remove(&mut self, position: usize) -> PoolEntry<I> {
        let entry = self.entries.remove(position);
        if let Some(id) = entry.niche_id() {
            self.census.remove(id);
        }
        entry
    }

    fn ensure_size(&mut self, capacity: usize) {
        while self.entries.len() > capacity {
            let evicted = self.remove(self.entries.len() - 1);
            debug!(
                id = evicted.individual.id(),
                fitness = evicted.fitness(),
                "evicted worst individual"
            );
        }
    }

    fn check(&self, position: usize) -> Result<&PoolEntry<I>> {
        self.entries.get(position).ok_or(GeneticError::OutOfBounds {
            position,
            size: self.entries.len(),
        })
    }
}

/// The concurrently mutated, ranked population.
#[derive(Debug)]
pub struct Pool<I: Optimizable> {
    config: PoolConfig,
    example: I,
    state: RwLock<PoolState<I>>,
    /// Bits of the worst retained fitness while full, `+inf` otherwise.
    gate: AtomicU64,
    diversity: Option<Box<dyn DiversityChecker<I>>>,
}

impl<I: Optimizable> Pool<I> {
    /// Creates an empty pool. `example` is the template handed to
    /// initializers and seed readers.
    pub fn new(config: PoolConfig, example: I) -> Self {
        Self {
            config,
            example,
            state: RwLock::new(PoolState::new()),
            gate: AtomicU64::new(f64::INFINITY.to_bits()),
            diversity: None,
        }
    }

    /// Enables the diversity check on the non-niched insertion path.
    pub fn with_diversity_checker<D>(mut self, checker: D) -> Self
    where
        D: DiversityChecker<I> + 'static,
    {
        self.diversity = Some(Box::new(checker));
        self
    }

    /// Restores a pool from a snapshot written by [`Pool::write_snapshot`].
    ///
    /// Entries beyond the configured capacity are dropped, worst first.
    pub fn resume(config: PoolConfig, example: I, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = fs::File::open(path)
            .context(format!("Failed to open pool snapshot {}", path.display()))?;
        let snapshot: PoolSnapshot<I> = serde_json::from_reader(BufReader::new(file))?;
        if snapshot.format != SNAPSHOT_FORMAT || snapshot.version != SNAPSHOT_VERSION {
            return Err(GeneticError::Configuration(format!(
                "{} is not a version {} pool snapshot (found {} v{})",
                path.display(),
                SNAPSHOT_VERSION,
                snapshot.format,
                snapshot.version
            )));
        }
        if snapshot.entries.len() > config.capacity() {
            warn!(
                stored = snapshot.entries.len(),
                capacity = config.capacity(),
                "snapshot holds more entries than the pool capacity, dropping the worst"
            );
        }

        let pool = Self::new(config, example);
        pool.replace_content(snapshot.entries)?;
        info!(path = %path.display(), size = pool.len(), "resumed pool from snapshot");
        Ok(pool)
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity()
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }

    /// The template individual.
    pub fn example(&self) -> &I {
        &self.example
    }

    /// Cheap pre-check against the published gate. Never takes the lock and
    /// never consults niches; the answer may already be stale.
    pub fn has_chance_to_be_added(&self, fitness: f64) -> bool {
        fitness < f64::from_bits(self.gate.load(Ordering::Acquire))
    }

    /// Inserts `individual` if the acceptance policy allows it.
    ///
    /// Returns `Ok(false)` for a normal rejection.
    ///
    /// # Errors
    ///
    /// Returns `GeneticError::InvalidNumericValue` for a NaN or infinite
    /// fitness.
    pub fn add_individual(&self, individual: I, niche: Option<Niche>) -> Result<bool> {
        let fitness = finite_fitness(&individual)?;
        let capacity = self.capacity();
        let mut state = self.state.write();

        if state.entries.len() >= capacity && state.worst().is_some_and(|w| fitness >= w) {
            return Ok(false);
        }
        let previous_best = state.best();

        let position = match niche {
            Some(niche) => {
                let limit = niche.capacity().unwrap_or(self.config.max_per_niche());
                if state.census.count(niche.id()) >= limit {
                    let niche_worst = state
                        .entries
                        .iter()
                        .rposition(|e| e.niche_id() == Some(niche.id()));
                    match niche_worst {
                        Some(pos) if fitness < state.entries[pos].fitness() => {
                            let evicted = state.remove(pos);
                            debug!(
                                niche = niche.id(),
                                evicted = evicted.individual.id(),
                                "replaced worst individual of full niche"
                            );
                        }
                        _ => return Ok(false),
                    }
                }
                state.insert_sorted(PoolEntry::new(individual, Some(niche)))
            }
            None => match self.diversity_verdict(&state, &individual) {
                DiversityVerdict::Reject => return Ok(false),
                DiversityVerdict::Replace(pos) => {
                    state.remove(pos);
                    state.insert_sorted(PoolEntry::new(individual, None))
                }
                DiversityVerdict::Insert => state.insert_sorted(PoolEntry::new(individual, None)),
            },
        };

        state.ensure_size(capacity);
        self.publish_gate(&state);
        let new_best = position == 0 && previous_best.map_or(true, |b| fitness < b);
        self.micro_manage(&mut state, new_best, true);
        Ok(true)
    }

    /// Inserts without any gate or niche limit, evicting the worst entry on
    /// overflow. Returns whether the individual is still retained.
    pub fn add_individual_forced(&self, individual: I, niche: Option<Niche>) -> Result<bool> {
        let fitness = finite_fitness(&individual)?;
        let capacity = self.capacity();
        let mut state = self.state.write();

        let previous_best = state.best();
        let position = state.insert_sorted(PoolEntry::new(individual, niche));
        state.ensure_size(capacity);
        self.publish_gate(&state);

        let retained = position < capacity;
        if retained {
            let new_best = position == 0 && previous_best.map_or(true, |b| fitness < b);
            self.micro_manage(&mut state, new_best, false);
        }
        Ok(retained)
    }

    /// Whether the best retained fitness is at or below the configured
    /// acceptable fitness.
    pub fn acceptable_fitness_reached(&self) -> bool {
        self.state
            .read()
            .best()
            .is_some_and(|best| best <= self.config.acceptable_fitness())
    }

    pub fn entry_at(&self, position: usize) -> Result<PoolEntry<I>> {
        self.state.read().check(position).cloned()
    }

    pub fn individual_at(&self, position: usize) -> Result<I> {
        Ok(self.state.read().check(position)?.individual.clone())
    }

    pub fn fitness_at(&self, position: usize) -> Result<f64> {
        Ok(self.state.read().check(position)?.fitness())
    }

    pub fn niche_at(&self, position: usize) -> Result<Option<Niche>> {
        Ok(self.state.read().check(position)?.niche.clone())
    }

    pub fn best(&self) -> Option<I> {
        self.state
            .read()
            .entries
            .first()
            .map(|e| e.individual.clone())
    }

    pub fn all_fitnesses(&self) -> Vec<f64> {
        self.state.read().entries.iter().map(PoolEntry::fitness).collect()
    }

    /// Picks two parents with `selector` under the read lock.
    pub fn get_parents(
        &self,
        selector: &dyn ParentSelector,
        rng: &mut RandomNumberGenerator,
    ) -> Result<(I, I)> {
        let state = self.state.read();
        let fitness: Vec<f64> = state.entries.iter().map(PoolEntry::fitness).collect();
        let (mother, father) = selector.select_parents(&fitness, rng)?;
        Ok((
            state.check(mother)?.individual.clone(),
            state.check(father)?.individual.clone(),
        ))
    }

    pub fn remove_at(&self, position: usize) -> Result<I> {
        let mut state = self.state.write();
        state.check(position)?;
        let entry = state.remove(position);
        self.publish_gate(&state);
        Ok(entry.individual)
    }

    pub fn clear(&self) {
        let mut state = self.state.write();
        state.entries.clear();
        state.census.clear();
        self.publish_gate(&state);
    }

    /// Replaces the whole content.
    ///
    /// # Errors
    ///
    /// Returns a `GeneticError::Configuration` error if `entries` is not in
    /// ascending fitness order, or `InvalidNumericValue` for a non-finite
    /// fitness.
    pub fn replace_content(&self, entries: Vec<PoolEntry<I>>) -> Result<()> {
        for entry in &entries {
            finite_fitness(&entry.individual)?;
        }
        if entries.windows(2).any(|w| w[0].fitness() > w[1].fitness()) {
            return Err(GeneticError::Configuration(
                "Replacement pool content is not ordered by fitness".to_string(),
            ));
        }

        let mut state = self.state.write();
        state.census.clear();
        for id in entries.iter().filter_map(PoolEntry::niche_id) {
            state.census.report(id);
        }
        state.entries = entries;
        state.ensure_size(self.capacity());
        self.publish_gate(&state);
        Ok(())
    }

    /// Runs `f` on the entries under the read lock.
    pub fn with_entries<R>(&self, f: impl FnOnce(&[PoolEntry<I>]) -> R) -> R {
        f(&self.state.read().entries)
    }

    /// Occupied niches with their sizes, sorted by niche id.
    pub fn niche_population(&self) -> Vec<(String, usize)> {
        self.state.read().census.populations()
    }

    /// One line per entry: position, id and fitness.
    pub fn formatted_pool(&self) -> Vec<String> {
        self.state
            .read()
            .entries
            .iter()
            .enumerate()
            .map(|(pos, e)| format!("{:6}   {:10}  {:18.10}", pos, e.individual.id(), e.fitness()))
            .collect()
    }

    pub fn snapshot(&self) -> PoolSnapshot<I> {
        PoolSnapshot {
            format: SNAPSHOT_FORMAT.to_string(),
            version: SNAPSHOT_VERSION,
            capacity: self.capacity(),
            entries: self.state.read().entries.clone(),
        }
    }

    /// Writes the current content as a JSON snapshot.
    pub fn write_snapshot(&self, path: impl AsRef<Path>) -> Result<()> {
        let state = self.state.read();
        self.write_entries(&state.entries, path.as_ref())
    }

    fn write_entries(&self, entries: &[PoolEntry<I>], path: &Path) -> Result<()> {
        let snapshot = SnapshotRef {
            format: SNAPSHOT_FORMAT,
            version: SNAPSHOT_VERSION,
            capacity: self.capacity(),
            entries,
        };
        let tmp = path.with_extension("tmp");
        {
            let file = fs::File::create(&tmp)
                .context(format!("Failed to create pool snapshot {}", tmp.display()))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, &snapshot)?;
            writer.flush()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }

    fn publish_gate(&self, state: &PoolState<I>) {
        let gate = match state.worst() {
            Some(worst) if state.entries.len() >= self.capacity() => worst,
            _ => f64::INFINITY,
        };
        self.gate.store(gate.to_bits(), Ordering::Release);
    }

    fn diversity_verdict(&self, state: &PoolState<I>, individual: &I) -> DiversityVerdict {
        let Some(checker) = &self.diversity else {
            return DiversityVerdict::Insert;
        };
        let fitness = individual.fitness();
        let position = state.entries.partition_point(|e| e.fitness() <= fitness);

        if position > 0 && !checker.are_diverse(&state.entries[position - 1].individual, individual)
        {
            DiversityVerdict::Reject
        } else if position < state.entries.len()
            && !checker.are_diverse(&state.entries[position].individual, individual)
        {
            DiversityVerdict::Replace(position)
        } else {
            DiversityVerdict::Insert
        }
    }

    /// Periodic checkpointing and niche statistics after a successful insert.
    fn micro_manage(&self, state: &mut PoolState<I>, new_best: bool, gated: bool) {
        state.adds_since_checkpoint += 1;
        let due = state.adds_since_checkpoint >= self.config.adds_to_checkpoint()
            || (new_best && self.config.checkpoint_after_new_best());
        if due {
            if let Some(path) = self.config.checkpoint_path() {
                self.checkpoint(&state.entries, path);
            }
            state.adds_since_checkpoint = 0;
        }

        if gated {
            state.adds_since_stats += 1;
            if state.adds_since_stats >= self.config.adds_to_stats() {
                state.adds_since_stats = 0;
                let populations = state.census.populations();
                if !populations.is_empty() {
                    info!(niches = populations.len(), population = ?populations, "niche population");
                }
            }
        }
    }

    fn checkpoint(&self, entries: &[PoolEntry<I>], path: &Path) {
        if let Err(first) = self.write_entries(entries, path) {
            warn!(error = %first, path = %path.display(), "pool checkpoint failed, retrying once");
            if let Err(second) = self.write_entries(entries, path) {
                error!(error = %second, path = %path.display(), "pool checkpoint abandoned");
            }
        }
    }
}

fn finite_fitness<I: Optimizable>(individual: &I) -> Result<f64> {
    let fitness = individual.fitness();
    if !fitness.is_finite() {
        return Err(GeneticError::InvalidNumericValue(format!(
            "Individual {} has fitness {}",
            individual.id(),
            fitness
        )));
    }
    Ok(fitness)
}
