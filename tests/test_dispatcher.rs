mod common;

use std::collections::BTreeSet;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use common::{LinearInitializer, Tagged, ScalingRecombiner};
use genpool::{
    dispatch::{
        DispatcherConfig, InitTaskFactory, RecombineTaskFactory, StopReason, Task, TaskEnv,
        TaskFactory, ThreadDispatcher,
    },
    ledger::{Ledger, LedgerConfig},
    pool::{Pool, PoolConfig},
    selection::TournamentSelection,
    GeneticError, Result,
};
use tempfile::TempDir;

struct Record {
    id: u64,
    seen: Arc<Mutex<Vec<u64>>>,
}

impl Task for Record {
    fn id(&self) -> u64 {
        self.id
    }

    fn run(self) -> Result<()> {
        self.seen.lock().unwrap().push(self.id);
        Ok(())
    }
}

#[derive(Default)]
struct RecordFactory {
    seen: Arc<Mutex<Vec<u64>>>,
}

impl TaskFactory for RecordFactory {
    type Task = Record;

    fn create_task(&self, id: u64) -> Record {
        Record {
            id,
            seen: Arc::clone(&self.seen),
        }
    }
}

fn config(offset: u64, iterations: usize, subs_to_wait: usize) -> DispatcherConfig {
    DispatcherConfig::builder()
        .threads(4)
        .offset(offset)
        .iterations(iterations)
        .subs_to_wait(subs_to_wait)
        .stop_marker(None)
        .build()
        .unwrap()
}

fn env<H: Clone + Send + Sync>(pool: Pool<Tagged>, helper: H) -> Arc<TaskEnv<Tagged, H>> {
    let ledger = Ledger::new(LedgerConfig::builder().silent(true).build().unwrap());
    Arc::new(TaskEnv::new(Arc::new(pool), Arc::new(ledger), helper, 4).unwrap())
}

#[test]
fn test_throttle_synchronization_points() {
    let factory = RecordFactory::default();
    let report = ThreadDispatcher::new(config(0, 10, 3)).run(&factory).unwrap();

    assert_eq!(report.submitted, 10);
    assert_eq!(report.sync_points, 4);
    assert!(report.stopped.is_none());
}

#[test]
fn test_submits_exactly_the_requested_ids() {
    let factory = RecordFactory::default();
    let report = ThreadDispatcher::new(config(100, 37, 5)).run(&factory).unwrap();

    assert_eq!(report.first_id, 100);
    let seen: BTreeSet<u64> = factory.seen.lock().unwrap().iter().copied().collect();
    assert_eq!(seen, (100..137).collect());
    assert_eq!(factory.seen.lock().unwrap().len(), 37);
}

#[test]
fn test_stop_marker_ends_phase_at_next_sync_point() {
    let dir = TempDir::new().unwrap();
    let marker = dir.path().join("STOP");
    fs::write(&marker, "").unwrap();

    let config = DispatcherConfig::builder()
        .threads(2)
        .iterations(10)
        .subs_to_wait(2)
        .stop_marker(Some(marker.clone()))
        .build()
        .unwrap();
    let factory = RecordFactory::default();
    let report = ThreadDispatcher::new(config).run(&factory).unwrap();

    assert_eq!(report.submitted, 2);
    assert_eq!(report.stopped, Some(StopReason::StopMarker(marker)));
    assert_eq!(factory.seen.lock().unwrap().len(), 2);
}

#[test]
fn test_acceptable_fitness_ends_initialization() {
    let pool = Pool::new(
        PoolConfig::builder()
            .capacity(20)
            .acceptable_fitness(105.0)
            .build()
            .unwrap(),
        Tagged::template(),
    );
    let initializer = LinearInitializer::new(100.0);
    let factory = InitTaskFactory::new(env(pool, initializer.clone()));

    let report = ThreadDispatcher::new(config(0, 20, 1)).run(&factory).unwrap();

    assert_eq!(report.submitted, 1);
    assert_eq!(report.stopped, Some(StopReason::AcceptableFitness));
    assert_eq!(initializer.calls(), 1);
}

struct Flaky {
    id: u64,
    done: Arc<AtomicUsize>,
}

impl Task for Flaky {
    fn id(&self) -> u64 {
        self.id
    }

    fn run(self) -> Result<()> {
        match self.id % 3 {
            0 => panic!("task {} blew up", self.id),
            1 => Err(GeneticError::Task(format!("task {} failed", self.id))),
            _ => {
                self.done.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }
    }
}

struct FlakyFactory(Arc<AtomicUsize>);

impl TaskFactory for FlakyFactory {
    type Task = Flaky;

    fn create_task(&self, id: u64) -> Flaky {
        Flaky {
            id,
            done: Arc::clone(&self.0),
        }
    }
}

#[test]
fn test_failing_tasks_do_not_stop_the_phase() {
    let done = Arc::new(AtomicUsize::new(0));
    let report = ThreadDispatcher::new(config(0, 9, 2))
        .run(&FlakyFactory(Arc::clone(&done)))
        .unwrap();

    assert_eq!(report.submitted, 9);
    assert_eq!(done.load(Ordering::SeqCst), 3);
}

#[test]
fn test_initialization_fills_pool_with_and_without_cache() {
    for use_cache in [true, false] {
        let pool = Pool::new(
            PoolConfig::builder().capacity(16).build().unwrap(),
            Tagged::template(),
        );
        let ledger = Ledger::new(LedgerConfig::builder().silent(true).build().unwrap());
        let env = TaskEnv::new(Arc::new(pool), Arc::new(ledger), LinearInitializer::new(0.0), 4)
            .unwrap()
            .with_cache(use_cache);
        let env = Arc::new(env);
        let factory = InitTaskFactory::new(Arc::clone(&env));

        ThreadDispatcher::new(config(0, 16, 4)).run(&factory).unwrap();

        assert_eq!(env.pool().len(), 16);
        let ids: BTreeSet<u64> = (0..16)
            .map(|i| env.pool().individual_at(i).unwrap().id)
            .collect();
        assert_eq!(ids, (0..16).collect());
        assert_eq!(env.helper_cache().in_use(), 0);
    }
}

#[test]
fn test_recombination_records_every_attempt() {
    let pool = Pool::new(
        PoolConfig::builder().capacity(8).build().unwrap(),
        Tagged::template(),
    );
    for i in 0..8 {
        pool.add_individual(Tagged::new(i, 10.0 + i as f64), None).unwrap();
    }
    let ledger = Arc::new(Ledger::new(
        LedgerConfig::builder().silent(true).build().unwrap(),
    ));
    let recombiner = ScalingRecombiner::new(0.5, 4);
    let env = Arc::new(
        TaskEnv::new(Arc::new(pool), Arc::clone(&ledger), recombiner.clone(), 4).unwrap(),
    );
    let factory = RecombineTaskFactory::new(
        Arc::clone(&env),
        Arc::new(TournamentSelection::default()),
    );

    let report = ThreadDispatcher::new(config(8, 20, 4)).run(&factory).unwrap();

    assert_eq!(report.submitted, 20);
    assert_eq!(recombiner.calls(), 20);
    let totals = ledger.totals();
    assert_eq!(totals.total, 20);
    // Ids 8, 12, 16, 20 and 24 produce no child.
    assert_eq!(totals.null, 5);
    assert_eq!(totals.total, totals.accepted + totals.null + totals.rejected);
    assert!(env.pool().best().unwrap().fitness < 10.0);
}
