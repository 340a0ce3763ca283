mod common;

use std::sync::Arc;

use common::{write_seeds, CountingFitness, NumberFileReader, Tagged};
use genpool::{
    dispatch::{
        seed::list_seed_files, DispatcherConfig, SeedTaskFactory, TaskEnv, ThreadDispatcher,
    },
    ledger::{Ledger, LedgerConfig},
    operators::SeedHelpers,
    pool::{Pool, PoolConfig},
    GeneticError,
};
use tempfile::TempDir;

type Helpers = SeedHelpers<NumberFileReader, CountingFitness>;

fn seed_env(capacity: usize, fitness: CountingFitness) -> Arc<TaskEnv<Tagged, Helpers>> {
    let pool = Pool::new(
        PoolConfig::builder().capacity(capacity).build().unwrap(),
        Tagged::template(),
    );
    let ledger = Ledger::new(LedgerConfig::builder().silent(true).build().unwrap());
    let helpers = SeedHelpers::new(NumberFileReader, fitness);
    Arc::new(TaskEnv::new(Arc::new(pool), Arc::new(ledger), helpers, 5).unwrap())
}

fn dispatch(iterations: usize) -> ThreadDispatcher {
    ThreadDispatcher::new(
        DispatcherConfig::builder()
            .threads(5)
            .iterations(iterations)
            .stop_marker(None)
            .build()
            .unwrap(),
    )
}

#[test]
fn test_each_seed_is_consumed_once() {
    let dir = TempDir::new().unwrap();
    write_seeds(dir.path(), &[3.0, 1.0, 2.0]);

    let fitness = CountingFitness::default();
    let env = seed_env(10, fitness.clone());
    let factory = SeedTaskFactory::from_dir(Arc::clone(&env), dir.path()).unwrap();
    assert_eq!(factory.seed_count(), 3);

    let report = dispatch(5).run(&factory).unwrap();

    assert_eq!(report.submitted, 5);
    assert_eq!(factory.remaining(), 0);
    assert_eq!(fitness.calls(), 3);
    assert_eq!(env.pool().all_fitnesses(), vec![1.0, 2.0, 3.0]);

    let mut ids: Vec<u64> = (0..3)
        .map(|i| env.pool().individual_at(i).unwrap().id)
        .collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 3);
    assert!(ids.iter().all(|id| *id < 5));
}

#[test]
fn test_seeds_bypass_the_acceptance_gate() {
    let dir = TempDir::new().unwrap();
    write_seeds(dir.path(), &[50.0]);

    let env = seed_env(2, CountingFitness::default());
    env.pool().add_individual(Tagged::new(100, 1.0), None).unwrap();
    env.pool().add_individual(Tagged::new(101, 2.0), None).unwrap();
    assert!(!env.pool().has_chance_to_be_added(50.0));

    let factory = SeedTaskFactory::from_dir(Arc::clone(&env), dir.path()).unwrap();
    dispatch(1).run(&factory).unwrap();

    // Forced in at the sorted position, then evicted again as the worst.
    assert_eq!(env.pool().all_fitnesses(), vec![1.0, 2.0]);
    assert_eq!(factory.remaining(), 0);
}

#[test]
fn test_seed_files_are_sorted_by_name() {
    let dir = TempDir::new().unwrap();
    write_seeds(dir.path(), &[1.0, 2.0, 3.0]);
    std::fs::create_dir(dir.path().join("nested")).unwrap();

    let files = list_seed_files(dir.path()).unwrap();
    let names: Vec<_> = files
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["seed00", "seed01", "seed02"]);
}

#[test]
fn test_missing_seed_directory() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("absent");
    assert!(matches!(
        list_seed_files(&missing),
        Err(GeneticError::Configuration(_))
    ));
}
