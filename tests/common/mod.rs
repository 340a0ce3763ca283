// Shared fixtures for the integration tests. Not every test binary uses
// every item.
#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use genpool::{
    operators::{FitnessFunction, IndividualReader, Initializer, Recombiner},
    GeneticError, Optimizable, Result, ResultExt,
};
use serde::{Deserialize, Serialize};

/// A minimal individual: nothing but identity and fitness.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tagged {
    pub id: u64,
    pub fitness: f64,
}

impl Tagged {
    pub fn new(id: u64, fitness: f64) -> Self {
        Self { id, fitness }
    }

    pub fn template() -> Self {
        Self::new(0, 0.0)
    }
}

impl Optimizable for Tagged {
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

/// Gives individual `id` the fitness `base + id`, counting calls across
/// every duplicate.
#[derive(Clone, Debug)]
pub struct LinearInitializer {
    pub base: f64,
    pub calls: Arc<AtomicUsize>,
}

impl LinearInitializer {
    pub fn new(base: f64) -> Self {
        Self {
            base,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Initializer<Tagged> for LinearInitializer {
    fn initialize(&mut self, template: &Tagged, id: u64) -> Result<Tagged> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut tagged = template.clone();
        tagged.id = id;
        tagged.fitness = self.base + id as f64;
        Ok(tagged)
    }
}

/// Child fitness is the better parent's fitness scaled by `factor`. Every
/// id divisible by `null_every` yields no child.
#[derive(Clone, Debug)]
pub struct ScalingRecombiner {
    pub factor: f64,
    pub null_every: u64,
    pub calls: Arc<AtomicUsize>,
}

impl ScalingRecombiner {
    pub fn new(factor: f64, null_every: u64) -> Self {
        Self {
            factor,
            null_every,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Recombiner<Tagged> for ScalingRecombiner {
    fn recombine(&mut self, id: u64, mother: &Tagged, father: &Tagged) -> Result<Option<Tagged>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.null_every > 0 && id % self.null_every == 0 {
            return Ok(None);
        }
        let best = mother.fitness.min(father.fitness);
        Ok(Some(Tagged::new(id, best * self.factor)))
    }
}

/// Reads a seed file holding a single number, the raw fitness.
#[derive(Clone, Debug, Default)]
pub struct NumberFileReader;

impl IndividualReader<Tagged> for NumberFileReader {
    fn read_individual(&mut self, template: &Tagged, path: &Path) -> Result<Tagged> {
        let text = fs::read_to_string(path)
            .context(format!("Failed to read seed {}", path.display()))?;
        let fitness = text.trim().parse::<f64>().map_err(|e| {
            GeneticError::InvalidNumericValue(format!("{}: {}", path.display(), e))
        })?;
        let mut tagged = template.clone();
        tagged.fitness = fitness;
        Ok(tagged)
    }
}

/// Evaluation that only counts how often it ran.
#[derive(Clone, Debug, Default)]
pub struct CountingFitness {
    pub calls: Arc<AtomicUsize>,
}

impl CountingFitness {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FitnessFunction<Tagged> for CountingFitness {
    fn evaluate(&mut self, individual: Tagged) -> Result<Tagged> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(individual)
    }
}

/// Writes `fitnesses.len()` seed files named `seed00`, `seed01`, ...
pub fn write_seeds(dir: &Path, fitnesses: &[f64]) {
    for (i, fitness) in fitnesses.iter().enumerate() {
        fs::write(dir.join(format!("seed{:02}", i)), fitness.to_string()).unwrap();
    }
}

/// Logs to the test output when `RUST_LOG` is set.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
