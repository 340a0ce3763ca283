//! # Operators
//!
//! Pluggable collaborators that produce and evaluate individuals. The engine
//! never looks inside them; it only duplicates them into per-worker helper
//! slots (see [`crate::cache::ObjectCache`]) and calls them from tasks.
//!
//! Every operator takes `&mut self` so that an implementation is free to hold
//! expensive mutable state such as a local optimizer workspace or its own
//! random number generator. Each in-flight task gets exclusive access to one
//! duplicate.

use std::fmt::Debug;
use std::path::Path;

use crate::error::Result;
use crate::individual::Optimizable;

/// Creates fresh individuals for the initialization phase.
pub trait Initializer<I: Optimizable>: Clone + Debug + Send + Sync {
    /// Builds and evaluates a new individual from `template`, tagged with `id`.
    fn initialize(&mut self, template: &I, id: u64) -> Result<I>;
}

/// Produces one evaluated child from two parents.
pub trait Recombiner<I: Optimizable>: Clone + Debug + Send + Sync {
    /// Returns `Ok(None)` when the attempt produced no viable child, e.g. a
    /// rejected geometry or a local optimization that did not converge.
    fn recombine(&mut self, id: u64, mother: &I, father: &I) -> Result<Option<I>>;
}

/// Reads externally produced individuals from disk.
pub trait IndividualReader<I: Optimizable>: Clone + Debug + Send + Sync {
    /// Populates a duplicate of `template` from the file at `path`.
    fn read_individual(&mut self, template: &I, path: &Path) -> Result<I>;
}

/// Evaluates the fitness of an individual.
pub trait FitnessFunction<I: Optimizable>: Clone + Debug + Send + Sync {
    /// Consumes the individual and returns it with its fitness filled in.
    fn evaluate(&mut self, individual: I) -> Result<I>;
}

/// Pairs a reader with a fitness function so that both can live in one
/// helper slot for the seeding phase.
#[derive(Debug, Clone)]
pub struct SeedHelpers<R, F> {
    pub reader: R,
    pub fitness: F,
}

impl<R, F> SeedHelpers<R, F> {
    pub fn new(reader: R, fitness: F) -> Self {
        Self { reader, fitness }
    }
}

impl<I, R, F> IndividualReader<I> for SeedHelpers<R, F>
where
    I: Optimizable,
    R: IndividualReader<I>,
    F: FitnessFunction<I>,
{
    fn read_individual(&mut self, template: &I, path: &Path) -> Result<I> {
        self.reader.read_individual(template, path)
    }
}

impl<I, R, F> FitnessFunction<I> for SeedHelpers<R, F>
where
    I: Optimizable,
    R: IndividualReader<I>,
    F: FitnessFunction<I>,
{
    fn evaluate(&mut self, individual: I) -> Result<I> {
        self.fitness.evaluate(individual)
    }
}
