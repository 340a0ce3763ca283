use std::sync::Arc;

use tracing::{debug, trace};

use crate::dispatch::task::{Task, TaskEnv, TaskFactory};
use crate::error::Result;
use crate::individual::Optimizable;
use crate::ledger::LineageRecord;
use crate::operators::Recombiner;
use crate::rng::RandomNumberGenerator;
use crate::selection::ParentSelector;

/// Recombines two pool members into a child and offers it to the pool.
///
/// Every attempt leaves exactly one lineage record, whether the child was
/// null, hopeless or actually inserted.
#[derive(Debug)]
pub struct RecombineTask<I: Optimizable, H> {
    env: Arc<TaskEnv<I, H>>,
    selector: Arc<dyn ParentSelector>,
    id: u64,
}

impl<I, H> Task for RecombineTask<I, H>
where
    I: Optimizable,
    H: Recombiner<I>,
{
    fn id(&self) -> u64 {
        self.id
    }

    fn run(self) -> Result<()> {
        let env = &self.env;
        let id = self.id;
        if env.pool().acceptable_fitness_reached() {
            trace!(task = id, "target fitness already reached, skipping");
            return Ok(());
        }

        let mut rng = RandomNumberGenerator::new();
        let (mother, father) = env.pool().get_parents(self.selector.as_ref(), &mut rng)?;
        let (mother_id, father_id) = (mother.id(), father.id());

        env.with_helper(|recombiner| {
            let Some(mut child) = recombiner.recombine(id, &mother, &father)? else {
                env.ledger()
                    .add_family(LineageRecord::null(id, mother_id, father_id));
                trace!(task = id, "recombination produced no child");
                return Ok(());
            };
            child.set_id(id);
            let fitness = child.fitness();

            if !env.pool().has_chance_to_be_added(fitness) {
                env.ledger().add_family(LineageRecord::offspring(
                    id, mother_id, father_id, fitness, false,
                ));
                return Ok(());
            }

            let niche = env.compute_niche(&child)?;
            let accepted = env.pool().add_individual(child, niche)?;
            env.ledger().add_family(LineageRecord::offspring(
                id, mother_id, father_id, fitness, accepted,
            ));
            if accepted {
                debug!(task = id, fitness, "child accepted into pool");
            }
            Ok(())
        })
    }
}

#[derive(Debug)]
pub struct RecombineTaskFactory<I: Optimizable, H> {
    env: Arc<TaskEnv<I, H>>,
    selector: Arc<dyn ParentSelector>,
}

impl<I: Optimizable, H> RecombineTaskFactory<I, H> {
    pub fn new(env: Arc<TaskEnv<I, H>>, selector: Arc<dyn ParentSelector>) -> Self {
        Self { env, selector }
    }
}

impl<I, H> TaskFactory for RecombineTaskFactory<I, H>
where
    I: Optimizable,
    H: Recombiner<I>,
{
    type Task = RecombineTask<I, H>;

    fn create_task(&self, id: u64) -> Self::Task {
        RecombineTask {
            env: Arc::clone(&self.env),
            selector: Arc::clone(&self.selector),
            id,
        }
    }

    fn acceptable_fitness_reached(&self) -> bool {
        self.env.pool().acceptable_fitness_reached()
    }
}
