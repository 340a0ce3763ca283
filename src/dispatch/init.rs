use std::sync::Arc;

use tracing::debug;

use crate::dispatch::task::{Task, TaskEnv, TaskFactory};
use crate::error::Result;
use crate::individual::Optimizable;
use crate::operators::Initializer;

/// Creates one fresh individual from the pool template and offers it to the
/// pool through the normal acceptance policy.
#[derive(Debug)]
pub struct InitTask<I: Optimizable, H> {
    env: Arc<TaskEnv<I, H>>,
    id: u64,
}

impl<I, H> Task for InitTask<I, H>
where
    I: Optimizable,
    H: Initializer<I>,
{
    fn id(&self) -> u64 {
        self.id
    }

    fn run(self) -> Result<()> {
        let env = &self.env;
        let id = self.id;
        env.with_helper(|initializer| {
            let mut individual = initializer.initialize(env.pool().example(), id)?;
            if individual.id() != id {
                individual.set_id(id);
            }
            let fitness = individual.fitness();
            let niche = env.compute_niche(&individual)?;
            let accepted = env.pool().add_individual(individual, niche)?;
            debug!(task = id, fitness, accepted, "initialized individual");
            Ok(())
        })
    }
}

#[derive(Debug)]
pub struct InitTaskFactory<I: Optimizable, H> {
    env: Arc<TaskEnv<I, H>>,
}

impl<I: Optimizable, H> InitTaskFactory<I, H> {
    pub fn new(env: Arc<TaskEnv<I, H>>) -> Self {
        Self { env }
    }
}

impl<I, H> TaskFactory for InitTaskFactory<I, H>
where
    I: Optimizable,
    H: Initializer<I>,
{
    type Task = InitTask<I, H>;

    fn create_task(&self, id: u64) -> Self::Task {
        InitTask {
            env: Arc::clone(&self.env),
            id,
        }
    }

    fn acceptable_fitness_reached(&self) -> bool {
        self.env.pool().acceptable_fitness_reached()
    }
}
