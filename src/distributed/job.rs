//! The work source driven by a [`Coordinator`](super::Coordinator).

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{GeneticError, Result};

/// Whether a job still expects results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Running,
    Finished,
}

/// A unit of work that crosses the process boundary.
///
/// Tasks and their outputs travel as payload files, so both must be
/// serializable. `Context` is whatever per-worker state the task needs to
/// run (operators, scratch buffers) and never leaves the worker.
pub trait RemoteTask: Serialize + DeserializeOwned {
    type Output: Serialize + DeserializeOwned;
    type Context;

    fn execute(self, context: &mut Self::Context, rank: usize) -> Result<Self::Output>;
}

/// Hands out tasks and absorbs their results.
pub trait Job {
    type Task: RemoteTask;

    /// The next task to dispatch. `Ok(None)` means none is ready yet, the
    /// asking worker is told to wait.
    fn next_task(&mut self) -> Result<Option<Self::Task>>;

    fn submit_result(
        &mut self,
        result: <Self::Task as RemoteTask>::Output,
    ) -> Result<JobState>;

    /// Called instead of [`submit_result`](Job::submit_result) when the
    /// result of `task` came back unreadable. The task counts as done.
    fn task_lost(&mut self, task: Self::Task, error: &GeneticError) -> Result<JobState>;

    fn is_finished(&self) -> bool;
}
