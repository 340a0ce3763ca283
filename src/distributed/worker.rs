use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::distributed::job::RemoteTask;
use crate::distributed::protocol::{await_greeting, Envelope, Tag, COORDINATOR};
use crate::distributed::staging::PayloadStaging;
use crate::distributed::transport::Communicator;
use crate::error::Result;

/// Sleep between a `WaitFor` and the following `Poll`.
pub const DEFAULT_WAIT_INTERVAL: Duration = Duration::from_millis(100);

/// Why a worker left its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// The coordinator sent `ExitDone`.
    Done,
    /// The wall-clock budget elapsed first.
    BudgetExceeded,
    /// The coordinator sent a tag a worker has no meaning for.
    UnexpectedTag(Tag),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerReport {
    pub tasks: usize,
    pub exit: WorkerExit,
}

/// A non-zero rank of the distributed protocol.
#[derive(Debug)]
pub struct Worker<'a, C: Communicator> {
    comm: &'a C,
    staging: &'a PayloadStaging,
    wait_interval: Duration,
    budget: Option<Duration>,
}

impl<'a, C: Communicator> Worker<'a, C> {
    pub fn new(comm: &'a C, staging: &'a PayloadStaging) -> Self {
        Self {
            comm,
            staging,
            wait_interval: DEFAULT_WAIT_INTERVAL,
            budget: None,
        }
    }

    pub fn with_wait_interval(mut self, interval: Duration) -> Self {
        self.wait_interval = interval;
        self
    }

    /// Leave the loop once `budget` has elapsed, even without `ExitDone`.
    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = Some(budget);
        self
    }

    /// Validates the greeting, then executes tasks until told to stop.
    ///
    /// # Errors
    ///
    /// A bad greeting yields `GeneticError::Protocol`. Failures reading,
    /// executing or writing a task are fatal to the worker and returned.
    pub fn run<T: RemoteTask>(&self, context: &mut T::Context) -> Result<WorkerReport> {
        let start = Instant::now();
        await_greeting(self.comm)?;
        let rank = self.comm.rank();
        let mut tasks = 0usize;

        let exit = loop {
            let Some(envelope) = self.receive(start)? else {
                break WorkerExit::BudgetExceeded;
            };
            match envelope.tag {
                Tag::ExitDone => break WorkerExit::Done,
                Tag::WaitFor => {
                    thread::sleep(self.nap(start));
                    self.comm.send(COORDINATOR, Tag::Poll, "")?;
                }
                Tag::NextTask => {
                    self.execute::<T>(&envelope, context, rank)?;
                    tasks += 1;
                }
                other => {
                    warn!(worker = rank, tag = %other, "unexpected tag, leaving");
                    break WorkerExit::UnexpectedTag(other);
                }
            }
        };

        info!(worker = rank, tasks, exit = ?exit, "worker finished");
        Ok(WorkerReport { tasks, exit })
    }

    fn execute<T: RemoteTask>(
        &self,
        envelope: &Envelope,
        context: &mut T::Context,
        rank: usize,
    ) -> Result<()> {
        let task: T = self.staging.read(&envelope.payload)?;
        let output = task.execute(context, rank)?;
        let result = self.staging.write_result(rank, &output)?;
        self.staging.remove(&envelope.payload)?;
        self.comm
            .send(COORDINATOR, Tag::Result, &result.to_string_lossy())?;
        debug!(worker = rank, task = %envelope.payload, "task done");
        Ok(())
    }

    /// `Ok(None)` once the budget is used up.
    fn receive(&self, start: Instant) -> Result<Option<Envelope>> {
        match self.budget {
            None => self.comm.recv().map(Some),
            Some(budget) => match budget.checked_sub(start.elapsed()) {
                Some(left) if !left.is_zero() => self.comm.recv_timeout(left),
                _ => Ok(None),
            },
        }
    }

    fn nap(&self, start: Instant) -> Duration {
        match self.budget {
            Some(budget) => self
                .wait_interval
                .min(budget.saturating_sub(start.elapsed())),
            None => self.wait_interval,
        }
    }
}
