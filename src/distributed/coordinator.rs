use tracing::{debug, error, info, trace, warn};

use crate::distributed::job::{Job, JobState};
use crate::distributed::protocol::{announce, Tag};
use crate::distributed::staging::PayloadStaging;
use crate::distributed::transport::Communicator;
use crate::error::{GeneticError, Result};

/// Counters of one coordinator run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinatorReport {
    /// Tasks sent to workers.
    pub dispatched: usize,
    /// Results received and submitted to the job.
    pub results: usize,
    /// Results that could not be read back and were reported as lost.
    pub lost: usize,
    /// `WaitFor` answers sent.
    pub waits: usize,
}

/// Rank 0 of the distributed protocol.
///
/// Every worker has at most one thing in flight: either a task, or a
/// `WaitFor` it will answer with a `Poll` after sleeping. The coordinator
/// only ever answers the worker that just spoke, so each message received
/// is followed by exactly one reply to its source.
#[derive(Debug)]
pub struct Coordinator<'a, C: Communicator> {
    comm: &'a C,
    staging: &'a PayloadStaging,
}

impl<'a, C: Communicator> Coordinator<'a, C> {
    pub fn new(comm: &'a C, staging: &'a PayloadStaging) -> Self {
        Self { comm, staging }
    }

    /// Drives `job` to completion and shuts all workers down.
    ///
    /// `ExitDone` goes out to every worker whether the run succeeded or not.
    ///
    /// # Errors
    ///
    /// Returns `GeneticError::Protocol` on a failed handshake or when a
    /// worker sends a tag the coordinator does not expect. Job, staging and
    /// transport failures are propagated as they are.
    pub fn run<J: Job>(&self, job: &mut J) -> Result<CoordinatorReport> {
        let mut report = CoordinatorReport::default();
        match self.drive(job, &mut report) {
            Ok(()) => {
                self.release_workers()?;
                info!(
                    dispatched = report.dispatched,
                    results = report.results,
                    lost = report.lost,
                    waits = report.waits,
                    "coordinator finished"
                );
                Ok(report)
            }
            Err(e) => {
                error!(error = %e, dispatched = report.dispatched, "coordinator failed, releasing workers");
                if let Err(release) = self.release_workers() {
                    warn!(error = %release, "could not release every worker");
                }
                Err(e)
            }
        }
    }

    fn drive<J: Job>(&self, job: &mut J, report: &mut CoordinatorReport) -> Result<()> {
        announce(self.comm)?;
        let mut in_flight: Vec<Option<J::Task>> = (0..self.comm.size()).map(|_| None).collect();

        for worker in 1..self.comm.size() {
            in_flight[worker] = self.answer(worker, job, report)?;
        }

        while !job.is_finished() {
            let envelope = self.comm.recv()?;
            let source = envelope.source;
            match envelope.tag {
                Tag::Result => {
                    let task = take_task(&mut in_flight, source)?;
                    if self.collect(task, &envelope.payload, job, report)? == JobState::Finished {
                        break;
                    }
                }
                Tag::Poll => trace!(worker = source, "worker polled"),
                other => return Err(unexpected(source, other)),
            }
            in_flight[source] = self.answer(source, job, report)?;
        }

        let mut outstanding = in_flight.iter().filter(|t| t.is_some()).count();
        debug!(outstanding, "job finished, draining workers");
        while outstanding > 0 {
            let envelope = self.comm.recv()?;
            match envelope.tag {
                Tag::Result => {
                    let task = take_task(&mut in_flight, envelope.source)?;
                    outstanding -= 1;
                    self.collect(task, &envelope.payload, job, report)?;
                }
                Tag::Poll => {}
                other => return Err(unexpected(envelope.source, other)),
            }
        }
        Ok(())
    }

    /// Sends `worker` its next task, or `WaitFor` if the job has none ready.
    /// Returns the task now held by the worker.
    fn answer<J: Job>(
        &self,
        worker: usize,
        job: &mut J,
        report: &mut CoordinatorReport,
    ) -> Result<Option<J::Task>> {
        match job.next_task()? {
            Some(task) => {
                let path = self.staging.write_task(&task)?;
                self.comm
                    .send(worker, Tag::NextTask, &path.to_string_lossy())?;
                report.dispatched += 1;
                trace!(worker, task = %path.display(), "task sent");
                Ok(Some(task))
            }
            None => {
                self.comm.send(worker, Tag::WaitFor, "")?;
                report.waits += 1;
                Ok(None)
            }
        }
    }

    /// Hands a result to the job. An unreadable result file reports its
    /// task as lost instead.
    fn collect<J: Job>(
        &self,
        task: J::Task,
        path: &str,
        job: &mut J,
        report: &mut CoordinatorReport,
    ) -> Result<JobState> {
        match self.staging.read(path) {
            Ok(result) => {
                self.staging.remove(path)?;
                report.results += 1;
                job.submit_result(result)
            }
            Err(e) => {
                warn!(error = %e, result = path, "unreadable result, task lost");
                if let Err(cleanup) = self.staging.remove(path) {
                    debug!(error = %cleanup, result = path, "nothing to clean up");
                }
                report.lost += 1;
                job.task_lost(task, &e)
            }
        }
    }

    fn release_workers(&self) -> Result<()> {
        let mut first_failure = None;
        for worker in 1..self.comm.size() {
            if let Err(e) = self.comm.send(worker, Tag::ExitDone, "") {
                warn!(worker, error = %e, "failed to send EXITDONE");
                first_failure.get_or_insert(e);
            }
        }
        first_failure.map_or(Ok(()), Err)
    }
}

fn take_task<T>(in_flight: &mut [Option<T>], source: usize) -> Result<T> {
    in_flight
        .get_mut(source)
        .and_then(Option::take)
        .ok_or_else(|| {
            GeneticError::Protocol(format!(
                "Worker {} sent a result without holding a task",
                source
            ))
        })
}

fn unexpected(source: usize, tag: Tag) -> GeneticError {
    GeneticError::Protocol(format!(
        "Coordinator received unexpected {} from worker {}",
        tag, source
    ))
}
