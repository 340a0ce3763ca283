//! # Distributed Coordinator/Worker Protocol
//!
//! The process-level counterpart of [`ThreadDispatcher`](crate::dispatch::ThreadDispatcher):
//! rank 0 runs a [`Coordinator`] over some [`Job`], every other rank runs a
//! [`Worker`]. Control messages are small tagged strings; tasks and results
//! travel as JSON payload files in a shared [`PayloadStaging`] directory and
//! the messages only carry their paths.
//!
//! ```text
//! coordinator                          worker
//!     | ---- GREETING ------------------> |  validated or abort
//!     | ---- NEXTTASK task3.json -------> |  read, execute, write result
//!     | <--- RESULT result1_0.json ------ |
//!     | ---- WAITFOR -------------------> |  sleep
//!     | <--- POLL ----------------------- |
//!     | ---- EXITDONE ------------------> |
//! ```
//!
//! The coordinator has no timeout: a worker that never answers stalls it.
//! Workers enforce their own optional wall-clock budget. Whatever way the
//! coordinator's run ends, every worker is sent `EXITDONE`.
//!
//! Two transports implement [`Communicator`]: [`LocalCluster`] connects
//! ranks inside one process over channels, [`TcpHub`] and
//! [`TcpCommunicator`] connect separate processes over TCP.
//!
//! ## Example
//!
//! ```rust
//! use std::thread;
//!
//! use genpool::distributed::{
//!     Coordinator, Job, JobState, LocalCluster, PayloadStaging, RemoteTask, Worker,
//! };
//! use genpool::{GeneticError, Result};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Square(u64);
//!
//! impl RemoteTask for Square {
//!     type Output = u64;
//!     type Context = ();
//!
//!     fn execute(self, _: &mut (), _rank: usize) -> Result<u64> {
//!         Ok(self.0 * self.0)
//!     }
//! }
//!
//! struct SumOfSquares {
//!     next: u64,
//!     received: u64,
//!     sum: u64,
//! }
//!
//! impl Job for SumOfSquares {
//!     type Task = Square;
//!
//!     fn next_task(&mut self) -> Result<Option<Square>> {
//!         if self.next == 4 {
//!             return Ok(None);
//!         }
//!         self.next += 1;
//!         Ok(Some(Square(self.next)))
//!     }
//!
//!     fn submit_result(&mut self, result: u64) -> Result<JobState> {
//!         self.sum += result;
//!         self.received += 1;
//!         Ok(if self.is_finished() { JobState::Finished } else { JobState::Running })
//!     }
//!
//!     fn task_lost(&mut self, _task: Square, error: &GeneticError) -> Result<JobState> {
//!         Err(GeneticError::Task(format!("a square went missing: {}", error)))
//!     }
//!
//!     fn is_finished(&self) -> bool {
//!         self.received == 4
//!     }
//! }
//!
//! let dir = tempfile::tempdir().unwrap();
//! let staging = PayloadStaging::new(dir.path()).unwrap();
//! let mut ranks = LocalCluster::connect(3).unwrap();
//! let workers: Vec<_> = ranks.split_off(1);
//! let coordinator = ranks.pop().unwrap();
//!
//! let sum = thread::scope(|s| {
//!     for comm in workers {
//!         let staging = &staging;
//!         s.spawn(move || Worker::new(&comm, staging).run::<Square>(&mut ()).unwrap());
//!     }
//!     let mut job = SumOfSquares { next: 0, received: 0, sum: 0 };
//!     Coordinator::new(&coordinator, &staging).run(&mut job).unwrap();
//!     job.sum
//! });
//! assert_eq!(sum, 1 + 4 + 9 + 16);
//! ```

pub mod coordinator;
pub mod globopt_job;
pub mod job;
pub mod protocol;
pub mod staging;
pub mod tcp;
pub mod transport;
pub mod worker;

pub use coordinator::{Coordinator, CoordinatorReport};
pub use globopt_job::{GlobOptJob, GlobOptOperators, GlobOptOutcome, GlobOptTask, OperatorSet};
pub use job::{Job, JobState, RemoteTask};
pub use protocol::{Envelope, Tag, COORDINATOR, GREETING};
pub use staging::PayloadStaging;
pub use tcp::{TcpCommunicator, TcpHub};
pub use transport::{ChannelCommunicator, Communicator, LocalCluster};
pub use worker::{Worker, WorkerExit, WorkerReport, DEFAULT_WAIT_INTERVAL};
