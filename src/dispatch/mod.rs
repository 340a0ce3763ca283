//! # Thread Dispatcher
//!
//! Drives the tasks `[offset, offset + iterations)` of one phase through a
//! fixed-size worker pool.
//!
//! Submission is throttled: after every `subs_to_wait` submissions the
//! dispatcher blocks until the most recently submitted unit has finished
//! (not every outstanding unit), which bounds the backlog without forcing a
//! full barrier. At each of these synchronization points it also checks for
//! the stop marker file and for the acceptable fitness, and stops submitting
//! if either trips. After the loop it waits, without a deadline, for every
//! in-flight unit.
//!
//! A unit that returns an error or panics is logged and otherwise ignored.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use std::sync::Arc;
//! use genpool::dispatch::{DispatcherConfig, Task, TaskFactory, ThreadDispatcher};
//! use genpool::error::Result;
//!
//! struct Add(Arc<AtomicU64>, u64);
//!
//! impl Task for Add {
//!     fn id(&self) -> u64 { self.1 }
//!     fn run(self) -> Result<()> {
//!         self.0.fetch_add(self.1, Ordering::SeqCst);
//!         Ok(())
//!     }
//! }
//!
//! struct AddFactory(Arc<AtomicU64>);
//!
//! impl TaskFactory for AddFactory {
//!     type Task = Add;
//!     fn create_task(&self, id: u64) -> Add {
//!         Add(Arc::clone(&self.0), id)
//!     }
//! }
//!
//! let sum = Arc::new(AtomicU64::new(0));
//! let config = DispatcherConfig::builder()
//!     .threads(2)
//!     .offset(10)
//!     .iterations(3)
//!     .stop_marker(None)
//!     .build()
//!     .unwrap();
//! let report = ThreadDispatcher::new(config).run(&AddFactory(sum.clone())).unwrap();
//!
//! assert_eq!(report.submitted, 3);
//! assert_eq!(sum.load(Ordering::SeqCst), 10 + 11 + 12);
//! ```

pub mod init;
pub mod recombine;
pub mod seed;
pub mod task;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Instant;

use rayon::ThreadPoolBuilder;
use tracing::{debug, error, info};

use crate::error::{GeneticError, Result};

pub use init::{InitTask, InitTaskFactory};
pub use recombine::{RecombineTask, RecombineTaskFactory};
pub use seed::{SeedTask, SeedTaskFactory};
pub use task::{Task, TaskEnv, TaskFactory};

/// Default number of submissions between two synchronization points.
pub const DEFAULT_SUBS_TO_WAIT: usize = 1000;
/// Default stop marker, relative to the working directory.
pub const DEFAULT_STOP_MARKER: &str = "STOP";

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    threads: usize,
    offset: u64,
    iterations: usize,
    subs_to_wait: usize,
    stop_marker: Option<PathBuf>,
}

impl DispatcherConfig {
    pub fn builder() -> DispatcherConfigBuilder {
        DispatcherConfigBuilder::default()
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn subs_to_wait(&self) -> usize {
        self.subs_to_wait
    }

    pub fn stop_marker(&self) -> Option<&Path> {
        self.stop_marker.as_deref()
    }
}

/// Builder for `DispatcherConfig`.
#[derive(Debug, Clone, Default)]
pub struct DispatcherConfigBuilder {
    threads: Option<usize>,
    offset: Option<u64>,
    iterations: Option<usize>,
    subs_to_wait: Option<usize>,
    stop_marker: Option<Option<PathBuf>>,
}

impl DispatcherConfigBuilder {
    /// Worker threads. Defaults to the number of logical CPUs.
    pub fn threads(mut self, value: usize) -> Self {
        self.threads = Some(value);
        self
    }

    /// First task id.
    pub fn offset(mut self, value: u64) -> Self {
        self.offset = Some(value);
        self
    }

    /// Number of tasks to run.
    pub fn iterations(mut self, value: usize) -> Self {
        self.iterations = Some(value);
        self
    }

    pub fn subs_to_wait(mut self, value: usize) -> Self {
        self.subs_to_wait = Some(value);
        self
    }

    /// File whose existence stops the phase. `None` disables the check.
    pub fn stop_marker(mut self, path: Option<PathBuf>) -> Self {
        self.stop_marker = Some(path);
        self
    }

    /// # Errors
    ///
    /// Returns a `GeneticError::Configuration` error for zero threads or a
    /// zero `subs_to_wait`.
    pub fn build(self) -> Result<DispatcherConfig> {
        let config = DispatcherConfig {
            threads: self.threads.unwrap_or_else(rayon::current_num_threads),
            offset: self.offset.unwrap_or(0),
            iterations: self.iterations.unwrap_or(0),
            subs_to_wait: self.subs_to_wait.unwrap_or(DEFAULT_SUBS_TO_WAIT),
            stop_marker: self
                .stop_marker
                .unwrap_or_else(|| Some(PathBuf::from(DEFAULT_STOP_MARKER))),
        };
        if config.threads == 0 {
            return Err(GeneticError::Configuration(
                "Dispatcher needs at least one thread".to_string(),
            ));
        }
        if config.subs_to_wait == 0 {
            return Err(GeneticError::Configuration(
                "subs_to_wait must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }
}

/// Why a phase stopped before submitting every task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The stop marker file was found.
    StopMarker(PathBuf),
    /// The pool reached its acceptable fitness.
    AcceptableFitness,
}

/// What a dispatcher run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub first_id: u64,
    pub submitted: usize,
    /// Throttle waits plus the final drain.
    pub sync_points: usize,
    pub stopped: Option<StopReason>,
}

/// Runs the tasks of one phase on a fixed-size worker pool.
#[derive(Debug, Clone)]
pub struct ThreadDispatcher {
    config: DispatcherConfig,
}

impl ThreadDispatcher {
    pub fn new(config: DispatcherConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Submits every task of the phase and waits for all of them.
    ///
    /// # Errors
    ///
    /// Only fails if the worker pool cannot be built; task failures are
    /// logged and swallowed.
    pub fn run<F: TaskFactory>(&self, factory: &F) -> Result<DispatchReport> {
        let config = &self.config;
        let workers = ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .thread_name(|i| format!("genpool-worker-{}", i))
            .build()
            .map_err(|e| {
                GeneticError::Configuration(format!("Failed to build worker pool: {}", e))
            })?;

        let start = Instant::now();
        let mut report = DispatchReport {
            first_id: config.offset,
            submitted: 0,
            sync_points: 0,
            stopped: None,
        };

        workers.in_place_scope_fifo(|scope| {
            let mut since_sync = 0;

            for id in config.offset..config.offset + config.iterations as u64 {
                let task = factory.create_task(id);
                report.submitted += 1;
                since_sync += 1;

                if since_sync < config.subs_to_wait {
                    scope.spawn_fifo(move |_| run_unit(task));
                    continue;
                }

                // Throttle point: wait for this unit before submitting more.
                since_sync = 0;
                let (done_tx, done_rx) = mpsc::sync_channel(1);
                scope.spawn_fifo(move |_| {
                    run_unit(task);
                    let _ = done_tx.send(());
                });
                // run_unit catches panics, so the sender always reports back.
                let _ = done_rx.recv();
                report.sync_points += 1;

                if let Some(reason) = self.stop_requested(factory) {
                    info!(task = id, reason = ?reason, "stopping phase early");
                    report.stopped = Some(reason);
                    break;
                }
            }
        });
        // Leaving the scope waited for every unit.
        report.sync_points += 1;

        debug!(
            first_id = report.first_id,
            submitted = report.submitted,
            sync_points = report.sync_points,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "dispatcher phase finished"
        );
        Ok(report)
    }

    fn stop_requested<F: TaskFactory>(&self, factory: &F) -> Option<StopReason> {
        if let Some(marker) = self.config.stop_marker() {
            if marker.exists() {
                return Some(StopReason::StopMarker(marker.to_path_buf()));
            }
        }
        if factory.acceptable_fitness_reached() {
            return Some(StopReason::AcceptableFitness);
        }
        None
    }
}

fn run_unit<T: Task>(task: T) {
    let id = task.id();
    match panic::catch_unwind(AssertUnwindSafe(|| task.run())) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(task = id, error = %e, "task failed"),
        Err(payload) => error!(task = id, panic = %panic_message(&payload), "task panicked"),
    }
}

fn panic_message(payload: &Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
