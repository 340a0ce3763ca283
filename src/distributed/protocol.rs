//! Message tags, control envelopes and the startup handshake.

use std::fmt;

use tracing::debug;

use crate::distributed::transport::Communicator;
use crate::error::{GeneticError, Result};

/// Rank of the coordinator.
pub const COORDINATOR: usize = 0;

/// Greeting broadcast by the coordinator at startup.
pub const GREETING: &str = "Hello from genpool coordinator, all is well!";

/// Largest payload a control message may carry, in bytes.
pub const MAX_CONTROL_LEN: usize = 1024;

/// Message tags of the coordinator/worker protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// Coordinator to worker: the payload is the path of a task file.
    NextTask,
    /// Coordinator to worker: shut down.
    ExitDone,
    /// Coordinator to worker: nothing to do yet, sleep and ask again.
    WaitFor,
    /// Worker to coordinator: ready again after a `WaitFor`.
    Poll,
    /// Worker to coordinator: the payload is the path of a result file.
    Result,
    /// Coordinator to worker: the startup handshake.
    Greeting,
}

impl Tag {
    /// Numeric wire code.
    pub fn code(self) -> u8 {
        match self {
            Tag::NextTask => 0,
            Tag::ExitDone => 1,
            Tag::WaitFor => 2,
            Tag::Poll => 3,
            Tag::Result => 4,
            Tag::Greeting => 5,
        }
    }

    pub fn from_code(code: u8) -> Option<Tag> {
        match code {
            0 => Some(Tag::NextTask),
            1 => Some(Tag::ExitDone),
            2 => Some(Tag::WaitFor),
            3 => Some(Tag::Poll),
            4 => Some(Tag::Result),
            5 => Some(Tag::Greeting),
            _ => None,
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tag::NextTask => "NEXTTASK",
            Tag::ExitDone => "EXITDONE",
            Tag::WaitFor => "WAITFOR",
            Tag::Poll => "POLL",
            Tag::Result => "RESULT",
            Tag::Greeting => "GREETING",
        };
        f.write_str(name)
    }
}

/// A small control message. Bulk data travels through payload files; the
/// envelope only carries their path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub source: usize,
    pub tag: Tag,
    pub payload: String,
}

impl Envelope {
    /// # Errors
    ///
    /// Returns a `GeneticError::Protocol` error if `payload` exceeds
    /// [`MAX_CONTROL_LEN`].
    pub fn new(source: usize, tag: Tag, payload: impl Into<String>) -> Result<Self> {
        let payload = payload.into();
        if payload.len() > MAX_CONTROL_LEN {
            return Err(GeneticError::Protocol(format!(
                "{} control message of {} bytes exceeds the {} byte limit",
                tag,
                payload.len(),
                MAX_CONTROL_LEN
            )));
        }
        Ok(Self {
            source,
            tag,
            payload,
        })
    }
}

/// Sends the greeting to every worker.
///
/// # Errors
///
/// Fails with `GeneticError::Protocol` when there is no worker at all.
pub fn announce<C: Communicator>(comm: &C) -> Result<()> {
    if comm.size() <= 1 {
        return Err(GeneticError::Protocol(
            "Coordinator needs at least one worker process".to_string(),
        ));
    }
    for worker in 1..comm.size() {
        comm.send(worker, Tag::Greeting, GREETING)?;
    }
    debug!(workers = comm.size() - 1, "greeting broadcast");
    Ok(())
}

/// Receives and validates the greeting on a worker.
pub fn await_greeting<C: Communicator>(comm: &C) -> Result<()> {
    let envelope = comm.recv()?;
    if envelope.tag != Tag::Greeting || envelope.payload != GREETING {
        return Err(GeneticError::Protocol(format!(
            "Worker {} expected the greeting but got {} '{}'",
            comm.rank(),
            envelope.tag,
            envelope.payload
        )));
    }
    Ok(())
}
