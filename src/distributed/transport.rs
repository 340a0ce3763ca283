//! Message transport between coordinator and workers.
//!
//! [`Communicator`] is the only thing the protocol needs from a transport:
//! point-to-point sends of small tagged control messages and a blocking
//! receive from any peer. [`LocalCluster`] implements it over in-memory
//! channels, one endpoint per rank, for running every role inside one
//! process (tests, single-machine runs with worker threads). Separate
//! processes connect through [`tcp`](super::tcp) instead.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use crate::distributed::protocol::{Envelope, Tag};
use crate::error::{GeneticError, Result};

/// Point-to-point messaging between ranked processes.
pub trait Communicator: Send {
    /// Own rank; the coordinator is rank 0.
    fn rank(&self) -> usize;

    /// Number of ranks including the coordinator.
    fn size(&self) -> usize;

    fn send(&self, dest: usize, tag: Tag, payload: &str) -> Result<()>;

    /// Blocks until a message from any peer arrives.
    fn recv(&self) -> Result<Envelope>;

    /// Like [`recv`](Communicator::recv) but gives up after `timeout`.
    fn recv_timeout(&self, timeout: Duration) -> Result<Option<Envelope>>;
}

/// Builds in-memory endpoints.
#[derive(Debug)]
pub struct LocalCluster;

impl LocalCluster {
    /// Returns one connected endpoint per rank, rank 0 first.
    ///
    /// # Errors
    ///
    /// Returns a `GeneticError::Configuration` error if `size` is 0.
    pub fn connect(size: usize) -> Result<Vec<ChannelCommunicator>> {
        if size == 0 {
            return Err(GeneticError::Configuration(
                "A cluster needs at least one rank".to_string(),
            ));
        }
        let (senders, inboxes): (Vec<Sender<Envelope>>, Vec<Receiver<Envelope>>) =
            (0..size).map(|_| mpsc::channel()).unzip();
        Ok(inboxes
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| ChannelCommunicator {
                rank,
                peers: senders.clone(),
                inbox,
            })
            .collect())
    }
}

/// One rank of a [`LocalCluster`].
#[derive(Debug)]
pub struct ChannelCommunicator {
    rank: usize,
    peers: Vec<Sender<Envelope>>,
    inbox: Receiver<Envelope>,
}

impl Communicator for ChannelCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.peers.len()
    }

    fn send(&self, dest: usize, tag: Tag, payload: &str) -> Result<()> {
        let peer = self.peers.get(dest).ok_or(GeneticError::OutOfBounds {
            position: dest,
            size: self.peers.len(),
        })?;
        let envelope = Envelope::new(self.rank, tag, payload)?;
        peer.send(envelope)
            .map_err(|_| GeneticError::Transport(format!("Rank {} has shut down", dest)))
    }

    fn recv(&self) -> Result<Envelope> {
        self.inbox.recv().map_err(|_| {
            GeneticError::Transport(format!("All peers of rank {} have shut down", self.rank))
        })
    }

    fn recv_timeout(&self, timeout: Duration) -> Result<Option<Envelope>> {
        match self.inbox.recv_timeout(timeout) {
            Ok(envelope) => Ok(Some(envelope)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(GeneticError::Transport(format!(
                "All peers of rank {} have shut down",
                self.rank
            ))),
        }
    }
}
