//! TCP transport for running coordinator and workers as separate processes.
//!
//! The topology is a star: the coordinator binds a [`TcpHub`] and accepts
//! one connection per worker, each worker dials in with
//! [`TcpCommunicator::connect`] and announces its rank. Workers only ever
//! talk to the coordinator.
//!
//! Every control message is one frame:
//!
//! ```text
//! +----------------+-----+---------------------+
//! | length (u32 BE)| tag | payload (UTF-8)     |
//! +----------------+-----+---------------------+
//! ```
//!
//! where `length` covers the tag byte and the payload. A connecting worker
//! first sends its rank as a bare `u32`.
//!
//! Each endpoint owns a small tokio runtime. Reader tasks push incoming
//! frames into an inbox that the blocking [`Communicator`] methods drain, so
//! the endpoints must not be used from inside another tokio runtime.

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::{Builder, Runtime};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::distributed::protocol::{Envelope, Tag, COORDINATOR, MAX_CONTROL_LEN};
use crate::distributed::transport::Communicator;
use crate::error::{GeneticError, Result, ResultExt};

type Inbox = mpsc::UnboundedReceiver<Result<Envelope>>;
type InboxSender = mpsc::UnboundedSender<Result<Envelope>>;

/// The coordinator's listening socket, before the workers are in.
#[derive(Debug)]
pub struct TcpHub {
    runtime: Runtime,
    listener: TcpListener,
}

impl TcpHub {
    /// Binds the coordinator's socket. Port 0 picks a free port, see
    /// [`local_addr`](TcpHub::local_addr).
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        let runtime = endpoint_runtime()?;
        let listener = runtime
            .block_on(TcpListener::bind(addr))
            .context(format!("Failed to bind coordinator socket {}", addr))?;
        Ok(Self { runtime, listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Waits until the `size - 1` workers of a cluster of `size` ranks have
    /// connected and returns the coordinator's endpoint.
    ///
    /// # Errors
    ///
    /// Returns a `GeneticError::Protocol` error if a peer announces a rank
    /// outside `1..size` or one that is already taken.
    pub fn accept(self, size: usize) -> Result<TcpCommunicator> {
        if size == 0 {
            return Err(GeneticError::Configuration(
                "A cluster needs at least one rank".to_string(),
            ));
        }
        let TcpHub { runtime, listener } = self;
        let (inbox_tx, inbox) = mpsc::unbounded_channel();
        let mut writers: Vec<Option<Mutex<OwnedWriteHalf>>> = (0..size).map(|_| None).collect();

        runtime.block_on(async {
            for _ in 1..size {
                let (mut stream, peer) = listener.accept().await?;
                let rank = stream.read_u32().await? as usize;
                if rank == COORDINATOR || rank >= size || writers[rank].is_some() {
                    return Err(GeneticError::Protocol(format!(
                        "Peer {} announced invalid or duplicate rank {}",
                        peer, rank
                    )));
                }
                stream.set_nodelay(true)?;
                let (reader, writer) = stream.into_split();
                tokio::spawn(read_frames(reader, rank, inbox_tx.clone()));
                writers[rank] = Some(Mutex::new(writer));
                debug!(worker = rank, %peer, "worker connected");
            }
            Ok::<(), GeneticError>(())
        })?;

        info!(workers = size - 1, "all workers connected");
        Ok(TcpCommunicator {
            rank: COORDINATOR,
            writers,
            inbox: Mutex::new(inbox),
            runtime,
        })
    }
}

/// One rank of a TCP cluster.
#[derive(Debug)]
pub struct TcpCommunicator {
    rank: usize,
    /// Write halves indexed by peer rank; `None` where there is no link.
    writers: Vec<Option<Mutex<OwnedWriteHalf>>>,
    inbox: Mutex<Inbox>,
    // Declared last so the sockets above close before the runtime shuts down.
    runtime: Runtime,
}

impl TcpCommunicator {
    /// Connects worker `rank` of a cluster of `size` ranks to the
    /// coordinator listening at `addr`.
    ///
    /// # Errors
    ///
    /// Returns a `GeneticError::Configuration` error for the coordinator's
    /// own rank or a rank outside the cluster.
    pub fn connect(addr: SocketAddr, rank: usize, size: usize) -> Result<Self> {
        if rank == COORDINATOR || rank >= size {
            return Err(GeneticError::Configuration(format!(
                "Worker rank {} is not in 1..{}",
                rank, size
            )));
        }
        let announced = u32::try_from(rank).map_err(|_| {
            GeneticError::Configuration(format!("Worker rank {} does not fit the wire", rank))
        })?;
        let runtime = endpoint_runtime()?;
        let (inbox_tx, inbox) = mpsc::unbounded_channel();

        let writer = runtime
            .block_on(async {
                let mut stream = TcpStream::connect(addr).await?;
                stream.set_nodelay(true)?;
                stream.write_u32(announced).await?;
                let (reader, writer) = stream.into_split();
                tokio::spawn(read_frames(reader, COORDINATOR, inbox_tx));
                Ok::<_, std::io::Error>(writer)
            })
            .context(format!("Worker {} failed to reach coordinator {}", rank, addr))?;
        debug!(worker = rank, %addr, "connected to coordinator");

        let mut writers: Vec<Option<Mutex<OwnedWriteHalf>>> = (0..size).map(|_| None).collect();
        writers[COORDINATOR] = Some(Mutex::new(writer));
        Ok(Self {
            rank,
            writers,
            inbox: Mutex::new(inbox),
            runtime,
        })
    }

    fn closed(&self) -> GeneticError {
        GeneticError::Transport(format!("All peers of rank {} have shut down", self.rank))
    }
}

impl Communicator for TcpCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.writers.len()
    }

    fn send(&self, dest: usize, tag: Tag, payload: &str) -> Result<()> {
        let link = self.writers.get(dest).ok_or(GeneticError::OutOfBounds {
            position: dest,
            size: self.writers.len(),
        })?;
        let writer = link.as_ref().ok_or_else(|| {
            GeneticError::Transport(format!("Rank {} has no link to rank {}", self.rank, dest))
        })?;
        let envelope = Envelope::new(self.rank, tag, payload)?;
        self.runtime
            .block_on(async {
                let mut writer = writer.lock().await;
                write_frame(&mut writer, &envelope).await
            })
            .map_err(|e| {
                GeneticError::Transport(format!("Sending {} to rank {} failed: {}", tag, dest, e))
            })
    }

    fn recv(&self) -> Result<Envelope> {
        self.runtime
            .block_on(async { self.inbox.lock().await.recv().await })
            .unwrap_or_else(|| Err(self.closed()))
    }

    fn recv_timeout(&self, timeout: Duration) -> Result<Option<Envelope>> {
        let received = self.runtime.block_on(async {
            tokio::time::timeout(timeout, async { self.inbox.lock().await.recv().await }).await
        });
        match received {
            Err(_elapsed) => Ok(None),
            Ok(Some(envelope)) => envelope.map(Some),
            Ok(None) => Err(self.closed()),
        }
    }
}

fn endpoint_runtime() -> Result<Runtime> {
    Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("genpool-tcp")
        .enable_all()
        .build()
        .context("Failed to start transport runtime")
}

async fn write_frame(writer: &mut OwnedWriteHalf, envelope: &Envelope) -> std::io::Result<()> {
    let body = envelope.payload.as_bytes();
    let mut frame = Vec::with_capacity(5 + body.len());
    frame.extend_from_slice(&((body.len() + 1) as u32).to_be_bytes());
    frame.push(envelope.tag.code());
    frame.extend_from_slice(body);
    writer.write_all(&frame).await?;
    writer.flush().await
}

/// Reads one frame. `Ok(None)` on a clean end of stream.
async fn read_frame(reader: &mut OwnedReadHalf, source: usize) -> Result<Option<Envelope>> {
    let len = match reader.read_u32().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if len == 0 || len > MAX_CONTROL_LEN + 1 {
        return Err(GeneticError::Protocol(format!(
            "Rank {} sent a frame of {} bytes",
            source, len
        )));
    }
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    let payload = body.split_off(1);
    let tag = Tag::from_code(body[0]).ok_or_else(|| {
        GeneticError::Protocol(format!("Rank {} sent unknown tag code {}", source, body[0]))
    })?;
    let payload = String::from_utf8(payload).map_err(|e| {
        GeneticError::Protocol(format!("Rank {} sent a non UTF-8 payload: {}", source, e))
    })?;
    Envelope::new(source, tag, payload).map(Some)
}

/// Forwards every frame from `source` to the inbox until the peer hangs up
/// or sends garbage.
async fn read_frames(mut reader: OwnedReadHalf, source: usize, inbox: InboxSender) {
    loop {
        match read_frame(&mut reader, source).await {
            Ok(Some(envelope)) => {
                if inbox.send(Ok(envelope)).is_err() {
                    break;
                }
            }
            Ok(None) => {
                debug!(peer = source, "connection closed");
                break;
            }
            Err(e) => {
                warn!(peer = source, error = %e, "dropping connection");
                let _ = inbox.send(Err(e));
                break;
            }
        }
    }
}
