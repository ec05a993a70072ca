//! Peer identity and reply delivery.
//!
//! Every accepted connection becomes a [`Peer`]: a process-unique id, the
//! remote address, and the sending side of a bounded reply queue. A
//! dedicated writer task owns the socket's write half and drains that queue
//! in order.
//!
//! The connection reserves a [`ReplySlot`] before it submits a command, so
//! the serializer always has room for the reply and never waits on a
//! client's socket. A client that stops reading fills its own queue and
//! then stalls only its own read loop.

use crate::protocol::RespValue;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Replies that may wait for one connection's writer.
pub const REPLY_QUEUE_DEPTH: usize = 32;

/// Room for exactly one reply on a peer's queue.
pub type ReplySlot = mpsc::OwnedPermit<RespValue>;

static NEXT_PEER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one connection for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(u64);

impl PeerId {
    /// Allocates the next unused id.
    pub fn next() -> Self {
        PeerId(NEXT_PEER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}

/// Handle to a connected client.
#[derive(Debug, Clone)]
pub struct Peer {
    id: PeerId,
    addr: SocketAddr,
    outbound: mpsc::Sender<RespValue>,
}

impl Peer {
    /// Creates a peer and the receiving end of its reply queue.
    pub fn new(id: PeerId, addr: SocketAddr) -> (Self, mpsc::Receiver<RespValue>) {
        let (outbound, rx) = mpsc::channel(REPLY_QUEUE_DEPTH);
        (Self { id, addr, outbound }, rx)
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Waits for room on the reply queue.
    ///
    /// Returns `None` once the writer has gone away.
    pub async fn reserve(&self) -> Option<ReplySlot> {
        self.outbound.clone().reserve_owned().await.ok()
    }
}

/// Spawns the writer task for a peer's outbound queue.
///
/// The task ends once every [`Peer`] clone is dropped and the queue is
/// empty, or on the first write error. The write half is shut down on exit.
pub fn spawn_writer<W>(
    writer: W,
    outbound: mpsc::Receiver<RespValue>,
    id: PeerId,
) -> JoinHandle<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = write_loop(writer, outbound, id).await {
            match e.kind() {
                std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::ConnectionReset => {
                    debug!(peer = %id, "Client went away before reading its replies")
                }
                _ => warn!(peer = %id, error = %e, "Failed to write reply"),
            }
        }
    })
}

async fn write_loop<W>(
    writer: W,
    mut outbound: mpsc::Receiver<RespValue>,
    id: PeerId,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut stream = BufWriter::new(writer);
    let mut buf = Vec::with_capacity(256);

    while let Some(reply) = outbound.recv().await {
        buf.clear();
        reply.serialize_into(&mut buf);
        stream.write_all(&buf).await?;

        // Batch whatever is already queued into one flush.
        if outbound.is_empty() {
            stream.flush().await?;
        }
        trace!(peer = %id, bytes = buf.len(), "Sent reply");
    }

    stream.flush().await?;
    stream.shutdown().await
}
