//! Connection Handler
//!
//! Reads one client's request stream, decodes it into commands and hands
//! each command to the serializer.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects, acceptor spawns handle_connection()
//!        │
//!        ▼
//! 2. Register with the serializer, wait for the ack
//!        │
//!        ▼
//! 3. ┌──────────────────────────────┐
//!    │  Read bytes into buffer      │
//!    │  Parse one RESP frame        │
//!    │  Frame -> Command            │
//!    │  Reserve reply slot (may     │
//!    │  block on a slow reader)     │
//!    │  Send Envelope (may block)   │
//!    │  [Loop back]                 │
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 4. End of stream / decode error / 64 KiB of undecoded input
//!        │
//!        ▼
//! 5. Deregister, stop reading; the writer task flushes pending
//!    replies and closes the socket
//! ```
//!
//! Replies never pass through this handler. The serializer queues them on
//! the peer's outbound queue (see [`crate::connection::peer`]).
//!
//! Every frame ends in CRLF, so after an incomplete parse the buffer is
//! only decoded again once a new CRLF has arrived. A long partial line is
//! scanned once, not on every read.

use crate::commands::Command;
use crate::connection::peer::{spawn_writer, Peer, PeerId};
use crate::protocol::parser::{blank_lines, find_crlf};
use crate::protocol::{ParseError, RespParser, RespValue};
use crate::server::{Envelope, SerializerGone, SerializerHandle};
use bytes::BytesMut;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::TcpStream;
use tracing::{debug, error, trace, warn};

/// Upper bound for buffered, not yet decoded request bytes.
const MAX_BUFFER_SIZE: usize = 64 * 1024;

const INITIAL_BUFFER_SIZE: usize = 4096;

/// Decodes requests from one connection's read half.
pub struct ConnectionHandler<R> {
    reader: R,

    peer: Peer,

    /// Bytes read but not yet decoded
    buffer: BytesMut,

    /// Length of `buffer` at the last incomplete parse, 0 after a frame
    scanned: usize,

    parser: RespParser,

    serializer: SerializerHandle,
}

impl<R> ConnectionHandler<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(reader: R, peer: Peer, serializer: SerializerHandle) -> Self {
        Self {
            reader,
            peer,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            scanned: 0,
            parser: RespParser::new(),
            serializer,
        }
    }

    /// Registers the peer, runs the read loop until the stream ends or
    /// fails, then deregisters.
    ///
    /// A clean end of stream is reported as
    /// [`ConnectionError::ClientDisconnected`].
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        let id = self.peer.id();
        let addr = self.peer.addr();

        self.serializer.register(self.peer.clone()).await?;
        debug!(peer = %id, client = %addr, "Read loop started");

        let result = self.main_loop().await;

        match &result {
            Ok(()) | Err(ConnectionError::ClientDisconnected) => {
                debug!(peer = %id, "Read loop finished")
            }
            Err(ConnectionError::Io(io_err))
                if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
            {
                debug!(peer = %id, "Connection reset by client")
            }
            Err(e) => warn!(peer = %id, error = %e, "Connection error"),
        }

        self.serializer.deregister(id);
        result
    }

    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            while let Some(frame) = self.try_parse_frame()? {
                self.dispatch(frame).await?;
            }

            self.read_more_data().await?;
        }
    }

    /// Turns a frame into an envelope for the serializer, or drops it.
    async fn dispatch(&mut self, frame: RespValue) -> Result<(), ConnectionError> {
        match Command::from_frame(frame) {
            Ok(Some(command)) => {
                trace!(peer = %self.peer.id(), verb = command.verb(), "Forwarding command");
                let reply = self
                    .peer
                    .reserve()
                    .await
                    .ok_or(ConnectionError::WriterClosed)?;
                let envelope = Envelope {
                    command,
                    peer: self.peer.id(),
                    reply,
                };
                self.serializer.submit(envelope).await?;
            }
            Ok(None) => {
                trace!(peer = %self.peer.id(), "Ignoring non-array frame");
            }
            Err(e) => {
                warn!(peer = %self.peer.id(), error = %e, "Unhandled command received");
            }
        }
        Ok(())
    }

    fn try_parse_frame(&mut self) -> Result<Option<RespValue>, ConnectionError> {
        if self.scanned > 0 && find_crlf(&self.buffer[self.scanned - 1..]).is_none() {
            self.scanned = self.buffer.len();
            return Ok(None);
        }

        let blank = blank_lines(&self.buffer);
        if blank > 0 {
            let _ = self.buffer.split_to(blank);
            self.scanned = 0;
        }

        if self.buffer.is_empty() {
            return Ok(None);
        }

        match self.parser.parse(&self.buffer)? {
            Some((value, consumed)) => {
                let _ = self.buffer.split_to(consumed);
                self.scanned = 0;
                trace!(
                    peer = %self.peer.id(),
                    consumed = consumed,
                    remaining = self.buffer.len(),
                    "Parsed frame"
                );
                Ok(Some(value))
            }
            None => {
                self.scanned = self.buffer.len();
                Ok(None)
            }
        }
    }

    async fn read_more_data(&mut self) -> Result<(), ConnectionError> {
        if self.buffer.len() >= MAX_BUFFER_SIZE {
            error!(
                peer = %self.peer.id(),
                size = self.buffer.len(),
                "Buffer size limit exceeded"
            );
            return Err(ConnectionError::BufferFull);
        }

        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(INITIAL_BUFFER_SIZE);
        }

        let n = self.reader.read_buf(&mut self.buffer).await?;

        if n == 0 {
            return if self.buffer.is_empty() {
                Err(ConnectionError::ClientDisconnected)
            } else {
                Err(ConnectionError::UnexpectedEof)
            };
        }

        trace!(peer = %self.peer.id(), bytes = n, "Read data");
        Ok(())
    }
}

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Client closed the stream between frames
    #[error("Client disconnected")]
    ClientDisconnected,

    /// Client closed the stream in the middle of a frame
    #[error("Unexpected end of stream")]
    UnexpectedEof,

    #[error("Buffer size limit exceeded")]
    BufferFull,

    /// The peer's writer task stopped, so no reply can be delivered
    #[error("Reply writer closed")]
    WriterClosed,

    #[error("{0}")]
    SerializerGone(#[from] SerializerGone),
}

/// Serves one accepted TCP connection to completion.
///
/// Splits the stream, starts the peer's writer task and runs a
/// [`ConnectionHandler`] on the read half. Returns once the handler has
/// stopped and the writer has flushed every reply it was given.
pub async fn handle_connection(stream: TcpStream, addr: SocketAddr, serializer: SerializerHandle) {
    let (reader, writer) = stream.into_split();
    let (peer, outbound) = Peer::new(PeerId::next(), addr);
    let id = peer.id();
    let writer_task = spawn_writer(writer, outbound, id);

    let handler = ConnectionHandler::new(reader, peer, serializer);
    if let Err(e) = handler.run().await {
        match e {
            ConnectionError::ClientDisconnected => {}
            _ => debug!(peer = %id, error = %e, "Connection ended with error"),
        }
    }

    let _ = writer_task.await;
}
