//! Connection handle for individual client connections.
//!
//! An accepted `TcpStream` is split in two:
//! - the framed read half stays with the owning `SessionHandler`
//! - the framed write half sits behind a `ConnectionHandle` that can be
//!   cloned into registry snapshots and written to by any broadcaster
//!
//! Every write is one complete frame bounded by the configured write
//! timeout, so a stalled peer surfaces as `ConnectionError::WriteTimeout`
//! instead of blocking the sender indefinitely.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::debug;

use relay_protocol::{FrameCodec, ProtocolError, MAX_FRAME_LEN};

/// Default write timeout (10 seconds)
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

type FrameReader = FramedRead<OwnedReadHalf, FrameCodec>;
type FrameWriter = FramedWrite<OwnedWriteHalf, FrameCodec>;

/// Identity of one accepted connection.
///
/// Assigned by the acceptor from a monotonic counter; never reused within
/// a server's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Per-connection framing and write limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionLimits {
    /// Maximum payload length in either direction
    pub max_frame_len: usize,

    /// Upper bound for a single frame write (including waiting for the writer)
    pub write_timeout: Duration,
}

impl Default for ConnectionLimits {
    fn default() -> Self {
        Self {
            max_frame_len: MAX_FRAME_LEN,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

/// Cloneable write side of a connection.
///
/// Clones share the same underlying writer; concurrent senders are
/// serialized by the writer mutex so frames never interleave.
#[derive(Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    peer_addr: Option<SocketAddr>,
    writer: Arc<Mutex<FrameWriter>>,
    write_timeout: Duration,
}

impl ConnectionHandle {
    /// Returns the connection identity.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the remote address, if the OS reported one.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Writes one complete frame.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::WriteTimeout` if the frame was not written in time
    /// - `ConnectionError::Io` if the peer is gone or the handle was closed
    /// - `ConnectionError::FrameTooLarge` / `InvalidPayload` if the payload
    ///   cannot be framed
    pub async fn send(&self, payload: Bytes) -> Result<(), ConnectionError> {
        let write = async {
            let mut writer = self.writer.lock().await;
            writer.send(payload).await
        };

        match timeout(self.write_timeout, write).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(ConnectionError::WriteTimeout),
        }
    }

    /// Flushes pending data and shuts down the write side.
    ///
    /// Safe to call more than once; any later `send` fails.
    pub async fn close(&self) {
        let shutdown = async {
            let mut writer = self.writer.lock().await;
            writer.close().await
        };

        match timeout(self.write_timeout, shutdown).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(connection = %self.id, error = %e, "Error while closing connection");
            }
            Err(_) => {
                debug!(connection = %self.id, "Timed out while closing connection");
            }
        }
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("peer_addr", &self.peer_addr)
            .finish_non_exhaustive()
    }
}

/// One accepted connection: the framed reader plus its shared handle.
pub struct Connection {
    reader: FrameReader,
    handle: ConnectionHandle,
    max_frame_len: usize,
}

impl Connection {
    /// Wraps an accepted stream.
    pub fn new(stream: TcpStream, id: ConnectionId, limits: ConnectionLimits) -> Self {
        let peer_addr = stream.peer_addr().ok();
        let (reader, writer) = stream.into_split();

        Self {
            reader: FramedRead::new(reader, FrameCodec::with_max_len(limits.max_frame_len)),
            handle: ConnectionHandle {
                id,
                peer_addr,
                writer: Arc::new(Mutex::new(FramedWrite::new(
                    writer,
                    FrameCodec::with_max_len(limits.max_frame_len),
                ))),
                write_timeout: limits.write_timeout,
            },
            max_frame_len: limits.max_frame_len,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.handle.id
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.handle.peer_addr
    }

    /// Payload limit applied in both directions.
    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }

    /// Returns a shared handle to the write side.
    pub fn handle(&self) -> ConnectionHandle {
        self.handle.clone()
    }

    /// Reads the next frame.
    ///
    /// Returns `ConnectionError::Eof` once the peer has closed the stream.
    pub async fn recv(&mut self) -> Result<Bytes, ConnectionError> {
        match self.reader.next().await {
            Some(Ok(payload)) => Ok(payload),
            Some(Err(e)) => Err(e.into()),
            None => Err(ConnectionError::Eof),
        }
    }

    /// Writes one frame through the shared handle.
    pub async fn send(&self, payload: Bytes) -> Result<(), ConnectionError> {
        self.handle.send(payload).await
    }
}

/// Errors that can occur during connection handling.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Connection closed")]
    Eof,

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Write timeout")]
    WriteTimeout,

    #[error("Handshake timeout")]
    HandshakeTimeout,

    #[error("Display name too long: {len} bytes (max: {max})")]
    NameTooLong { len: usize, max: usize },

    #[error("Registry error: {0}")]
    Registry(String),
}

impl From<ProtocolError> for ConnectionError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Io(e) => Self::Io(e.to_string()),
            ProtocolError::FrameTooLong { actual, limit } => Self::FrameTooLarge {
                size: actual,
                max: limit,
            },
            other @ ProtocolError::EmbeddedDelimiter { .. } => {
                Self::InvalidPayload(other.to_string())
            }
        }
    }
}
