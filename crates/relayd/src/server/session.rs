//! Session handler - the per-connection control loop.
//!
//! ```text
//! HANDSHAKING ──name received──▶ ACTIVE ──read failure / EOF──▶ CLOSED
//!      │                                                          ▲
//!      └──────────── handshake failure (never registered) ────────┘
//! ```
//!
//! A session ends only through an I/O, protocol or timeout failure on its
//! own connection. There is no retry, and a clean disconnect is handled
//! exactly like a network error.

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use relay_protocol::{join_notice, leave_notice, max_name_len, CONNECTED, NICK_REQUEST};

use crate::broadcast::Broadcaster;
use crate::registry::RegistryHandle;

use super::connection::{Connection, ConnectionError};

/// Default time allowed for a client to answer the name request
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Handshaking,
    Active,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handshaking => write!(f, "handshaking"),
            Self::Active => write!(f, "active"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Drives one connection from handshake to termination.
pub struct SessionHandler {
    connection: Connection,
    registry: RegistryHandle,
    broadcaster: Broadcaster,
    handshake_timeout: Duration,
    state: SessionState,
}

impl SessionHandler {
    /// Creates a handler in the `Handshaking` state.
    pub fn new(connection: Connection, registry: RegistryHandle, handshake_timeout: Duration) -> Self {
        Self {
            connection,
            broadcaster: Broadcaster::new(registry.clone()),
            registry,
            handshake_timeout,
            state: SessionState::Handshaking,
        }
    }

    /// Runs the session to completion.
    ///
    /// Returns the display name if the session was registered, `None` if
    /// the handshake never completed.
    pub async fn run(mut self) -> Option<String> {
        let id = self.connection.id();
        debug!(connection = %id, peer = ?self.connection.peer_addr(), "Session started");

        let name = match self.handshake().await {
            Ok(name) => name,
            Err(e) => {
                warn!(connection = %id, error = %e, "Handshake failed");
                self.close().await;
                return None;
            }
        };

        let result = match self.join(&name).await {
            Ok(()) => {
                self.transition(SessionState::Active);
                self.relay_messages().await
            }
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            debug!(connection = %id, name = %name, error = %e, "Session ending");
        }

        self.close().await
    }

    /// Requests the peer's display name and waits for it.
    async fn handshake(&mut self) -> Result<String, ConnectionError> {
        self.connection.send(Bytes::from_static(NICK_REQUEST)).await?;

        let payload = match timeout(self.handshake_timeout, self.connection.recv()).await {
            Ok(result) => result?,
            Err(_) => return Err(ConnectionError::HandshakeTimeout),
        };

        // Names are taken verbatim; empty and duplicate names are accepted
        let name = String::from_utf8_lossy(&payload).into_owned();

        // Measured after lossy decoding, which can grow invalid input
        let max = max_name_len(self.connection.max_frame_len());
        if name.len() > max {
            return Err(ConnectionError::NameTooLong {
                len: name.len(),
                max,
            });
        }

        Ok(name)
    }

    /// Registers the session, announces it, and confirms to the peer.
    async fn join(&mut self, name: &str) -> Result<(), ConnectionError> {
        self.registry
            .add(self.connection.handle(), name)
            .await
            .map_err(|e| ConnectionError::Registry(e.to_string()))?;

        info!(connection = %self.connection.id(), name = %name, "Client joined");

        self.broadcaster.broadcast(&join_notice(name)).await;
        self.connection.send(Bytes::from_static(CONNECTED)).await
    }

    /// Relays every received payload verbatim until the connection fails.
    async fn relay_messages(&mut self) -> Result<(), ConnectionError> {
        loop {
            let payload = self.connection.recv().await?;
            let report = self.broadcaster.broadcast(&payload).await;

            trace!(
                connection = %self.connection.id(),
                bytes = payload.len(),
                delivered = report.delivered,
                failed = report.failed,
                "Relayed message"
            );
        }
    }

    /// Terminal transition: deregister, announce departure, close.
    ///
    /// Consumes the handler, so it runs exactly once.
    async fn close(mut self) -> Option<String> {
        self.transition(SessionState::Closed);

        let handle = self.connection.handle();
        let name = self.registry.remove(handle.id()).await;

        if let Some(name) = &name {
            info!(connection = %handle.id(), name = %name, "Client left");
            self.broadcaster.broadcast(&leave_notice(name)).await;
        }

        handle.close().await;
        name
    }

    fn transition(&mut self, next: SessionState) {
        debug!(
            connection = %self.connection.id(),
            from = %self.state,
            to = %next,
            "Session state change"
        );
        self.state = next;
    }
}
