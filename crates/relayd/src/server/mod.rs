//! TCP server for the relay daemon.
//!
//! The server:
//! - Binds a TCP listener on the configured address
//! - Assigns each accepted connection a `ConnectionId`
//! - Spawns a `SessionHandler` per connection and immediately loops back
//!   to `accept()`, so a slow handshake never stalls admission
//! - Stops accepting when the cancellation token fires
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   RelayServer   │
//! │                 │
//! │   TcpListener   │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │ SessionHandler  │────▶│  RegistryHandle │
//! │   (per client)  │     │                 │
//! └─────────────────┘     └─────────────────┘
//!         │
//!         │ broadcast
//!         ▼
//! ┌─────────────────┐
//! │  every session  │
//! │  (incl. sender) │
//! └─────────────────┘
//! ```

mod connection;
mod session;

pub use connection::{
    Connection, ConnectionError, ConnectionHandle, ConnectionId, ConnectionLimits,
    DEFAULT_WRITE_TIMEOUT,
};
pub use session::{SessionHandler, SessionState, DEFAULT_HANDSHAKE_TIMEOUT};

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::ServerConfig;
use crate::registry::RegistryHandle;

/// Pause after a failed accept (e.g. file descriptor exhaustion)
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// TCP server for the relay daemon.
pub struct RelayServer {
    /// Bound listener
    listener: TcpListener,

    /// Address the listener actually bound (resolves port 0)
    local_addr: SocketAddr,

    /// Limits and timeouts applied to every session
    config: ServerConfig,

    /// Handle to the connection registry
    registry: RegistryHandle,

    /// Cancellation token to stop accepting
    cancel_token: CancellationToken,

    /// Connection counter for generating connection IDs
    connection_counter: AtomicU64,
}

impl RelayServer {
    /// Binds the listener described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Bind` if the address cannot be bound.
    pub async fn bind(
        config: ServerConfig,
        registry: RegistryHandle,
        cancel_token: CancellationToken,
    ) -> Result<Self, ServerError> {
        let bind_error = |e: std::io::Error| ServerError::Bind {
            addr: config.listen_addr,
            error: e.to_string(),
        };

        let listener = TcpListener::bind(config.listen_addr)
            .await
            .map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        info!(addr = %local_addr, "Relay server listening");

        Ok(Self {
            listener,
            local_addr,
            config,
            registry,
            cancel_token,
            connection_counter: AtomicU64::new(0),
        })
    }

    /// Returns the bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Runs the acceptor loop until the cancellation token is triggered
    /// or the registry actor has stopped.
    ///
    /// Sessions already running are not drained; they end on their own
    /// connection failures.
    pub async fn run(&self) {
        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            // Registry actor gone: sessions can no longer register
                            if !self.registry.is_connected() {
                                error!(
                                    peer = %peer,
                                    "Connection registry stopped, refusing connections"
                                );
                                break;
                            }
                            self.handle_connection(stream, peer);
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                            sleep(ACCEPT_ERROR_BACKOFF).await;
                        }
                    }
                }
            }
        }

        info!(addr = %self.local_addr, "Server stopped accepting connections");
    }

    /// Spawns a session handler for a freshly accepted connection.
    fn handle_connection(&self, stream: TcpStream, peer: SocketAddr) {
        let id = ConnectionId::new(self.connection_counter.fetch_add(1, Ordering::Relaxed));

        if let Err(e) = stream.set_nodelay(true) {
            debug!(connection = %id, error = %e, "Failed to set TCP_NODELAY");
        }

        info!(connection = %id, peer = %peer, "Accepted connection");

        let connection = Connection::new(stream, id, self.config.connection_limits());
        let handler = SessionHandler::new(
            connection,
            self.registry.clone(),
            self.config.handshake_timeout(),
        );

        tokio::spawn(async move {
            handler.run().await;
        });
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {error}")]
    Bind { addr: SocketAddr, error: String },
}
