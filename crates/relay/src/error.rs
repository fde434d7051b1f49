//! Error types for the relay chat client.
//!
//! **Panic-Free Policy:** This module follows the project's panic-free guidelines.
//! No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, or `todo!()`.

use std::io;
use std::net::SocketAddr;

use relay_protocol::ProtocolError;
use thiserror::Error;

// ============================================================================
// Client Error Type
// ============================================================================

/// Chat client errors.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Failed to reach the relay server.
    ///
    /// Usually means nothing is listening at the address; check that
    /// `relayd` is running and the `--server` flag matches its listen
    /// address.
    #[error("Failed to connect to relay server at {addr}: {error}")]
    Connect {
        /// Address the client dialed.
        addr: SocketAddr,
        /// Underlying error message.
        error: String,
    },

    /// The nickname cannot be sent or announced.
    ///
    /// Nicknames must fit in one frame together with the server's join
    /// notice and must not contain line breaks.
    #[error("Invalid nickname: {0}")]
    InvalidNickname(String),

    /// Framing error on the server connection.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Local input or output failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

// ============================================================================
// Tests
// ============================================================================
