//! Registry actor commands, errors, and records.
//!
//! This module defines the message types for communicating with the `RegistryActor`:
//! - `RegistryCommand`: Commands sent to the actor
//! - `RegistryError`: Errors that can occur during registry operations
//! - `SessionRecord`: One registered (connection, display name) pair

use thiserror::Error;
use tokio::sync::oneshot;

use crate::server::{ConnectionHandle, ConnectionId};

// ============================================================================
// Session Records
// ============================================================================

/// A registered session: the connection's write handle and its display name.
///
/// Names are taken verbatim from the handshake and are not unique.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    /// Shared write side of the connection
    pub handle: ConnectionHandle,

    /// Display name announced at join
    pub name: String,
}

impl SessionRecord {
    pub fn new(handle: ConnectionHandle, name: impl Into<String>) -> Self {
        Self {
            handle,
            name: name.into(),
        }
    }

    /// Returns the identity of the underlying connection.
    pub fn id(&self) -> ConnectionId {
        self.handle.id()
    }
}

// ============================================================================
// Registry Commands
// ============================================================================

/// Commands sent to the registry actor.
///
/// Each command carries a oneshot channel for the response.
#[derive(Debug)]
pub enum RegistryCommand {
    /// Append a record at the end of the join order.
    ///
    /// # Errors
    /// - `RegistryError::AlreadyRegistered` if the connection is present
    Add {
        record: SessionRecord,
        respond_to: oneshot::Sender<Result<(), RegistryError>>,
    },

    /// Remove the record for a connection, answering with its display name.
    ///
    /// Answers `None` if the connection was not registered.
    Remove {
        id: ConnectionId,
        respond_to: oneshot::Sender<Option<String>>,
    },

    /// Copy of all records in join order.
    Snapshot {
        respond_to: oneshot::Sender<Vec<SessionRecord>>,
    },

    /// Number of registered records.
    Count { respond_to: oneshot::Sender<usize> },
}

// ============================================================================
// Registry Errors
// ============================================================================

/// Errors that can occur during registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The connection already has a record.
    #[error("connection already registered: {0}")]
    AlreadyRegistered(ConnectionId),

    /// The response channel was closed before receiving a response.
    ///
    /// This typically indicates the actor was shut down.
    #[error("response channel closed")]
    ChannelClosed,
}
