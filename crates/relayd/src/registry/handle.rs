//! Client interface for interacting with the RegistryActor.
//!
//! The `RegistryHandle` is a cheap-to-clone sender wrapper. Channel errors
//! are mapped to `RegistryError::ChannelClosed` where a caller needs to
//! know, and to an empty/absent answer where it does not.

use tokio::sync::{mpsc, oneshot};

use crate::server::{ConnectionHandle, ConnectionId};

use super::commands::{RegistryCommand, RegistryError, SessionRecord};

/// Handle for interacting with the registry actor.
///
/// # Usage
///
/// ```ignore
/// let registry = spawn_registry();
///
/// registry.add(connection.handle(), "alice").await?;
/// for record in registry.snapshot().await {
///     record.handle.send(payload.clone()).await?;
/// }
/// let name = registry.remove(connection.id()).await;
/// ```
#[derive(Clone)]
pub struct RegistryHandle {
    /// Command sender to the actor
    sender: mpsc::Sender<RegistryCommand>,
}

impl RegistryHandle {
    /// Create a new registry handle.
    pub fn new(sender: mpsc::Sender<RegistryCommand>) -> Self {
        Self { sender }
    }

    /// Register a session at the end of the join order.
    ///
    /// # Errors
    ///
    /// - `RegistryError::AlreadyRegistered` if the connection is present
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn add(
        &self,
        handle: ConnectionHandle,
        name: impl Into<String>,
    ) -> Result<(), RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Add {
                record: SessionRecord::new(handle, name),
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)?
    }

    /// Remove a session, returning its display name.
    ///
    /// Returns `None` if the connection was not registered or if
    /// communication with the actor fails.
    pub async fn remove(&self, id: ConnectionId) -> Option<String> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Remove { id, respond_to: tx })
            .await
            .ok()?;

        rx.await.ok()?
    }

    /// Copy of all registered sessions in join order.
    ///
    /// Returns an empty vector if communication with the actor fails.
    pub async fn snapshot(&self) -> Vec<SessionRecord> {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Snapshot { respond_to: tx })
            .await
            .is_err()
        {
            return Vec::new();
        }

        rx.await.unwrap_or_default()
    }

    /// Number of registered sessions (0 if the actor is gone).
    pub async fn count(&self) -> usize {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Count { respond_to: tx })
            .await
            .is_err()
        {
            return 0;
        }

        rx.await.unwrap_or_default()
    }

    /// Returns false once the actor has stopped.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}
