//! Registry actor - owns all session records and processes commands.
//!
//! Records are kept in join order. A side index of connection ids keeps
//! the duplicate check on `Add` constant time.

use std::collections::HashSet;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::server::ConnectionId;

use super::commands::{RegistryCommand, RegistryError, SessionRecord};

/// The registry actor - owns all session state.
///
/// Runs in a single task and processes commands sequentially, so no
/// command ever observes a half-applied mutation.
pub struct RegistryActor {
    /// Command receiver
    receiver: mpsc::Receiver<RegistryCommand>,

    /// Registered sessions, insertion order = join order
    sessions: Vec<SessionRecord>,

    /// Index of registered connection ids
    registered: HashSet<ConnectionId>,
}

impl RegistryActor {
    /// Creates a new registry actor.
    pub fn new(receiver: mpsc::Receiver<RegistryCommand>) -> Self {
        Self {
            receiver,
            sessions: Vec::new(),
            registered: HashSet::new(),
        }
    }

    /// Runs the actor event loop.
    ///
    /// Processes commands until the channel closes (all senders dropped).
    pub async fn run(mut self) {
        info!("Registry actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!(sessions = self.sessions.len(), "Registry actor stopped");
    }

    /// Dispatches a command to the appropriate handler.
    fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Add { record, respond_to } => {
                let result = self.handle_add(record);
                // Ignore send error - caller may have dropped the receiver
                let _ = respond_to.send(result);
            }
            RegistryCommand::Remove { id, respond_to } => {
                let result = self.handle_remove(id);
                let _ = respond_to.send(result);
            }
            RegistryCommand::Snapshot { respond_to } => {
                let _ = respond_to.send(self.sessions.clone());
            }
            RegistryCommand::Count { respond_to } => {
                let _ = respond_to.send(self.sessions.len());
            }
        }
    }

    fn handle_add(&mut self, record: SessionRecord) -> Result<(), RegistryError> {
        let id = record.id();

        if !self.registered.insert(id) {
            debug!(connection = %id, "Connection already registered, rejecting");
            return Err(RegistryError::AlreadyRegistered(id));
        }

        info!(
            connection = %id,
            name = %record.name,
            total_sessions = self.sessions.len() + 1,
            "Session registered"
        );
        self.sessions.push(record);

        Ok(())
    }

    fn handle_remove(&mut self, id: ConnectionId) -> Option<String> {
        if !self.registered.remove(&id) {
            debug!(connection = %id, "Remove for unknown connection ignored");
            return None;
        }

        let index = self.sessions.iter().position(|r| r.id() == id)?;
        let record = self.sessions.remove(index);

        info!(
            connection = %id,
            name = %record.name,
            total_sessions = self.sessions.len(),
            "Session removed"
        );

        Some(record.name)
    }
}
