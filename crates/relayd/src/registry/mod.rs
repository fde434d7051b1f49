//! Connection registry using the Actor pattern.
//!
//! The registry is the single owner of the set of active sessions. It
//! receives commands via a tokio mpsc channel and answers over oneshot
//! channels, so every add/remove/snapshot is serialized without a lock
//! and no network I/O ever happens inside the actor.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐
//! │ SessionHandler  │────▶│  RegistryActor  │
//! └─────────────────┘     └─────────────────┘
//!         │                       │
//!         │   RegistryCommand     │   Vec<SessionRecord>
//!         │   (mpsc channel)      │   (join order)
//!         ▼                       ▼
//!    Add/Remove/             Snapshot copies are
//!    Snapshot                written to outside
//! ```

use tokio::sync::mpsc;

mod actor;
mod commands;
mod handle;

pub use actor::RegistryActor;
pub use commands::{RegistryCommand, RegistryError, SessionRecord};
pub use handle::RegistryHandle;

/// Command channel buffer size
const COMMAND_BUFFER: usize = 100;

/// Spawn the registry actor and return a handle for interaction.
///
/// The actor runs until every `RegistryHandle` clone has been dropped.
///
/// # Example
///
/// ```no_run
/// use relayd::registry::spawn_registry;
///
/// #[tokio::main]
/// async fn main() {
///     let handle = spawn_registry();
///     assert_eq!(handle.count().await, 0);
/// }
/// ```
pub fn spawn_registry() -> RegistryHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);

    let actor = RegistryActor::new(cmd_rx);
    tokio::spawn(actor.run());

    RegistryHandle::new(cmd_tx)
}
