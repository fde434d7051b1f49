//! Broadcast engine.
//!
//! A broadcast takes a registry snapshot and writes the payload to every
//! handle in it, outside the registry actor. A failed or timed-out write
//! is logged and skipped: it neither aborts delivery to the remaining
//! recipients nor removes the failing recipient. Removal is left to that
//! recipient's own session handler, which notices on its next read.

use bytes::Bytes;
use tracing::debug;

use crate::registry::{RegistryHandle, SessionRecord};

/// Outcome of one broadcast call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Records in the snapshot
    pub recipients: usize,

    /// Writes that completed
    pub delivered: usize,

    /// Writes that failed or timed out
    pub failed: usize,
}

/// Delivers payloads to every registered session.
#[derive(Clone)]
pub struct Broadcaster {
    registry: RegistryHandle,
}

impl Broadcaster {
    pub fn new(registry: RegistryHandle) -> Self {
        Self { registry }
    }

    /// Sends `payload` to every session currently registered.
    pub async fn broadcast(&self, payload: &Bytes) -> BroadcastReport {
        let recipients = self.registry.snapshot().await;
        deliver(&recipients, payload).await
    }
}

/// Writes `payload` to each recipient in order, isolating failures.
pub async fn deliver(recipients: &[SessionRecord], payload: &Bytes) -> BroadcastReport {
    let mut report = BroadcastReport {
        recipients: recipients.len(),
        ..BroadcastReport::default()
    };

    for record in recipients {
        match record.handle.send(payload.clone()).await {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                debug!(
                    connection = %record.id(),
                    name = %record.name,
                    error = %e,
                    "Failed to deliver broadcast"
                );
                report.failed += 1;
            }
        }
    }

    report
}
