//! Protocol-level errors raised by the frame codec.

use std::io;
use thiserror::Error;

/// Errors that can occur while framing payloads.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Underlying stream failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A frame exceeded the configured payload limit.
    #[error("Frame too long: {actual} bytes (max: {limit})")]
    FrameTooLong { actual: usize, limit: usize },

    /// An outgoing payload contained the frame delimiter.
    #[error("Payload contains a newline at byte {position}")]
    EmbeddedDelimiter { position: usize },
}

/// Result type for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
