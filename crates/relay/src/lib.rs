//! Relay Client - terminal chat client library
//!
//! The client runs a single event loop over three sources:
//!
//! 1. **Server frames**: answers the name request, prints everything else
//! 2. **Input lines**: sends each as a `<nickname>: <text>` chat line
//! 3. **Cancellation**: a shared `CancellationToken` for Ctrl-C shutdown

pub mod client;
pub mod error;

pub use client::{ChatClient, ClientConfig, DEFAULT_SERVER_ADDR};
pub use error::{ClientError, Result};
