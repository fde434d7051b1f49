//! relay daemon - connection registry and broadcast server
//!
//! This crate provides the core infrastructure for the chat relay:
//! - `registry` - Connection registry actor tracking active sessions
//! - `broadcast` - Fan-out of one payload to every registered session
//! - `server` - TCP acceptor loop and per-connection session handlers
//! - `config` - Server configuration (defaults, TOML file, overrides)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        relayd                               │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │   RelayServer   │     │       RegistryActor         │   │
//! │  │  (TcpListener)  │     │ (Vec<SessionRecord> owner)  │   │
//! │  └────────┬────────┘     └──────────────▲──────────────┘   │
//! │           │ spawn per connection        │ add/remove/       │
//! │           ▼                             │ snapshot          │
//! │  ┌─────────────────┐     ┌──────────────┴──────────────┐   │
//! │  │ SessionHandler  │────▶│        Broadcaster          │   │
//! │  │  (per client)   │     │ (writes outside the actor)  │   │
//! │  └─────────────────┘     └─────────────────────────────┘   │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! Production code in this crate does not use `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()` or `todo!()`. Network failures are
//! handled inside the session that observed them and never reach the
//! acceptor loop.

pub mod broadcast;
pub mod config;
pub mod registry;
pub mod server;

#[cfg(test)]
pub(crate) mod test_support;
