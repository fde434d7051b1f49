//! Server configuration.
//!
//! Values resolve in this order, later sources winning:
//! 1. built-in defaults
//! 2. a TOML file (`--config <PATH>`, else `<config_dir>/relay/relayd.toml`
//!    when it exists)
//! 3. the `RELAY_LISTEN` environment variable
//! 4. the `--listen` command line flag
//!
//! The last two are applied by the binary through `with_listen_addr`.
//!
//! ```toml
//! listen_addr = "127.0.0.1:5060"
//! max_frame_len = 1024
//! write_timeout_ms = 10000
//! handshake_timeout_ms = 30000
//! ```

use std::fs;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use relay_protocol::{MAX_FRAME_LEN, NOTICE_OVERHEAD};

use crate::server::{ConnectionLimits, DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_WRITE_TIMEOUT};

/// Default listen address
pub const DEFAULT_LISTEN_ADDR: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 5060));

/// Environment variable overriding the listen address
pub const LISTEN_ENV_VAR: &str = "RELAY_LISTEN";

/// File name looked up under the user's config directory
pub const CONFIG_FILE_NAME: &str = "relayd.toml";

/// Relay server settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Address the acceptor binds
    pub listen_addr: SocketAddr,

    /// Maximum payload size in bytes
    pub max_frame_len: usize,

    /// Per-recipient write timeout in milliseconds
    pub write_timeout_ms: u64,

    /// Time allowed for the name handshake in milliseconds
    pub handshake_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR,
            max_frame_len: MAX_FRAME_LEN,
            write_timeout_ms: DEFAULT_WRITE_TIMEOUT.as_millis() as u64,
            handshake_timeout_ms: DEFAULT_HANDSHAKE_TIMEOUT.as_millis() as u64,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from `path`, or from the default location.
    ///
    /// An explicit path must exist. The default location is optional;
    /// when absent the built-in defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Parses a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Overrides the listen address.
    #[must_use]
    pub fn with_listen_addr(mut self, addr: SocketAddr) -> Self {
        self.listen_addr = addr;
        self
    }

    /// Rejects settings the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_frame_len <= NOTICE_OVERHEAD {
            return Err(ConfigError::Invalid {
                field: "max_frame_len",
                reason: format!("must be greater than {NOTICE_OVERHEAD}"),
            });
        }
        if self.write_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "write_timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.handshake_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "handshake_timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    /// Limits handed to every accepted connection.
    pub fn connection_limits(&self) -> ConnectionLimits {
        ConnectionLimits {
            max_frame_len: self.max_frame_len,
            write_timeout: self.write_timeout(),
        }
    }
}

/// Returns `<config_dir>/relay/relayd.toml`, if a config dir is known.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("relay").join(CONFIG_FILE_NAME))
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {error}")]
    Read { path: PathBuf, error: String },

    #[error("Failed to parse config {path}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
