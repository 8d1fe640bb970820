//! TOML-based configuration for the controller binary.
//!
//! The file is optional and every field has a default, so a partial file (or
//! none at all) produces a working configuration.  Example:
//!
//! ```toml
//! [connection]
//! url = "ws://192.168.1.20:8080/"
//! connect_timeout_secs = 5
//!
//! [sender]
//! batch_window_ms = 2
//! ```
//!
//! The library types ([`ConnectionConfig`], [`SenderConfig`]) never read
//! files or the environment themselves; `ControllerConfig` converts into them.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::connection_state::ConnectionConfig;
use crate::application::event_sender::{SenderConfig, DEFAULT_BATCH_WINDOW};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level controller configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ControllerConfig {
    #[serde(default)]
    pub connection: ConnectionSection,
    #[serde(default)]
    pub sender: SenderSection,
}

/// Where to connect and how long to wait for the handshake.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionSection {
    /// WebSocket URL of the device side (`ws://` or `wss://`).
    #[serde(default = "default_url")]
    pub url: String,
    /// Handshake timeout in seconds.  `0` waits forever.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

/// Batching behaviour of the event sender.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SenderSection {
    /// Delay before each drain, in milliseconds.
    #[serde(default = "default_batch_window_ms")]
    pub batch_window_ms: u64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_url() -> String {
    "ws://127.0.0.1:8080/".to_string()
}
fn default_connect_timeout_secs() -> u64 {
    10
}
fn default_batch_window_ms() -> u64 {
    DEFAULT_BATCH_WINDOW.as_millis() as u64
}

impl Default for ConnectionSection {
    fn default() -> Self {
        Self {
            url: default_url(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl Default for SenderSection {
    fn default() -> Self {
        Self {
            batch_window_ms: default_batch_window_ms(),
        }
    }
}

// ── Loading, saving and conversion ────────────────────────────────────────────

impl ControllerConfig {
    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the TOML is malformed or a field has
    /// the wrong type.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Loads a configuration file.  Unlike a missing optional file, a path
    /// given explicitly must exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read and
    /// [`ConfigError::Parse`] if its content is not valid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Renders the configuration as pretty TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Serialize`] if serialization fails.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Writes the configuration to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] for file-system failures or
    /// [`ConfigError::Serialize`] if serialization fails.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let content = self.to_toml_string()?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Settings for `ConnectionState`.  A timeout of `0` means no bound.
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            connect_timeout: match self.connection.connect_timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }

    /// Settings for `EventSender`.
    pub fn sender_config(&self) -> SenderConfig {
        SenderConfig {
            batch_window: Duration::from_millis(self.sender.batch_window_ms),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
