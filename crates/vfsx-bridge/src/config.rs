// config.rs — Bridge configuration.
//
// Read from a TOML file (conventionally /etc/vfsx/bridge.toml). Every key is
// optional; a missing file section falls back to the protocol defaults.
//
//   socket_path = "/tmp/vfsx-socket"
//   io_timeout_ms = 30000      # 0 disables the timeout
//   message_log = "/var/log/vfsx/messages.jsonl"

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::protocol::DEFAULT_SOCKET_PATH;
use crate::transport::UnixConnector;

/// Configuration for one bridge instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Rendezvous path of the decision service.
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// Read/write timeout on the service socket, in milliseconds. 0 = wait forever.
    #[serde(default = "default_io_timeout_ms")]
    pub io_timeout_ms: u64,

    /// Optional JSONL file that records every wire message and its decision.
    #[serde(default)]
    pub message_log: Option<PathBuf>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            io_timeout_ms: default_io_timeout_ms(),
            message_log: None,
        }
    }
}

// Serde default functions
fn default_socket_path() -> PathBuf {
    PathBuf::from(DEFAULT_SOCKET_PATH)
}

fn default_io_timeout_ms() -> u64 {
    30_000
}

impl BridgeConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self, BridgeError> {
        let content = std::fs::read_to_string(path).map_err(|e| BridgeError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| BridgeError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Load config if the file exists, otherwise use defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, BridgeError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Defaults, pointed at a different rendezvous path.
    pub fn for_socket(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            ..Self::default()
        }
    }

    pub fn io_timeout(&self) -> Option<Duration> {
        match self.io_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// The connector this config describes.
    pub fn connector(&self) -> UnixConnector {
        UnixConnector::new(&self.socket_path).with_io_timeout(self.io_timeout())
    }
}
