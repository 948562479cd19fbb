//! Remote connection descriptors.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ScanError;
use crate::protocol::Protocol;

/// One configured remote endpoint.
///
/// `protocol` stays a free string until scan time so that an unknown name
/// fails only the connection that carries it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    pub host: String,

    /// Port; the protocol default when absent.
    #[serde(default)]
    pub port: Option<u16>,

    pub username: String,

    #[serde(default)]
    pub password: Option<String>,

    /// Path to a private key file. Takes precedence over `password`.
    #[serde(default)]
    pub private_key: Option<PathBuf>,

    pub protocol: String,

    /// Remote subtree to scan.
    #[serde(default = "default_root_path")]
    pub root_path: String,

    /// Connection timeout in milliseconds; the global remote timeout when absent.
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    #[serde(default)]
    pub enabled: bool,
}

fn default_root_path() -> String {
    "/".to_string()
}

impl ConnectionDescriptor {
    /// Create an enabled descriptor with default port and root path.
    pub fn new(
        protocol: impl Into<String>,
        host: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: None,
            username: username.into(),
            password: None,
            private_key: None,
            protocol: protocol.into(),
            root_path: default_root_path(),
            timeout_ms: None,
            enabled: true,
        }
    }

    /// Resolve the protocol tag.
    pub fn protocol(&self) -> Result<Protocol, ScanError> {
        Protocol::parse(&self.protocol)
    }

    /// Effective port: the configured one, else the protocol default, else 0.
    pub fn effective_port(&self) -> u16 {
        self.port
            .or_else(|| self.protocol().ok().and_then(|p| p.default_port()))
            .unwrap_or(0)
    }

    /// Effective connection timeout.
    pub fn timeout(&self, global_ms: u64) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or(global_ms))
    }

    /// `protocol://user@host:port`, used in logs and as the connection string.
    pub fn target_label(&self) -> String {
        format!(
            "{}://{}@{}:{}",
            self.scheme(),
            self.username,
            self.host,
            self.effective_port()
        )
    }

    /// Canonical protocol name, or the configured one lowercased when unknown.
    fn scheme(&self) -> String {
        self.protocol()
            .map(|p| p.to_string())
            .unwrap_or_else(|_| self.protocol.trim().to_ascii_lowercase())
    }

    /// Record key for a remote path on this connection.
    pub fn record_path(&self, remote_path: &str) -> String {
        if remote_path.starts_with('/') {
            format!("{}{remote_path}", self.target_label())
        } else {
            format!("{}/{remote_path}", self.target_label())
        }
    }
}
