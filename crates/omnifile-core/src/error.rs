//! Error types for scanning and indexing.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while scanning a target or persisting its records.
///
/// Paths are plain strings because remote paths are not local filesystem
/// paths.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The metadata store cannot be reached. Aborts the whole run.
    #[error("Metadata store unavailable: {message}")]
    StoreUnavailable { message: String },

    /// A session to a remote target could not be established.
    #[error("Connection to {target} failed: {message}")]
    Connection { target: String, message: String },

    /// No working adapter exists for the protocol.
    #[error("Unsupported protocol: {protocol}")]
    UnsupportedProtocol { protocol: String },

    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: String },

    /// Path not found.
    #[error("Path not found: {path}")]
    NotFound { path: String },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Error reported by a remote session for one path.
    #[error("Remote error at {path}: {message}")]
    Remote { path: String, message: String },

    /// The entry name cannot be represented as a path string.
    #[error("Name is not valid UTF-8: {path}")]
    InvalidName { path: String },

    /// A session method was called before `connect`.
    #[error("Session not connected")]
    NotConnected,

    /// The path is already indexed.
    #[error("Already indexed: {path}")]
    DuplicateKey { path: String },

    /// A store operation failed after the store was reachable.
    #[error("Store error: {message}")]
    Store { message: String },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl ScanError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }

    /// Check if this error concerns a single node and the walk may go on.
    pub fn is_node_access(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied { .. }
                | Self::NotFound { .. }
                | Self::Io { .. }
                | Self::Remote { .. }
                | Self::InvalidName { .. }
        )
    }

    /// Check if this error must stop the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. })
    }

    /// Warning kind used when this error is recorded against a node.
    pub fn warning_kind(&self) -> WarningKind {
        match self {
            Self::PermissionDenied { .. } => WarningKind::PermissionDenied,
            Self::NotFound { .. } => WarningKind::NotFound,
            Self::Store { .. } | Self::DuplicateKey { .. } | Self::StoreUnavailable { .. } => {
                WarningKind::CallbackFailed
            }
            _ => WarningKind::ReadError,
        }
    }
}

/// Kind of scan warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    /// Permission was denied.
    PermissionDenied,
    /// Entry vanished between listing and stat.
    NotFound,
    /// Error listing a directory.
    ReadError,
    /// Error reading metadata.
    MetadataError,
    /// Directory already visited through another link.
    Cycle,
    /// The per-record callback failed.
    CallbackFailed,
}

/// Non-fatal warning encountered during a walk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanWarning {
    /// Path where the warning occurred.
    pub path: String,
    /// Human-readable message.
    pub message: String,
    /// Kind of warning.
    pub kind: WarningKind,
}

impl ScanWarning {
    /// Create a new scan warning.
    pub fn new(path: impl Into<String>, message: impl Into<String>, kind: WarningKind) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind,
        }
    }

    /// Create a warning from an error raised while statting a node.
    pub fn metadata(path: impl Into<String>, error: &ScanError) -> Self {
        let kind = match error.warning_kind() {
            WarningKind::ReadError => WarningKind::MetadataError,
            kind => kind,
        };
        Self::new(path, error.to_string(), kind)
    }

    /// Create a warning from an error raised while listing a directory.
    pub fn listing(path: impl Into<String>, error: &ScanError) -> Self {
        Self::new(path, error.to_string(), error.warning_kind())
    }

    /// Create a cycle warning.
    pub fn cycle(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            message: format!("Directory already visited: {path}"),
            path,
            kind: WarningKind::Cycle,
        }
    }

    /// Check if this warning is a node-access error.
    pub fn is_node_access(&self) -> bool {
        !matches!(self.kind, WarningKind::Cycle | WarningKind::CallbackFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_error_io() {
        let err = ScanError::io(
            "/test/path",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, ScanError::PermissionDenied { .. }));
        assert!(err.is_node_access());
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_error_classes() {
        let store = ScanError::StoreUnavailable {
            message: "refused".into(),
        };
        assert!(store.is_fatal());
        assert!(!store.is_node_access());

        let unsupported = ScanError::UnsupportedProtocol {
            protocol: "ftp".into(),
        };
        assert!(!unsupported.is_node_access());
        assert!(!unsupported.is_fatal());

        let name = ScanError::InvalidName {
            path: "/srv/bad\u{FFFD}.txt".into(),
        };
        assert!(name.is_node_access());
        assert_eq!(
            ScanWarning::metadata("/srv/bad\u{FFFD}.txt", &name).kind,
            WarningKind::MetadataError
        );
    }

    #[test]
    fn test_scan_warning_creation() {
        let err = ScanError::io(
            "/test/path",
            std::io::Error::new(std::io::ErrorKind::Other, "boom"),
        );
        let warning = ScanWarning::metadata("/test/path", &err);
        assert_eq!(warning.kind, WarningKind::MetadataError);
        assert!(warning.message.contains("boom"));
        assert!(warning.is_node_access());

        assert!(!ScanWarning::cycle("/loop").is_node_access());
    }
}
