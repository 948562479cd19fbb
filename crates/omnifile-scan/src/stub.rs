//! Protocols without a working adapter, and adapter selection.

use omnifile_core::{ConnectionDescriptor, FileRecord, Protocol, ScanError};

use crate::session::{DirEntry, Session};

/// Session for a protocol that is recognised but not implemented.
///
/// Every capability fails with [`ScanError::UnsupportedProtocol`] and
/// leaves no state behind, `connect` included.
#[derive(Debug, Clone, Copy)]
pub struct UnsupportedSession {
    protocol: Protocol,
}

impl UnsupportedSession {
    /// Create a stub for `protocol`.
    pub fn new(protocol: Protocol) -> Self {
        Self { protocol }
    }

    fn unsupported(&self) -> ScanError {
        ScanError::UnsupportedProtocol {
            protocol: self.protocol.to_string(),
        }
    }
}

impl Session for UnsupportedSession {
    fn protocol(&self) -> Protocol {
        self.protocol
    }

    fn connect(&mut self) -> Result<(), ScanError> {
        Err(self.unsupported())
    }

    fn disconnect(&mut self) -> Result<(), ScanError> {
        Err(self.unsupported())
    }

    fn list_directory(&self, _path: &str) -> Result<Vec<DirEntry>, ScanError> {
        Err(self.unsupported())
    }

    fn stat_path(&self, _path: &str) -> Result<FileRecord, ScanError> {
        Err(self.unsupported())
    }
}

/// Select the session adapter for a remote connection.
///
/// `ssh` (alias `sftp`) yields an SFTP session, `ftp` and `telnet` yield
/// stubs. Any other name, `local` included, fails with
/// [`ScanError::UnsupportedProtocol`] naming the configured protocol.
/// The returned session is not connected yet and does not follow
/// symbolic links.
pub fn open_session(
    descriptor: &ConnectionDescriptor,
    default_timeout_ms: u64,
) -> Result<Box<dyn Session + Send>, ScanError> {
    open_session_with(descriptor, default_timeout_ms, false)
}

/// Like [`open_session`], with symbolic links followed when
/// `follow_symlinks` is set.
pub fn open_session_with(
    descriptor: &ConnectionDescriptor,
    default_timeout_ms: u64,
    follow_symlinks: bool,
) -> Result<Box<dyn Session + Send>, ScanError> {
    match descriptor.protocol()? {
        #[cfg(feature = "ssh")]
        Protocol::Ssh => Ok(Box::new(
            crate::sftp::SftpSession::new(descriptor.clone(), default_timeout_ms)
                .with_follow_symlinks(follow_symlinks),
        )),
        #[cfg(not(feature = "ssh"))]
        Protocol::Ssh => {
            let _ = (default_timeout_ms, follow_symlinks);
            Ok(Box::new(UnsupportedSession::new(Protocol::Ssh)))
        }
        protocol @ (Protocol::Ftp | Protocol::Telnet) => {
            Ok(Box::new(UnsupportedSession::new(protocol)))
        }
        Protocol::Local => Err(ScanError::UnsupportedProtocol {
            protocol: descriptor.protocol.clone(),
        }),
    }
}
