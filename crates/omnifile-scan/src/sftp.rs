//! SSH/SFTP session.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;

use ssh2::{ErrorCode, FileStat, Session as SshSession, Sftp};
use tracing::{debug, info};

use omnifile_core::{ConnectionDescriptor, FileRecord, Protocol, ScanError, Timestamps, file_name};

use crate::session::{DirEntry, DirKey, Session};

// libssh2 SFTP status codes
const FX_NO_SUCH_FILE: i32 = 2;
const FX_PERMISSION_DENIED: i32 = 3;

/// Session over SFTP.
///
/// Attribute mapping onto [`FileRecord`]:
///
/// - `is_hidden`: SFTP has no hidden flag, so names starting with `.` are
///   hidden.
/// - `is_read_only`, `is_system`: not expressible over SFTP, always `false`.
/// - `created_at`: SFTP reports no creation time; the modification time is
///   used.
/// - `owner`: the numeric uid.
/// - `permissions`: the mode rendered as `ls -l` style text (`drwxr-xr-x`).
///
/// Symbolic links are reported as links (`lstat`) unless `follow_symlinks`
/// is set. When following, directories are keyed by their resolved path so
/// the walker can detect loops.
pub struct SftpSession {
    descriptor: ConnectionDescriptor,
    default_timeout_ms: u64,
    follow_symlinks: bool,
    connection: Option<Connection>,
}

struct Connection {
    session: SshSession,
    sftp: Sftp,
}

impl SftpSession {
    /// Create an unconnected session for `descriptor`.
    ///
    /// `default_timeout_ms` applies when the descriptor sets no timeout.
    pub fn new(descriptor: ConnectionDescriptor, default_timeout_ms: u64) -> Self {
        Self {
            descriptor,
            default_timeout_ms,
            follow_symlinks: false,
            connection: None,
        }
    }

    /// Follow symbolic links when statting and descending.
    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Check if `connect` has succeeded and `disconnect` has not been called.
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    fn sftp(&self) -> Result<&Sftp, ScanError> {
        self.connection
            .as_ref()
            .map(|c| &c.sftp)
            .ok_or(ScanError::NotConnected)
    }

    fn connection_error(&self, message: impl Into<String>) -> ScanError {
        ScanError::Connection {
            target: self.descriptor.target_label(),
            message: message.into(),
        }
    }

    fn open(&self) -> Result<Connection, ScanError> {
        let host = self.descriptor.host.as_str();
        let port = self.descriptor.effective_port();
        let timeout = self.descriptor.timeout(self.default_timeout_ms);

        let addr = (host, port)
            .to_socket_addrs()
            .map_err(|e| self.connection_error(format!("cannot resolve {host}: {e}")))?
            .next()
            .ok_or_else(|| self.connection_error(format!("no address for {host}")))?;

        let tcp = TcpStream::connect_timeout(&addr, timeout)
            .map_err(|e| self.connection_error(e.to_string()))?;

        let mut session = SshSession::new().map_err(|e| self.connection_error(e.to_string()))?;
        session.set_timeout(u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX));
        session.set_tcp_stream(tcp);
        session
            .handshake()
            .map_err(|e| self.connection_error(format!("handshake failed: {e}")))?;

        let user = self.descriptor.username.as_str();
        if let Some(key) = &self.descriptor.private_key {
            session
                .userauth_pubkey_file(user, None, key, self.descriptor.password.as_deref())
                .map_err(|e| self.connection_error(format!("key authentication failed: {e}")))?;
        } else {
            let password = self.descriptor.password.as_deref().unwrap_or_default();
            session
                .userauth_password(user, password)
                .map_err(|e| self.connection_error(format!("password authentication failed: {e}")))?;
        }
        if !session.authenticated() {
            return Err(self.connection_error("authentication failed"));
        }

        let sftp = session
            .sftp()
            .map_err(|e| self.connection_error(format!("SFTP subsystem unavailable: {e}")))?;

        Ok(Connection { session, sftp })
    }

    fn to_record(&self, path: &str, stat: &FileStat) -> FileRecord {
        let is_dir = stat.is_dir();
        let name = file_name(path);

        let mut record = FileRecord::new(self.descriptor.record_path(path), Protocol::Ssh, is_dir)
            .with_size(stat.size.unwrap_or(0))
            .with_timestamps(Timestamps::from_unix(stat.mtime, stat.atime));

        record.is_hidden = name.starts_with('.');
        record.is_read_only = false;
        record.is_system = false;
        record.owner = stat.uid.map(|uid| uid.to_string());
        record.permissions = stat.perm.map(format_mode);
        record.remote_host = Some(self.descriptor.host.clone());
        record.remote_port = Some(self.descriptor.effective_port());
        record.remote_user = Some(self.descriptor.username.clone());
        record.connection_string = Some(self.descriptor.target_label());
        record
    }
}

impl Session for SftpSession {
    fn protocol(&self) -> Protocol {
        Protocol::Ssh
    }

    fn connect(&mut self) -> Result<(), ScanError> {
        if self.connection.is_some() {
            return Ok(());
        }
        let connection = self.open()?;
        info!(
            target = %self.descriptor.target_label(),
            "SSH connection established"
        );
        self.connection = Some(connection);
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), ScanError> {
        if let Some(connection) = self.connection.take() {
            drop(connection.sftp);
            connection
                .session
                .disconnect(None, "scan complete", None)
                .map_err(|e| self.connection_error(e.to_string()))?;
            debug!(target = %self.descriptor.target_label(), "SSH session closed");
        }
        Ok(())
    }

    fn list_directory(&self, path: &str) -> Result<Vec<DirEntry>, ScanError> {
        let items = self
            .sftp()?
            .readdir(Path::new(path))
            .map_err(|e| remote_error(path, e))?;

        Ok(items
            .into_iter()
            .filter_map(|(child, stat)| {
                let file_name = child.file_name()?;
                let name = file_name.to_string_lossy().to_string();
                if name == "." || name == ".." || name.is_empty() {
                    return None;
                }
                Some(
                    DirEntry::new(name, stat.is_dir(), stat.size.unwrap_or(0))
                        .with_lossy_name(file_name.to_str().is_none()),
                )
            })
            .collect())
    }

    fn stat_path(&self, path: &str) -> Result<FileRecord, ScanError> {
        let sftp = self.sftp()?;
        let stat = if self.follow_symlinks {
            sftp.stat(Path::new(path))
        } else {
            sftp.lstat(Path::new(path))
        }
        .map_err(|e| remote_error(path, e))?;
        Ok(self.to_record(path, &stat))
    }

    fn directory_key(&self, path: &str) -> Option<DirKey> {
        if !self.follow_symlinks {
            return None;
        }
        let resolved = self.sftp().ok()?.realpath(Path::new(path)).ok()?;
        Some(resolved_key(&resolved))
    }
}

impl Drop for SftpSession {
    fn drop(&mut self) {
        let _ = self.disconnect();
    }
}

fn remote_error(path: &str, err: ssh2::Error) -> ScanError {
    match err.code() {
        ErrorCode::SFTP(FX_NO_SUCH_FILE) => ScanError::NotFound { path: path.into() },
        ErrorCode::SFTP(FX_PERMISSION_DENIED) => ScanError::PermissionDenied { path: path.into() },
        _ => ScanError::Remote {
            path: path.into(),
            message: err.to_string(),
        },
    }
}

/// Key a directory by its resolved remote path; SFTP exposes no inodes.
fn resolved_key(resolved: &Path) -> DirKey {
    let mut hasher = DefaultHasher::new();
    resolved.hash(&mut hasher);
    DirKey::new(hasher.finish(), 0)
}

/// Render a Unix mode as `ls -l` text.
pub fn format_mode(mode: u32) -> String {
    let kind = match mode & 0o170000 {
        0o040000 => 'd',
        0o120000 => 'l',
        0o020000 => 'c',
        0o060000 => 'b',
        0o010000 => 'p',
        0o140000 => 's',
        _ => '-',
    };
    let mut out = String::with_capacity(10);
    out.push(kind);
    for shift in [6, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    out
}
