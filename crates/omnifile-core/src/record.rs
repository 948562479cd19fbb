//! Per-entry metadata records.

use std::time::SystemTime;

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::protocol::Protocol;

/// Entry timestamps.
///
/// All three are always present. Protocols that cannot report one of them
/// substitute the nearest value they do have (see each session adapter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamps {
    /// Creation time.
    #[serde(rename = "createdAt")]
    pub created: DateTime<Utc>,
    /// Last modification time.
    #[serde(rename = "modifiedAt")]
    pub modified: DateTime<Utc>,
    /// Last access time.
    #[serde(rename = "accessedAt")]
    pub accessed: DateTime<Utc>,
}

impl Timestamps {
    /// Create timestamps where every field is the modification time.
    pub fn with_modified(modified: DateTime<Utc>) -> Self {
        Self {
            created: modified,
            modified,
            accessed: modified,
        }
    }

    /// Create timestamps from optional system times.
    ///
    /// Missing access time falls back to the modification time, missing
    /// creation time falls back to the modification time, and a missing
    /// modification time falls back to the Unix epoch.
    pub fn from_system(
        modified: Option<SystemTime>,
        accessed: Option<SystemTime>,
        created: Option<SystemTime>,
    ) -> Self {
        let modified: DateTime<Utc> = modified.unwrap_or(SystemTime::UNIX_EPOCH).into();
        Self {
            created: created.map(Into::into).unwrap_or(modified),
            modified,
            accessed: accessed.map(Into::into).unwrap_or(modified),
        }
    }

    /// Create timestamps from Unix seconds, as reported by SFTP.
    pub fn from_unix(modified: Option<u64>, accessed: Option<u64>) -> Self {
        let to_utc = |secs: u64| {
            i64::try_from(secs)
                .ok()
                .and_then(|s| DateTime::from_timestamp(s, 0))
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
        };
        let modified = modified.map(to_utc).unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        Self {
            created: modified,
            modified,
            accessed: accessed.map(to_utc).unwrap_or(modified),
        }
    }
}

impl Default for Timestamps {
    fn default() -> Self {
        Self::with_modified(DateTime::<Utc>::UNIX_EPOCH)
    }
}

/// One observed file or directory.
///
/// `path` is the natural key: at most one stored record exists per distinct
/// value. For local entries it is the filesystem path, for remote entries a
/// URI of the form `protocol://user@host:port/remote/path`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// Final path component.
    pub name: CompactString,

    /// Extension including the leading dot, empty when there is none.
    pub extension: CompactString,

    /// Size in bytes, 0 for directories.
    pub size: u64,

    /// Entry timestamps.
    #[serde(flatten)]
    pub timestamps: Timestamps,

    pub is_read_only: bool,
    pub is_hidden: bool,
    pub is_system: bool,
    pub is_directory: bool,

    /// Owner, as the protocol reports it (uid on Unix and SFTP).
    pub owner: Option<String>,

    /// Protocol-specific permission string.
    pub permissions: Option<String>,

    /// Natural key.
    pub path: String,

    pub protocol: Protocol,

    pub remote_host: Option<String>,
    pub remote_port: Option<u16>,
    pub remote_user: Option<String>,
    pub connection_string: Option<String>,

    /// Hostname of the scanning machine.
    pub host: Option<String>,
    /// IPv4 address of the scanning machine.
    pub ip: Option<String>,
    /// MAC address of the scanning machine.
    pub mac: Option<String>,
    /// When this scan observed the entry.
    pub read_at: Option<DateTime<Utc>>,
}

impl FileRecord {
    /// Create a record with every optional field empty.
    pub fn new(path: impl Into<String>, protocol: Protocol, is_directory: bool) -> Self {
        let path = path.into();
        let name = file_name(&path);
        let extension = if is_directory {
            CompactString::default()
        } else {
            extension_of(&name)
        };
        Self {
            name,
            extension,
            size: 0,
            timestamps: Timestamps::default(),
            is_read_only: false,
            is_hidden: false,
            is_system: false,
            is_directory,
            owner: None,
            permissions: None,
            path,
            protocol,
            remote_host: None,
            remote_port: None,
            remote_user: None,
            connection_string: None,
            host: None,
            ip: None,
            mac: None,
            read_at: None,
        }
    }

    /// Set the size, keeping directories at 0.
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = if self.is_directory { 0 } else { size };
        self
    }

    /// Set the timestamps.
    pub fn with_timestamps(mut self, timestamps: Timestamps) -> Self {
        self.timestamps = timestamps;
        self
    }

    /// Check if this record came from a remote session.
    pub fn is_remote(&self) -> bool {
        self.protocol.is_remote()
    }

    /// Check if the scanning-machine fields have been filled in.
    pub fn is_enriched(&self) -> bool {
        self.read_at.is_some()
    }
}

/// Last component of a local or remote path.
///
/// Both separators are accepted; a root path is its own name.
pub fn file_name(path: &str) -> CompactString {
    let trimmed = path.trim_end_matches(['/', '\\']);
    if trimmed.is_empty() {
        return CompactString::new(path);
    }
    match trimmed.rfind(['/', '\\']) {
        Some(idx) => CompactString::new(&trimmed[idx + 1..]),
        None => CompactString::new(trimmed),
    }
}

/// Extension of a file name including the dot.
///
/// Dot-files without a further dot (`.bashrc`) have no extension.
pub fn extension_of(name: &str) -> CompactString {
    match name.rfind('.') {
        Some(0) | None => CompactString::default(),
        Some(idx) if idx + 1 == name.len() => CompactString::default(),
        Some(idx) => CompactString::new(&name[idx..]),
    }
}
