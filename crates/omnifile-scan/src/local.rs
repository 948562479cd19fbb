//! Local filesystem session.

use std::fs::Metadata;
use std::path::Path;

#[cfg(unix)]
use std::os::unix::fs::MetadataExt;

use omnifile_core::{FileRecord, Protocol, ScanError, Timestamps};

use crate::session::{DirEntry, DirKey, Session};

/// Session over the filesystem of the scanning machine.
///
/// `connect` and `disconnect` do nothing. Attribute mapping:
///
/// - `is_hidden`: the Windows hidden attribute, elsewhere a leading `.`.
/// - `is_system`: the Windows system attribute, elsewhere always `false`.
/// - `is_read_only`: the platform read-only permission check.
/// - `owner`: the numeric uid on Unix, absent elsewhere.
/// - `permissions`: the octal mode on Unix, absent elsewhere.
/// - `created_at`: the birth time where the platform reports one, else the
///   modification time.
///
/// Symbolic links are reported as what they are unless `follow_symlinks`
/// is set, in which case the target's metadata is used.
#[derive(Debug, Default)]
pub struct LocalSession {
    follow_symlinks: bool,
}

impl LocalSession {
    /// Create a session that does not follow symbolic links.
    pub fn new() -> Self {
        Self::default()
    }

    /// Follow symbolic links when statting and descending.
    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    fn metadata(&self, path: &str) -> Result<Metadata, ScanError> {
        let result = if self.follow_symlinks {
            std::fs::metadata(path)
        } else {
            std::fs::symlink_metadata(path)
        };
        result.map_err(|e| ScanError::io(path, e))
    }
}

impl Session for LocalSession {
    fn protocol(&self) -> Protocol {
        Protocol::Local
    }

    fn connect(&mut self) -> Result<(), ScanError> {
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), ScanError> {
        Ok(())
    }

    fn list_directory(&self, path: &str) -> Result<Vec<DirEntry>, ScanError> {
        let read_dir = std::fs::read_dir(path).map_err(|e| ScanError::io(path, e))?;

        let mut entries = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|e| ScanError::io(path, e))?;
            let file_name = entry.file_name();
            let lossy = file_name.to_str().is_none();
            let name = file_name.to_string_lossy().to_string();
            let (is_dir, size) = match entry.file_type() {
                Ok(file_type) if file_type.is_dir() => (true, 0),
                Ok(_) => (false, entry.metadata().map(|m| m.len()).unwrap_or(0)),
                Err(_) => (false, 0),
            };
            entries.push(DirEntry::new(name, is_dir, size).with_lossy_name(lossy));
        }
        Ok(entries)
    }

    fn stat_path(&self, path: &str) -> Result<FileRecord, ScanError> {
        let metadata = self.metadata(path)?;
        let is_dir = metadata.is_dir();

        let mut record = FileRecord::new(path, Protocol::Local, is_dir)
            .with_size(metadata.len())
            .with_timestamps(Timestamps::from_system(
                metadata.modified().ok(),
                metadata.accessed().ok(),
                metadata.created().ok(),
            ));

        record.is_read_only = metadata.permissions().readonly();
        record.is_hidden = is_hidden(Path::new(path), &metadata);
        record.is_system = is_system(&metadata);
        record.owner = owner(&metadata);
        record.permissions = permissions(&metadata);
        Ok(record)
    }

    fn join(&self, parent: &str, name: &str) -> String {
        Path::new(parent).join(name).to_string_lossy().to_string()
    }

    fn directory_key(&self, path: &str) -> Option<DirKey> {
        dir_key(&std::fs::metadata(path).ok()?)
    }
}

// Cross-platform metadata helpers

#[cfg(windows)]
const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
#[cfg(windows)]
const FILE_ATTRIBUTE_SYSTEM: u32 = 0x4;

#[cfg(windows)]
fn is_hidden(_path: &Path, metadata: &Metadata) -> bool {
    use std::os::windows::fs::MetadataExt;
    metadata.file_attributes() & FILE_ATTRIBUTE_HIDDEN != 0
}

#[cfg(not(windows))]
fn is_hidden(path: &Path, _metadata: &Metadata) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with('.'))
}

#[cfg(windows)]
fn is_system(metadata: &Metadata) -> bool {
    use std::os::windows::fs::MetadataExt;
    metadata.file_attributes() & FILE_ATTRIBUTE_SYSTEM != 0
}

#[cfg(not(windows))]
fn is_system(_metadata: &Metadata) -> bool {
    false
}

#[cfg(unix)]
fn owner(metadata: &Metadata) -> Option<String> {
    Some(metadata.uid().to_string())
}

#[cfg(not(unix))]
fn owner(_metadata: &Metadata) -> Option<String> {
    None
}

#[cfg(unix)]
fn permissions(metadata: &Metadata) -> Option<String> {
    Some(format!("{:o}", metadata.mode() & 0o7777))
}

#[cfg(not(unix))]
fn permissions(_metadata: &Metadata) -> Option<String> {
    None
}

#[cfg(unix)]
fn dir_key(metadata: &Metadata) -> Option<DirKey> {
    Some(DirKey::new(metadata.ino(), metadata.dev()))
}

#[cfg(not(unix))]
fn dir_key(_metadata: &Metadata) -> Option<DirKey> {
    None // No stable inode numbers
}
