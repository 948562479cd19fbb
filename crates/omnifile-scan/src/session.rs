//! The capability contract every protocol adapter implements.

use compact_str::CompactString;

use omnifile_core::{FileRecord, Protocol, ScanError};

use crate::walker::{TreeWalker, WalkReport};

/// Callback invoked for every record a walk produces.
///
/// A returned error is logged and counted; it never stops the walk.
pub type RecordCallback<'a> = dyn FnMut(FileRecord) -> Result<(), ScanError> + 'a;

/// One immediate child returned by [`Session::list_directory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Entry name, never `.` or `..`.
    pub name: CompactString,
    /// Whether the listing reports a directory.
    pub is_dir: bool,
    /// Size as reported by the listing.
    pub size: u64,
    /// `name` was decoded lossily and does not address the entry.
    pub lossy_name: bool,
}

impl DirEntry {
    /// Create a directory entry.
    pub fn new(name: impl Into<CompactString>, is_dir: bool, size: u64) -> Self {
        Self {
            name: name.into(),
            is_dir,
            size,
            lossy_name: false,
        }
    }

    /// Mark the name as a lossy decoding of a non-UTF-8 name.
    pub fn with_lossy_name(mut self, lossy: bool) -> Self {
        self.lossy_name = lossy;
        self
    }
}

/// Identity of a directory for cycle detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DirKey {
    /// Inode number.
    pub inode: u64,
    /// Device ID.
    pub device: u64,
}

impl DirKey {
    /// Create a new key.
    pub fn new(inode: u64, device: u64) -> Self {
        Self { inode, device }
    }
}

/// Handle through which one target is listed and statted.
///
/// Adapters are selected at runtime by protocol tag (see
/// [`open_session`](crate::open_session)). Paths are the target's own
/// addressing: local filesystem paths for [`LocalSession`](crate::LocalSession),
/// remote absolute paths for remote sessions. The `path` of the records a
/// session returns is the store key, which for remote sessions embeds the
/// connection.
pub trait Session {
    /// Protocol this session speaks.
    fn protocol(&self) -> Protocol;

    /// Establish the session. Must be called before listing or statting.
    fn connect(&mut self) -> Result<(), ScanError>;

    /// Tear the session down. Safe to call more than once.
    fn disconnect(&mut self) -> Result<(), ScanError>;

    /// Immediate children of `path`, in the order the protocol returns them.
    fn list_directory(&self, path: &str) -> Result<Vec<DirEntry>, ScanError>;

    /// Metadata for a single path.
    fn stat_path(&self, path: &str) -> Result<FileRecord, ScanError>;

    /// Join a child name onto a parent path.
    fn join(&self, parent: &str, name: &str) -> String {
        if parent.ends_with('/') {
            format!("{parent}{name}")
        } else {
            format!("{parent}/{name}")
        }
    }

    /// Identity of a directory, when the protocol can tell two paths apart
    /// as the same directory.
    fn directory_key(&self, _path: &str) -> Option<DirKey> {
        None
    }

    /// Walk `path` recursively, invoking `on_record` for every node.
    ///
    /// The default delegates to the shared [`TreeWalker`].
    fn scan_directory(
        &self,
        path: &str,
        walker: &TreeWalker,
        on_record: &mut RecordCallback<'_>,
    ) -> Result<WalkReport, ScanError> {
        walker.walk(self, path, on_record)
    }
}

impl<S: Session + ?Sized> Session for Box<S> {
    fn protocol(&self) -> Protocol {
        (**self).protocol()
    }

    fn connect(&mut self) -> Result<(), ScanError> {
        (**self).connect()
    }

    fn disconnect(&mut self) -> Result<(), ScanError> {
        (**self).disconnect()
    }

    fn list_directory(&self, path: &str) -> Result<Vec<DirEntry>, ScanError> {
        (**self).list_directory(path)
    }

    fn stat_path(&self, path: &str) -> Result<FileRecord, ScanError> {
        (**self).stat_path(path)
    }

    fn join(&self, parent: &str, name: &str) -> String {
        (**self).join(parent, name)
    }

    fn directory_key(&self, path: &str) -> Option<DirKey> {
        (**self).directory_key(path)
    }

    fn scan_directory(
        &self,
        path: &str,
        walker: &TreeWalker,
        on_record: &mut RecordCallback<'_>,
    ) -> Result<WalkReport, ScanError> {
        (**self).scan_directory(path, walker, on_record)
    }
}
