//! Aggregate statistics.

use serde::{Deserialize, Serialize};

use crate::record::FileRecord;

/// Per-protocol aggregate over the stored records.
///
/// Derived on demand from the store, never maintained incrementally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolStats {
    /// Number of non-directory entries.
    pub files: u64,
    /// Number of directory entries.
    pub directories: u64,
    /// Sum of entry sizes in bytes.
    pub total_size: u64,
}

impl ProtocolStats {
    /// Create new empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one record.
    pub fn record(&mut self, is_directory: bool, size: u64) {
        if is_directory {
            self.directories += 1;
        } else {
            self.files += 1;
        }
        self.total_size += size;
    }

    /// Total number of entries.
    pub fn entries(&self) -> u64 {
        self.files + self.directories
    }

    /// Total size in mebibytes, as the statistics report shows it.
    pub fn size_mb(&self) -> f64 {
        self.total_size as f64 / 1024.0 / 1024.0
    }
}

/// Summary statistics for one walk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalkStats {
    /// Records handed to the callback.
    pub records_emitted: u64,
    /// Non-directory records emitted.
    pub files: u64,
    /// Directory records emitted.
    pub directories: u64,
    /// Sum of emitted sizes.
    pub total_size: u64,
    /// Deepest level reached (root is 0).
    pub max_depth: u32,
    /// Records whose callback returned an error.
    pub callback_failures: u64,
}

impl WalkStats {
    /// Create new empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Update stats with an emitted record.
    pub fn record(&mut self, record: &FileRecord, depth: u32) {
        self.records_emitted += 1;
        if record.is_directory {
            self.directories += 1;
        } else {
            self.files += 1;
        }
        self.total_size += record.size;
        self.max_depth = self.max_depth.max(depth);
    }

    /// Record a callback failure.
    pub fn record_callback_failure(&mut self) {
        self.callback_failures += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Protocol;

    #[test]
    fn test_protocol_stats_record() {
        let mut stats = ProtocolStats::new();
        stats.record(true, 0);
        stats.record(false, 10);
        stats.record(false, 5);

        assert_eq!(stats.files, 2);
        assert_eq!(stats.directories, 1);
        assert_eq!(stats.total_size, 15);
        assert_eq!(stats.entries(), 3);
    }

    #[test]
    fn test_walk_stats_record() {
        let mut stats = WalkStats::new();
        let file = FileRecord::new("/test/file.txt", Protocol::Local, false).with_size(1024);
        let dir = FileRecord::new("/test", Protocol::Local, true);

        stats.record(&dir, 0);
        stats.record(&file, 2);

        assert_eq!(stats.records_emitted, 2);
        assert_eq!(stats.files, 1);
        assert_eq!(stats.directories, 1);
        assert_eq!(stats.total_size, 1024);
        assert_eq!(stats.max_depth, 2);
    }
}
