//! Walk progress reporting.

use std::time::{Duration, Instant};

/// Progress information during a walk.
#[derive(Debug, Clone)]
pub struct ScanProgress {
    /// Root of the walk this progress belongs to.
    pub root: String,
    /// Number of file records emitted so far.
    pub files_scanned: u64,
    /// Number of directory records emitted so far.
    pub dirs_scanned: u64,
    /// Total bytes seen so far.
    pub bytes_scanned: u64,
    /// Path most recently emitted.
    pub current_path: String,
    /// Number of node errors encountered.
    pub errors_count: u64,
    /// Time elapsed since the walk started.
    pub elapsed: Duration,
}

impl ScanProgress {
    /// Calculate scan rate in records per second.
    pub fn records_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.total_items() as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Get total items scanned (files + dirs).
    pub fn total_items(&self) -> u64 {
        self.files_scanned + self.dirs_scanned
    }
}

/// Running counters for one walk.
#[derive(Debug)]
pub(crate) struct ProgressTracker {
    start_time: Instant,
    root: String,
    files_scanned: u64,
    dirs_scanned: u64,
    bytes_scanned: u64,
    errors_count: u64,
    current_path: String,
}

impl ProgressTracker {
    pub fn new(root: &str) -> Self {
        Self {
            start_time: Instant::now(),
            root: root.to_string(),
            files_scanned: 0,
            dirs_scanned: 0,
            bytes_scanned: 0,
            errors_count: 0,
            current_path: String::new(),
        }
    }

    pub fn record(&mut self, path: &str, is_dir: bool, size: u64) {
        if is_dir {
            self.dirs_scanned += 1;
        } else {
            self.files_scanned += 1;
        }
        self.bytes_scanned += size;
        self.current_path.clear();
        self.current_path.push_str(path);
    }

    pub fn record_error(&mut self) {
        self.errors_count += 1;
    }

    pub fn total_items(&self) -> u64 {
        self.files_scanned + self.dirs_scanned
    }

    pub fn snapshot(&self) -> ScanProgress {
        ScanProgress {
            root: self.root.clone(),
            files_scanned: self.files_scanned,
            dirs_scanned: self.dirs_scanned,
            bytes_scanned: self.bytes_scanned,
            current_path: self.current_path.clone(),
            errors_count: self.errors_count,
            elapsed: self.start_time.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_snapshot() {
        let mut tracker = ProgressTracker::new("/root");
        tracker.record("/root", true, 0);
        tracker.record("/root/a.txt", false, 10);
        tracker.record_error();

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.root, "/root");
        assert_eq!(snapshot.files_scanned, 1);
        assert_eq!(snapshot.dirs_scanned, 1);
        assert_eq!(snapshot.bytes_scanned, 10);
        assert_eq!(snapshot.current_path, "/root/a.txt");
        assert_eq!(snapshot.errors_count, 1);
        assert_eq!(snapshot.total_items(), 2);
    }
}
