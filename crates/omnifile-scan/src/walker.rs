//! Protocol-agnostic depth-first tree walker.

use std::time::{Duration, Instant};

use globset::GlobSet;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

use omnifile_core::{FileRecord, ScanConfig, ScanError, ScanWarning, WalkStats, WarningKind};

use crate::progress::{ProgressTracker, ScanProgress};
use crate::session::{DirEntry, RecordCallback, Session};
use crate::tracker::DirectoryTracker;

/// Outcome of walking one target.
#[derive(Debug, Clone)]
pub struct WalkReport {
    /// Path the walk started from.
    pub root: String,
    /// Counts of emitted records.
    pub stats: WalkStats,
    /// Nodes that were skipped, in the order they were hit.
    pub warnings: Vec<ScanWarning>,
    /// Duration of the walk.
    pub duration: Duration,
}

impl WalkReport {
    /// Number of node-access errors (stat or listing failures).
    pub fn node_errors(&self) -> usize {
        self.warnings.iter().filter(|w| w.is_node_access()).count()
    }

    /// Check if there were any warnings during the walk.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// A directory whose children are still being visited.
struct Frame {
    path: String,
    depth: u32,
    entries: std::vec::IntoIter<DirEntry>,
}

/// Walks a tree through any [`Session`].
///
/// Traversal is depth-first in listing order: a directory's record is
/// emitted, then each child is statted and emitted, and a child directory
/// is fully walked before its next sibling. An explicit stack replaces
/// recursion so deep trees cannot exhaust the call stack.
///
/// Failures below the root are recorded as [`ScanWarning`]s and the walk
/// moves on to the next sibling. Only a failure at the root itself is
/// returned as an error.
pub struct TreeWalker {
    config: ScanConfig,
    ignore: GlobSet,
    progress_tx: broadcast::Sender<ScanProgress>,
}

impl TreeWalker {
    /// Create a walker, compiling the configured ignore patterns.
    pub fn new(config: ScanConfig) -> Result<Self, ScanError> {
        let ignore = config.ignore_matcher()?;
        let (progress_tx, _) = broadcast::channel(100);
        Ok(Self {
            config,
            ignore,
            progress_tx,
        })
    }

    /// Subscribe to walk progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        self.progress_tx.subscribe()
    }

    /// Walk options in effect.
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Walk `root` through `session`, handing every record to `on_record`.
    pub fn walk<S: Session + ?Sized>(
        &self,
        session: &S,
        root: &str,
        on_record: &mut RecordCallback<'_>,
    ) -> Result<WalkReport, ScanError> {
        let start = Instant::now();
        let mut run = WalkRun {
            stats: WalkStats::new(),
            warnings: Vec::new(),
            progress: ProgressTracker::new(root),
        };
        let tracker = DirectoryTracker::new();

        let root_record = session.stat_path(root)?;
        let root_is_dir = root_record.is_directory;
        self.emit(&mut run, root_record, 0, on_record);

        let mut stack = Vec::new();
        if root_is_dir && self.config.may_descend(0) {
            if let Some(key) = session.directory_key(root) {
                tracker.enter(key, root);
            }
            let entries = session.list_directory(root)?;
            stack.push(Frame {
                path: root.to_string(),
                depth: 0,
                entries: entries.into_iter(),
            });
        }

        loop {
            let (entry, path, depth) = {
                let Some(frame) = stack.last_mut() else {
                    break;
                };
                match frame.entries.next() {
                    Some(entry) => {
                        let path = session.join(&frame.path, &entry.name);
                        (entry, path, frame.depth + 1)
                    }
                    None => {
                        stack.pop();
                        continue;
                    }
                }
            };

            if self.ignore.is_match(entry.name.as_str())
                || self.config.should_skip_hidden(&entry.name)
            {
                trace!(path = %path, "Skipping ignored entry");
                continue;
            }

            if entry.lossy_name {
                let err = ScanError::InvalidName { path: path.clone() };
                warn!(path = %path, "Skipping entry with non-UTF-8 name");
                run.warnings.push(ScanWarning::metadata(&path, &err));
                run.progress.record_error();
                continue;
            }

            let record = match session.stat_path(&path) {
                Ok(record) => record,
                Err(err) => {
                    warn!(path = %path, error = %err, "Could not read metadata");
                    run.warnings.push(ScanWarning::metadata(&path, &err));
                    run.progress.record_error();
                    continue;
                }
            };

            let is_dir = record.is_directory;
            self.emit(&mut run, record, depth, on_record);

            if !is_dir {
                continue;
            }
            if !self.config.may_descend(depth) {
                debug!(path = %path, depth, "Maximum depth reached, not descending");
                continue;
            }
            if let Some(key) = session.directory_key(&path) {
                if let Some(first) = tracker.enter(key, &path) {
                    warn!(path = %path, first = %first, "Directory already visited, not descending");
                    run.warnings.push(ScanWarning::cycle(&path));
                    continue;
                }
            }

            match session.list_directory(&path) {
                Ok(entries) => {
                    debug!(path = %path, children = entries.len(), "Entering directory");
                    stack.push(Frame {
                        path,
                        depth,
                        entries: entries.into_iter(),
                    });
                }
                Err(err) => {
                    warn!(path = %path, error = %err, "Could not list directory");
                    run.warnings.push(ScanWarning::listing(&path, &err));
                    run.progress.record_error();
                }
            }
        }

        let _ = self.progress_tx.send(run.progress.snapshot());

        Ok(WalkReport {
            root: root.to_string(),
            stats: run.stats,
            warnings: run.warnings,
            duration: start.elapsed(),
        })
    }

    fn emit(
        &self,
        run: &mut WalkRun,
        record: FileRecord,
        depth: u32,
        on_record: &mut RecordCallback<'_>,
    ) {
        run.stats.record(&record, depth);
        run.progress
            .record(&record.path, record.is_directory, record.size);

        let path = record.path.clone();
        if let Err(err) = on_record(record) {
            warn!(path = %path, error = %err, "Record callback failed");
            run.stats.record_callback_failure();
            run.warnings.push(ScanWarning::new(
                path,
                err.to_string(),
                WarningKind::CallbackFailed,
            ));
        }

        if run.progress.total_items() % self.config.progress_interval.max(1) == 0 {
            let _ = self.progress_tx.send(run.progress.snapshot());
        }
    }
}

impl Default for TreeWalker {
    fn default() -> Self {
        let (progress_tx, _) = broadcast::channel(100);
        Self {
            config: ScanConfig::default(),
            ignore: GlobSet::empty(),
            progress_tx,
        }
    }
}

/// Mutable state of a walk in progress.
struct WalkRun {
    stats: WalkStats,
    warnings: Vec<ScanWarning>,
    progress: ProgressTracker,
}

#[cfg(test)]
mod tests {
    use super::*;
    use omnifile_core::Protocol;
    use std::collections::{HashMap, HashSet};

    /// In-memory tree: directory path -> children (name, is_dir, size).
    struct MemorySession {
        dirs: HashMap<String, Vec<(&'static str, bool, u64)>>,
        broken_stat: HashSet<String>,
        broken_list: HashSet<String>,
    }

    impl MemorySession {
        fn new() -> Self {
            let mut dirs = HashMap::new();
            dirs.insert(
                "/r".to_string(),
                vec![("b", true, 0), ("a.txt", false, 10), ("z", true, 0)],
            );
            dirs.insert("/r/b".to_string(), vec![("c.txt", false, 5), ("d", true, 0)]);
            dirs.insert("/r/b/d".to_string(), vec![("e.txt", false, 1)]);
            dirs.insert("/r/z".to_string(), vec![(".hidden", false, 2)]);
            Self {
                dirs,
                broken_stat: HashSet::new(),
                broken_list: HashSet::new(),
            }
        }
    }

    impl Session for MemorySession {
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
            if self.broken_list.contains(path) {
                return Err(ScanError::PermissionDenied { path: path.into() });
            }
            Ok(self.dirs[path]
                .iter()
                .map(|(name, is_dir, size)| DirEntry::new(*name, *is_dir, *size))
                .collect())
        }

        fn stat_path(&self, path: &str) -> Result<FileRecord, ScanError> {
            if self.broken_stat.contains(path) {
                return Err(ScanError::NotFound { path: path.into() });
            }
            let is_dir = self.dirs.contains_key(path);
            let size = self
                .dirs
                .values()
                .flatten()
                .find(|(name, _, _)| path.ends_with(&format!("/{name}")))
                .map(|(_, _, size)| *size)
                .unwrap_or(0);
            Ok(FileRecord::new(path, Protocol::Local, is_dir).with_size(size))
        }
    }

    fn collect(walker: &TreeWalker, session: &MemorySession) -> (Vec<String>, WalkReport) {
        let mut seen = Vec::new();
        let report = walker
            .walk(session, "/r", &mut |record: FileRecord| {
                seen.push(record.path);
                Ok(())
            })
            .unwrap();
        (seen, report)
    }

    #[test]
    fn test_depth_first_listing_order() {
        let (seen, report) = collect(&TreeWalker::default(), &MemorySession::new());
        assert_eq!(
            seen,
            vec![
                "/r", "/r/b", "/r/b/c.txt", "/r/b/d", "/r/b/d/e.txt", "/r/a.txt", "/r/z",
                "/r/z/.hidden",
            ]
        );
        assert_eq!(report.stats.directories, 4);
        assert_eq!(report.stats.files, 4);
        assert_eq!(report.stats.total_size, 18);
        assert_eq!(report.stats.max_depth, 3);
        assert!(!report.has_warnings());
    }

    #[test]
    fn test_walk_is_reproducible() {
        let session = MemorySession::new();
        let walker = TreeWalker::default();
        assert_eq!(collect(&walker, &session).0, collect(&walker, &session).0);
    }

    #[test]
    fn test_listing_failure_skips_only_that_subtree() {
        let mut session = MemorySession::new();
        session.broken_list.insert("/r/b".to_string());

        let (seen, report) = collect(&TreeWalker::default(), &session);
        assert_eq!(seen, vec!["/r", "/r/b", "/r/a.txt", "/r/z", "/r/z/.hidden"]);
        assert_eq!(report.node_errors(), 1);
        assert_eq!(report.warnings[0].path, "/r/b");
        assert_eq!(report.warnings[0].kind, WarningKind::PermissionDenied);
    }

    #[test]
    fn test_stat_failure_skips_node() {
        let mut session = MemorySession::new();
        session.broken_stat.insert("/r/a.txt".to_string());

        let (seen, report) = collect(&TreeWalker::default(), &session);
        assert!(!seen.contains(&"/r/a.txt".to_string()));
        assert!(seen.contains(&"/r/z".to_string()));
        assert_eq!(report.node_errors(), 1);
        assert_eq!(report.warnings[0].kind, WarningKind::NotFound);
    }

    #[test]
    fn test_root_failure_aborts() {
        let mut session = MemorySession::new();
        session.broken_stat.insert("/r".to_string());

        let result = TreeWalker::default().walk(&session, "/r", &mut |_| Ok(()));
        assert!(matches!(result, Err(ScanError::NotFound { .. })));
    }

    #[test]
    fn test_callback_failure_does_not_stop_walk() {
        let session = MemorySession::new();
        let mut calls = 0;
        let report = TreeWalker::default()
            .walk(&session, "/r", &mut |record: FileRecord| {
                calls += 1;
                if record.path == "/r/b" {
                    Err(ScanError::Store {
                        message: "disk full".into(),
                    })
                } else {
                    Ok(())
                }
            })
            .unwrap();

        assert_eq!(calls, 8);
        assert_eq!(report.stats.callback_failures, 1);
        assert_eq!(report.node_errors(), 0);
        assert_eq!(report.warnings[0].kind, WarningKind::CallbackFailed);
    }

    #[test]
    fn test_max_depth_guard() {
        let config = ScanConfig::builder().max_depth(Some(1u32)).build().unwrap();
        let walker = TreeWalker::new(config).unwrap();

        let (seen, report) = collect(&walker, &MemorySession::new());
        assert_eq!(seen, vec!["/r", "/r/b", "/r/a.txt", "/r/z"]);
        assert_eq!(report.stats.max_depth, 1);
    }

    #[test]
    fn test_ignore_and_hidden_filters() {
        let config = ScanConfig::builder()
            .ignore_patterns(vec!["*.txt".to_string()])
            .include_hidden(false)
            .build()
            .unwrap();
        let walker = TreeWalker::new(config).unwrap();

        let (seen, _) = collect(&walker, &MemorySession::new());
        assert_eq!(seen, vec!["/r", "/r/b", "/r/b/d", "/r/z"]);
    }

    #[test]
    fn test_progress_is_broadcast() {
        let config = ScanConfig::builder().progress_interval(2u64).build().unwrap();
        let walker = TreeWalker::new(config).unwrap();
        let mut rx = walker.subscribe();

        collect(&walker, &MemorySession::new());

        let mut last = None;
        while let Ok(progress) = rx.try_recv() {
            last = Some(progress);
        }
        let last = last.unwrap();
        assert_eq!(last.total_items(), 8);
        assert_eq!(last.root, "/r");
    }
}
