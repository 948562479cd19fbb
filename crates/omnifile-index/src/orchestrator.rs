//! Drives one indexing run across the local root and remote connections.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use serde::Serialize;
use strum::{Display, EnumString};
use tracing::{error, info, warn};

use omnifile_core::{AppConfig, ConnectionDescriptor, FileRecord, ProtocolStats, ScanError};
use omnifile_scan::{LocalSession, Session, TreeWalker, open_session_with};

use crate::indexer::{IndexSummary, Indexer};

/// What a run does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ScanMode {
    /// Local root, then enabled connections when remote scanning is on.
    #[strum(serialize = "scan")]
    #[serde(rename = "scan")]
    Full,
    /// Report store contents without scanning.
    #[strum(serialize = "status")]
    #[serde(rename = "status")]
    StatusOnly,
    /// Enabled connections only.
    #[strum(serialize = "remote")]
    #[serde(rename = "remote")]
    RemoteOnly,
}

/// How a scanning run treats records already in the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StartMode {
    /// Keep stored records; known paths are skipped.
    #[default]
    Resume,
    /// Delete every stored record first.
    Truncate,
}

/// Builds the session for a remote connection.
pub type SessionFactory =
    dyn Fn(&ConnectionDescriptor, u64) -> Result<Box<dyn Session + Send>, ScanError> + Send + Sync;

/// Outcome of scanning one target.
#[derive(Debug, Clone, Serialize)]
pub struct TargetReport {
    /// `local:<root>` or `protocol://user@host:port`.
    pub label: String,
    /// Configured protocol name.
    pub protocol: String,
    /// Records the walk emitted.
    pub records: u64,
    pub inserted: u64,
    pub skipped: u64,
    pub failed: u64,
    /// Nodes skipped because they could not be read.
    pub node_errors: usize,
    pub duration_ms: u64,
    /// Why the target was abandoned, if it was.
    pub error: Option<String>,
}

impl TargetReport {
    fn new(label: impl Into<String>, protocol: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            protocol: protocol.into(),
            records: 0,
            inserted: 0,
            skipped: 0,
            failed: 0,
            node_errors: 0,
            duration_ms: 0,
            error: None,
        }
    }

    /// Check if the target was scanned to completion.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub mode: ScanMode,
    pub start: StartMode,
    /// Records in the store when the run began.
    pub records_before: u64,
    /// Most recently observed record when the run began.
    pub most_recent: Option<FileRecord>,
    /// Records removed by truncation.
    pub truncated: u64,
    /// Targets in the order they were scanned.
    pub targets: Vec<TargetReport>,
    /// Per-protocol statistics after the run.
    pub stats: BTreeMap<String, ProtocolStats>,
    /// Indexing totals over all targets.
    pub summary: IndexSummary,
    pub duration_ms: u64,
}

impl RunReport {
    /// Targets that could not be scanned.
    pub fn failed_targets(&self) -> impl Iterator<Item = &TargetReport> {
        self.targets.iter().filter(|t| !t.is_success())
    }
}

/// Scans every configured target through the indexer.
///
/// The local root is always scanned to completion before any remote
/// connection starts, and a failing target never stops the others. Remote
/// connections run in configuration order, or on a pool of
/// `max_concurrent_connections` threads when that is above 1.
pub struct ScanOrchestrator {
    config: AppConfig,
    indexer: Arc<Indexer>,
    walker: TreeWalker,
    session_factory: Box<SessionFactory>,
}

impl ScanOrchestrator {
    /// Create an orchestrator using the built-in session adapters.
    pub fn new(config: AppConfig, indexer: Arc<Indexer>) -> Result<Self, ScanError> {
        let walker = TreeWalker::new(config.scan.clone())?;
        let follow_symlinks = config.scan.follow_symlinks;
        Ok(Self {
            config,
            indexer,
            walker,
            session_factory: Box::new(move |descriptor: &ConnectionDescriptor, timeout_ms: u64| {
                open_session_with(descriptor, timeout_ms, follow_symlinks)
            }),
        })
    }

    /// Replace the factory used to build remote sessions.
    pub fn with_session_factory(
        mut self,
        factory: impl Fn(&ConnectionDescriptor, u64) -> Result<Box<dyn Session + Send>, ScanError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.session_factory = Box::new(factory);
        self
    }

    /// The walker shared by every target, for progress subscriptions.
    pub fn walker(&self) -> &TreeWalker {
        &self.walker
    }

    /// The indexer records go through.
    pub fn indexer(&self) -> &Arc<Indexer> {
        &self.indexer
    }

    /// Execute one run.
    ///
    /// Target failures are reported in the [`RunReport`]. An error is
    /// returned only when the store is unreachable or a requested
    /// truncation fails, both before anything is scanned.
    pub fn run(&self, mode: ScanMode, start: StartMode) -> Result<RunReport, ScanError> {
        let started = Instant::now();
        let records_before = self.indexer.self_check()?;
        let summary_before = self.indexer.summary();

        let mut report = RunReport {
            mode,
            start,
            records_before,
            most_recent: None,
            truncated: 0,
            targets: Vec::new(),
            stats: BTreeMap::new(),
            summary: IndexSummary::default(),
            duration_ms: 0,
        };

        match self.indexer.most_recent_record() {
            Ok(Some(record)) => {
                info!(
                    path = %record.path,
                    read_at = ?record.read_at,
                    "Most recent indexed record"
                );
                report.most_recent = Some(record);
            }
            Ok(None) => info!("Store holds no records, starting fresh"),
            Err(err) => warn!(error = %err, "Could not read the most recent record"),
        }

        if mode != ScanMode::StatusOnly {
            if start == StartMode::Truncate {
                report.truncated = self.indexer.truncate()?;
            }
            if let Err(err) = self.indexer.ensure_unique_index() {
                warn!(error = %err, "Could not create unique path index, run `omnifile dedupe`");
            }
        }

        if mode == ScanMode::Full {
            report.targets.push(self.scan_local(&self.config.root_dir));
        }
        if mode == ScanMode::RemoteOnly
            || (mode == ScanMode::Full && self.config.enable_remote_scanning)
        {
            report.targets.extend(self.scan_remotes());
        }

        report.stats = self.protocol_stats();
        let summary = self.indexer.summary();
        report.summary = IndexSummary {
            inserted: summary.inserted - summary_before.inserted,
            skipped: summary.skipped - summary_before.skipped,
            failed: summary.failed - summary_before.failed,
        };
        report.duration_ms = elapsed_ms(started);
        Ok(report)
    }

    fn scan_local(&self, root: &Path) -> TargetReport {
        let root = match std::fs::canonicalize(root) {
            Ok(path) => path.to_string_lossy().to_string(),
            Err(err) => {
                let root = root.display().to_string();
                error!(root = %root, error = %err, "Local root is not accessible");
                let mut report = TargetReport::new(format!("local:{root}"), "local");
                report.error = Some(ScanError::io(root, err).to_string());
                return report;
            }
        };

        let mut session = LocalSession::new().with_follow_symlinks(self.config.scan.follow_symlinks);
        self.scan_target(format!("local:{root}"), "local", &mut session, &root)
    }

    fn scan_remotes(&self) -> Vec<TargetReport> {
        let connections: Vec<&ConnectionDescriptor> = self.config.enabled_connections().collect();
        if connections.is_empty() {
            info!("No enabled remote connections");
            return Vec::new();
        }

        let threads = self.config.max_concurrent_connections.min(connections.len());
        if threads > 1 {
            match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
                Ok(pool) => {
                    info!(connections = connections.len(), threads, "Scanning remote connections concurrently");
                    return pool.install(|| {
                        connections
                            .par_iter()
                            .map(|conn| self.scan_remote(conn))
                            .collect()
                    });
                }
                Err(err) => {
                    warn!(error = %err, "Could not start connection pool, scanning sequentially");
                }
            }
        }

        connections
            .into_iter()
            .map(|conn| self.scan_remote(conn))
            .collect()
    }

    fn scan_remote(&self, descriptor: &ConnectionDescriptor) -> TargetReport {
        let label = descriptor.target_label();
        match (self.session_factory)(descriptor, self.config.remote_scan_timeout_ms) {
            Ok(mut session) => {
                self.scan_target(label, &descriptor.protocol, &mut *session, &descriptor.root_path)
            }
            Err(err) => {
                error!(target = %label, error = %err, "No session for connection");
                let mut report = TargetReport::new(label, descriptor.protocol.as_str());
                report.error = Some(err.to_string());
                report
            }
        }
    }

    /// Connect, walk `root` through the indexer, disconnect.
    fn scan_target(
        &self,
        label: String,
        protocol: &str,
        session: &mut dyn Session,
        root: &str,
    ) -> TargetReport {
        let started = Instant::now();
        let mut report = TargetReport::new(label, protocol);

        if let Err(err) = session.connect() {
            error!(target = %report.label, error = %err, "Connection failed");
            report.error = Some(err.to_string());
            report.duration_ms = elapsed_ms(started);
            return report;
        }
        info!(target = %report.label, root = %root, "Scanning target");

        let mut counts = IndexSummary::default();
        let result = session.scan_directory(root, &self.walker, &mut |record| {
            let outcome = self.indexer.index_record(record);
            counts.record(&outcome);
            outcome.map(|_| ())
        });

        match result {
            Ok(walk) => {
                report.records = walk.stats.records_emitted;
                report.node_errors = walk.node_errors();
                info!(
                    target = %report.label,
                    records = walk.stats.records_emitted,
                    inserted = counts.inserted,
                    skipped = counts.skipped,
                    node_errors = report.node_errors,
                    "Target scanned"
                );
            }
            Err(err) => {
                error!(target = %report.label, error = %err, "Scan aborted");
                report.error = Some(err.to_string());
            }
        }
        report.inserted = counts.inserted;
        report.skipped = counts.skipped;
        report.failed = counts.failed;

        match session.disconnect() {
            Ok(()) => info!(target = %report.label, "Disconnected"),
            Err(err) => warn!(target = %report.label, error = %err, "Disconnect failed"),
        }

        report.duration_ms = elapsed_ms(started);
        report
    }

    fn protocol_stats(&self) -> BTreeMap<String, ProtocolStats> {
        match self.indexer.compute_protocol_stats() {
            Ok(stats) => {
                for (protocol, entry) in &stats {
                    info!(
                        protocol = %protocol,
                        files = entry.files,
                        directories = entry.directories,
                        total_size = entry.total_size,
                        "Protocol statistics"
                    );
                }
                stats
            }
            Err(err) => {
                error!(error = %err, "Could not compute protocol statistics");
                BTreeMap::new()
            }
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_mode_parsing() {
        assert_eq!("scan".parse::<ScanMode>().unwrap(), ScanMode::Full);
        assert_eq!("STATUS".parse::<ScanMode>().unwrap(), ScanMode::StatusOnly);
        assert_eq!("remote".parse::<ScanMode>().unwrap(), ScanMode::RemoteOnly);
        assert!("explore".parse::<ScanMode>().is_err());
        assert_eq!(ScanMode::StatusOnly.to_string(), "status");
        assert_eq!(StartMode::default(), StartMode::Resume);
    }
}
