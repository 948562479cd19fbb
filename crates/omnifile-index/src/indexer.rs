//! Incremental, path-deduplicated indexing.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info};

use omnifile_core::{FileRecord, ProtocolStats, ScanError};

use crate::identity::HostIdentity;
use crate::store::{MetadataStore, StoreError};

/// What happened to one record handed to [`Indexer::index_record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    /// The record was new and has been stored.
    Inserted,
    /// A record with the same path was already stored.
    Skipped,
}

/// Running totals of an indexer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexSummary {
    pub inserted: u64,
    pub skipped: u64,
    pub failed: u64,
}

impl IndexSummary {
    /// Count one outcome.
    pub fn record(&mut self, outcome: &Result<IndexOutcome, ScanError>) {
        match outcome {
            Ok(IndexOutcome::Inserted) => self.inserted += 1,
            Ok(IndexOutcome::Skipped) => self.skipped += 1,
            Err(_) => self.failed += 1,
        }
    }

    /// Records handed to the indexer.
    pub fn total(&self) -> u64 {
        self.inserted + self.skipped + self.failed
    }
}

/// Persists records at most once per path.
///
/// Records are never updated: a path already in the store is skipped. The
/// existence check and the insert are separate store calls, so two indexers
/// racing on one path both pass the check; the unique path index then
/// rejects the loser, which is counted as a skip.
pub struct Indexer {
    store: Arc<dyn MetadataStore>,
    identity: HostIdentity,
    inserted: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
}

impl Indexer {
    /// Create an indexer stamping records with `identity`.
    pub fn new(store: Arc<dyn MetadataStore>, identity: HostIdentity) -> Self {
        Self {
            store,
            identity,
            inserted: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn MetadataStore> {
        &self.store
    }

    /// The identity stamped onto records.
    pub fn identity(&self) -> &HostIdentity {
        &self.identity
    }

    /// Verify the store answers, returning its record count.
    ///
    /// Fails with [`ScanError::StoreUnavailable`]; callers must not scan
    /// anything after such a failure.
    pub fn self_check(&self) -> Result<u64, ScanError> {
        match self.store.count_all() {
            Ok(count) => {
                info!(records = count, "Store self-check passed");
                Ok(count)
            }
            Err(err) => {
                error!(error = %err, "Store self-check failed");
                Err(ScanError::StoreUnavailable {
                    message: err.to_string(),
                })
            }
        }
    }

    /// Establish the unique path index. Safe to call on every run.
    pub fn ensure_unique_index(&self) -> Result<(), ScanError> {
        self.store.create_unique_index_on_path()?;
        info!("Unique path index ensured");
        Ok(())
    }

    /// The record observed most recently, for reporting where a resumed
    /// run picks up. Does not influence which records get inserted.
    pub fn most_recent_record(&self) -> Result<Option<FileRecord>, ScanError> {
        Ok(self.store.find_most_recent()?)
    }

    /// Delete every stored record.
    pub fn truncate(&self) -> Result<u64, ScanError> {
        let removed = self.store.delete_all()?;
        info!(removed, "Store truncated");
        Ok(removed)
    }

    /// Enrich `record` and store it unless its path is already indexed.
    pub fn index_record(&self, mut record: FileRecord) -> Result<IndexOutcome, ScanError> {
        self.identity.apply(&mut record);
        record.read_at = Some(Utc::now());

        let outcome = self.insert_if_absent(&record);
        let counter = match &outcome {
            Ok(IndexOutcome::Inserted) => &self.inserted,
            Ok(IndexOutcome::Skipped) => &self.skipped,
            Err(err) => {
                error!(path = %record.path, error = %err, "Failed to index record");
                &self.failed
            }
        };
        counter.fetch_add(1, Ordering::Relaxed);
        outcome
    }

    fn insert_if_absent(&self, record: &FileRecord) -> Result<IndexOutcome, ScanError> {
        if self.store.find_by_path(&record.path)?.is_some() {
            info!(path = %record.path, "Already indexed, skipping");
            return Ok(IndexOutcome::Skipped);
        }

        match self.store.insert_one(record) {
            Ok(()) => {
                debug!(path = %record.path, "Indexed");
                Ok(IndexOutcome::Inserted)
            }
            Err(StoreError::DuplicateKey { path }) => {
                info!(path = %path, "Indexed concurrently, skipping");
                Ok(IndexOutcome::Skipped)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Per-protocol statistics over the current store contents.
    pub fn compute_protocol_stats(&self) -> Result<BTreeMap<String, ProtocolStats>, ScanError> {
        Ok(self.store.aggregate_by_protocol()?)
    }

    /// Remove records without a path and repeated paths.
    pub fn remove_duplicates(&self) -> Result<u64, ScanError> {
        let removed = self.store.remove_duplicates()?;
        info!(removed, "Duplicate records removed");
        Ok(removed)
    }

    /// Totals since this indexer was created.
    pub fn summary(&self) -> IndexSummary {
        IndexSummary {
            inserted: self.inserted.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}
