//! The metadata store interface.

use std::collections::BTreeMap;
use std::path::PathBuf;

use thiserror::Error;

use omnifile_core::{FileRecord, ProtocolStats, ScanError};

/// Errors raised by a [`MetadataStore`].
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A record with the same path is already stored.
    #[error("Record already exists: {path}")]
    DuplicateKey { path: String },

    /// Failed to create or open the database file
    #[error("Failed to open store at '{path}': {reason}")]
    Open { path: PathBuf, reason: String },

    /// A stored row could not be turned back into a record.
    #[error("Corrupt record '{path}': {reason}")]
    Corrupt { path: String, reason: String },

    /// Another thread panicked while holding the store.
    #[error("Store lock poisoned")]
    Poisoned,
}

impl From<StoreError> for ScanError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateKey { path } => ScanError::DuplicateKey { path },
            other => ScanError::Store {
                message: other.to_string(),
            },
        }
    }
}

/// Record collection keyed by `path`.
///
/// Implementations are shared between concurrently scanned targets, so
/// every method takes `&self`.
pub trait MetadataStore: Send + Sync {
    /// Number of stored records.
    fn count_all(&self) -> Result<u64, StoreError>;

    /// The record stored under `path`, if any.
    fn find_by_path(&self, path: &str) -> Result<Option<FileRecord>, StoreError>;

    /// Insert a record. Fails with [`StoreError::DuplicateKey`] when the
    /// unique path index rejects it.
    fn insert_one(&self, record: &FileRecord) -> Result<(), StoreError>;

    /// Delete every record, returning how many were removed.
    fn delete_all(&self) -> Result<u64, StoreError>;

    /// Create the unique index on `path`. Idempotent.
    fn create_unique_index_on_path(&self) -> Result<(), StoreError>;

    /// The record with the greatest `read_at`.
    fn find_most_recent(&self) -> Result<Option<FileRecord>, StoreError>;

    /// File count, directory count and size sum grouped by protocol.
    fn aggregate_by_protocol(&self) -> Result<BTreeMap<String, ProtocolStats>, StoreError>;

    /// Delete records without a path and all but the first record of each
    /// path, returning how many were removed.
    fn remove_duplicates(&self) -> Result<u64, StoreError>;
}
