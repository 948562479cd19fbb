//! Incremental metadata indexing for omnifile.
//!
//! # Overview
//!
//! `omnifile-index` persists the records produced by `omnifile-scan`:
//!
//! - **Metadata store** behind the [`MetadataStore`] trait, with a SQLite
//!   implementation ([`SqliteStore`])
//! - **Path-deduplicated indexing** ([`Indexer`]): each path is stored at
//!   most once, later observations are skipped
//! - **Run orchestration** ([`ScanOrchestrator`]) over the local root and
//!   the configured remote connections, isolating failures per target
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use omnifile_core::AppConfig;
//! use omnifile_index::{
//!     HostIdentity, Indexer, ScanMode, ScanOrchestrator, SqliteStore, StartMode,
//! };
//!
//! let config = AppConfig::default();
//! let store = Arc::new(SqliteStore::open(&config.store_path).unwrap());
//! let indexer = Arc::new(Indexer::new(store, HostIdentity::detect()));
//! let orchestrator = ScanOrchestrator::new(config, indexer).unwrap();
//!
//! let report = orchestrator.run(ScanMode::Full, StartMode::Resume).unwrap();
//! println!("Inserted {} records", report.summary.inserted);
//! ```

mod identity;
mod indexer;
mod orchestrator;
mod sqlite;
mod store;

pub use identity::HostIdentity;
pub use indexer::{IndexOutcome, IndexSummary, Indexer};
pub use orchestrator::{
    RunReport, ScanMode, ScanOrchestrator, SessionFactory, StartMode, TargetReport,
};
pub use sqlite::SqliteStore;
pub use store::{MetadataStore, StoreError};
