//! Protocol sessions and tree walking for omnifile.
//!
//! # Overview
//!
//! `omnifile-scan` knows how to reach a target and how to traverse it:
//!
//! - **Sessions** implement one small capability set ([`Session`]) per
//!   protocol: the local filesystem, SSH/SFTP, and fail-fast stubs for
//!   FTP and Telnet
//! - **Tree walking** is protocol-agnostic ([`TreeWalker`]), depth-first in
//!   listing order, and skips unreadable nodes instead of aborting
//! - **Progress updates** via broadcast channels
//! - **Cycle detection** for sessions that can identify directories
//!
//! # Example
//!
//! ```rust,no_run
//! use omnifile_scan::{LocalSession, Session, TreeWalker};
//!
//! let walker = TreeWalker::default();
//! let session = LocalSession::new();
//! let report = session
//!     .scan_directory("/path/to/scan", &walker, &mut |record| {
//!         println!("{}", record.path);
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! println!("Total size: {} bytes", report.stats.total_size);
//! println!("Skipped nodes: {}", report.node_errors());
//! ```
//!
//! # Progress Monitoring
//!
//! Subscribe to progress updates:
//!
//! ```rust,no_run
//! use omnifile_scan::TreeWalker;
//!
//! let walker = TreeWalker::default();
//! let mut progress_rx = walker.subscribe();
//!
//! std::thread::spawn(move || {
//!     while let Ok(progress) = progress_rx.blocking_recv() {
//!         println!("Scanned {} files", progress.files_scanned);
//!     }
//! });
//! ```

mod local;
mod progress;
mod session;
#[cfg(feature = "ssh")]
mod sftp;
mod stub;
mod tracker;
mod walker;

pub use local::LocalSession;
pub use progress::ScanProgress;
pub use session::{DirEntry, DirKey, RecordCallback, Session};
#[cfg(feature = "ssh")]
pub use sftp::{SftpSession, format_mode};
pub use stub::{UnsupportedSession, open_session, open_session_with};
pub use tracker::DirectoryTracker;
pub use walker::{TreeWalker, WalkReport};

// Re-export core types for convenience
pub use omnifile_core::{
    ConnectionDescriptor, FileRecord, Protocol, ScanConfig, ScanError, ScanWarning, Timestamps,
    WalkStats, WarningKind,
};
