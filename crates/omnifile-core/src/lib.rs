//! Core types and configuration for omnifile.
//!
//! This crate provides the data structures shared by every part of the
//! omnifile workspace: the per-entry metadata record, connection
//! descriptors, configuration, aggregate statistics and the error taxonomy.

mod config;
mod connection;
mod error;
mod protocol;
mod record;
mod stats;

pub use config::{AppConfig, ScanConfig, ScanConfigBuilder, ScanConfigBuilderError};
pub use connection::ConnectionDescriptor;
pub use error::{ScanError, ScanWarning, WarningKind};
pub use protocol::Protocol;
pub use record::{FileRecord, Timestamps, extension_of, file_name};
pub use stats::{ProtocolStats, WalkStats};
