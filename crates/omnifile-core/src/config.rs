//! Scan and application configuration.

use std::path::{Path, PathBuf};

use derive_builder::Builder;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::connection::ConnectionDescriptor;
use crate::error::ScanError;

/// Configuration for walking a single target.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ScanConfig {
    /// Follow symbolic links into directories (local targets only).
    #[builder(default = "false")]
    #[serde(default)]
    pub follow_symlinks: bool,

    /// Maximum depth to descend (None = unlimited). The root is depth 0.
    #[builder(default)]
    #[serde(default)]
    pub max_depth: Option<u32>,

    /// Entry names to skip, in glob syntax.
    #[builder(default)]
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Include hidden entries (names starting with `.`).
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub include_hidden: bool,

    /// Records between progress broadcasts.
    #[builder(default = "1000")]
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,
}

fn default_true() -> bool {
    true
}

fn default_progress_interval() -> u64 {
    1000
}

impl ScanConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(ref patterns) = self.ignore_patterns {
            for pattern in patterns {
                Glob::new(pattern).map_err(|e| format!("Invalid ignore pattern {pattern:?}: {e}"))?;
            }
        }
        if self.progress_interval == Some(0) {
            return Err("Progress interval must be at least 1".to_string());
        }
        Ok(())
    }
}

impl ScanConfig {
    /// Create a new scan config builder.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::default()
    }

    /// Compile the ignore patterns.
    pub fn ignore_matcher(&self) -> Result<GlobSet, ScanError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.ignore_patterns {
            let glob = Glob::new(pattern).map_err(|e| ScanError::InvalidConfig {
                message: format!("invalid ignore pattern {pattern:?}: {e}"),
            })?;
            builder.add(glob);
        }
        builder.build().map_err(|e| ScanError::InvalidConfig {
            message: e.to_string(),
        })
    }

    /// Check if hidden entries should be skipped.
    pub fn should_skip_hidden(&self, name: &str) -> bool {
        !self.include_hidden && name.starts_with('.')
    }

    /// Check if a directory at `depth` may be descended into.
    pub fn may_descend(&self, depth: u32) -> bool {
        self.max_depth.is_none_or(|max| depth < max)
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            follow_symlinks: false,
            max_depth: None,
            ignore_patterns: Vec::new(),
            include_hidden: true,
            progress_interval: default_progress_interval(),
        }
    }
}

/// Process-wide configuration.
///
/// Loaded from TOML and then overridden from `OMNIFILE_*` environment
/// variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// SQLite database holding the records.
    pub store_path: PathBuf,

    /// Local tree to scan.
    pub root_dir: PathBuf,

    /// Log filter used when `RUST_LOG` is not set.
    pub log_level: String,

    /// Action when no subcommand is given: `scan`, `status` or `remote`.
    pub default_action: String,

    /// Scan enabled remote connections during a full scan.
    pub enable_remote_scanning: bool,

    /// Connection timeout for descriptors that do not set their own.
    pub remote_scan_timeout_ms: u64,

    /// Remote connections scanned at the same time.
    pub max_concurrent_connections: usize,

    /// Walk options applied to every target.
    pub scan: ScanConfig,

    /// Remote endpoints, scanned in this order.
    pub connections: Vec<ConnectionDescriptor>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store_path: default_data_dir().join("omnifile.db"),
            root_dir: dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")),
            log_level: "info".to_string(),
            default_action: "scan".to_string(),
            enable_remote_scanning: false,
            remote_scan_timeout_ms: 30_000,
            max_concurrent_connections: 1,
            scan: ScanConfig::default(),
            connections: Vec::new(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("omnifile")
}

impl AppConfig {
    /// Default location of the configuration file.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("omnifile").join("config.toml"))
    }

    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, the default location is
    /// used when present and built-in defaults otherwise. Environment
    /// overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self, ScanError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.is_file()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ScanError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ScanError::io(path.display().to_string(), e))?;
        Self::from_toml(&content)
    }

    /// Parse TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ScanError> {
        toml::from_str(content).map_err(|e| ScanError::InvalidConfig {
            message: e.to_string(),
        })
    }

    /// Apply `OMNIFILE_*` overrides read through `lookup`.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ScanError> {
        if let Some(value) = lookup("OMNIFILE_STORE_PATH") {
            self.store_path = PathBuf::from(value);
        }
        if let Some(value) = lookup("OMNIFILE_ROOT_DIR") {
            self.root_dir = PathBuf::from(value);
        }
        if let Some(value) = lookup("OMNIFILE_LOG_LEVEL") {
            self.log_level = value;
        }
        if let Some(value) = lookup("OMNIFILE_ENABLE_REMOTE") {
            self.enable_remote_scanning = parse_env("OMNIFILE_ENABLE_REMOTE", &value)?;
        }
        if let Some(value) = lookup("OMNIFILE_MAX_CONCURRENT") {
            self.max_concurrent_connections = parse_env("OMNIFILE_MAX_CONCURRENT", &value)?;
        }
        Ok(())
    }

    /// Reject values no run can work with.
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.root_dir.as_os_str().is_empty() {
            return Err(ScanError::InvalidConfig {
                message: "root_dir cannot be empty".to_string(),
            });
        }
        if self.max_concurrent_connections == 0 {
            return Err(ScanError::InvalidConfig {
                message: "max_concurrent_connections must be at least 1".to_string(),
            });
        }
        self.scan.ignore_matcher()?;
        Ok(())
    }

    /// Enabled connections in configuration order.
    pub fn enabled_connections(&self) -> impl Iterator<Item = &ConnectionDescriptor> {
        self.connections.iter().filter(|c| c.enabled)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ScanError> {
    value.trim().parse().map_err(|_| ScanError::InvalidConfig {
        message: format!("{key} has an invalid value: {value:?}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_config_builder() {
        let config = ScanConfig::builder()
            .max_depth(Some(4u32))
            .follow_symlinks(true)
            .build()
            .unwrap();

        assert_eq!(config.max_depth, Some(4));
        assert!(config.follow_symlinks);
        assert!(config.include_hidden);
        assert_eq!(config.progress_interval, 1000);
    }

    #[test]
    fn test_builder_rejects_bad_glob() {
        let result = ScanConfig::builder()
            .ignore_patterns(vec!["[unclosed".to_string()])
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_ignore_matcher() {
        let config = ScanConfig::builder()
            .ignore_patterns(vec!["node_modules".to_string(), "*.log".to_string()])
            .build()
            .unwrap();
        let matcher = config.ignore_matcher().unwrap();

        assert!(matcher.is_match("node_modules"));
        assert!(matcher.is_match("test.log"));
        assert!(!matcher.is_match("src"));
    }

    #[test]
    fn test_should_skip_hidden() {
        let mut config = ScanConfig::default();
        assert!(!config.should_skip_hidden(".git"));

        config.include_hidden = false;
        assert!(config.should_skip_hidden(".git"));
        assert!(!config.should_skip_hidden("src"));
    }

    #[test]
    fn test_may_descend() {
        let mut config = ScanConfig::default();
        assert!(config.may_descend(10_000));

        config.max_depth = Some(1);
        assert!(config.may_descend(0));
        assert!(!config.may_descend(1));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("OMNIFILE_ROOT_DIR", "/srv/data"),
            ("OMNIFILE_ENABLE_REMOTE", "true"),
            ("OMNIFILE_MAX_CONCURRENT", "3"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config
            .apply_env(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.root_dir, PathBuf::from("/srv/data"));
        assert!(config.enable_remote_scanning);
        assert_eq!(config.max_concurrent_connections, 3);
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env(|key| (key == "OMNIFILE_MAX_CONCURRENT").then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, ScanError::InvalidConfig { .. }));
    }
}
