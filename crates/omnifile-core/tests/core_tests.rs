use omnifile_core::{
    AppConfig, ConnectionDescriptor, FileRecord, Protocol, ProtocolStats, ScanConfig, ScanError,
    Timestamps,
};
use std::path::PathBuf;

#[test]
fn test_record_serializes_with_camel_case_keys() {
    let record = FileRecord::new("/data/report.pdf", Protocol::Local, false)
        .with_size(2048)
        .with_timestamps(Timestamps::from_unix(Some(1_600_000_000), Some(1_600_000_100)));

    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["isDirectory"], false);
    assert_eq!(json["protocol"], "local");
    assert_eq!(json["extension"], ".pdf");
    assert_eq!(json["size"], 2048);
    assert!(json.get("modifiedAt").is_some());

    let back: FileRecord = serde_json::from_value(json).unwrap();
    assert_eq!(back, record);
}

#[test]
fn test_record_extension_and_name() {
    let record = FileRecord::new("/home/u/.config/app.toml", Protocol::Local, false);
    assert_eq!(record.name.as_str(), "app.toml");
    assert_eq!(record.extension.as_str(), ".toml");
    assert!(!record.is_remote());

    let remote = FileRecord::new("ssh://u@h:22/etc/hosts", Protocol::Ssh, false);
    assert_eq!(remote.name.as_str(), "hosts");
    assert!(remote.is_remote());
}

#[test]
fn test_protocol_stats_accumulate() {
    let mut stats = ProtocolStats::default();
    for size in [10, 5] {
        stats.record(false, size);
    }
    stats.record(true, 0);
    stats.record(true, 0);

    assert_eq!(stats.files, 2);
    assert_eq!(stats.directories, 2);
    assert_eq!(stats.total_size, 15);
}

#[test]
fn test_app_config_from_toml() {
    let config = AppConfig::from_toml(
        r#"
        store_path = "/var/lib/omnifile/records.db"
        root_dir = "/srv"
        enable_remote_scanning = true
        max_concurrent_connections = 2

        [scan]
        max_depth = 12
        ignore_patterns = ["*.tmp"]

        [[connections]]
        host = "files.example.org"
        username = "backup"
        password = "secret"
        protocol = "ssh"
        root_path = "/exports"
        enabled = true

        [[connections]]
        host = "legacy.example.org"
        username = "anon"
        protocol = "ftp"
        "#,
    )
    .unwrap();

    assert_eq!(config.store_path, PathBuf::from("/var/lib/omnifile/records.db"));
    assert_eq!(config.root_dir, PathBuf::from("/srv"));
    assert!(config.enable_remote_scanning);
    assert_eq!(config.max_concurrent_connections, 2);
    assert_eq!(config.remote_scan_timeout_ms, 30_000);
    assert_eq!(config.scan.max_depth, Some(12));
    assert!(config.scan.include_hidden);
    assert_eq!(config.connections.len(), 2);

    let enabled: Vec<&ConnectionDescriptor> = config.enabled_connections().collect();
    assert_eq!(enabled.len(), 1);
    assert_eq!(enabled[0].effective_port(), 22);
    assert_eq!(enabled[0].protocol().unwrap(), Protocol::Ssh);

    // Disabled by default, root path defaults to "/"
    assert!(!config.connections[1].enabled);
    assert_eq!(config.connections[1].root_path, "/");
    assert!(config.validate().is_ok());
}

#[test]
fn test_app_config_rejects_bad_toml() {
    let err = AppConfig::from_toml("max_concurrent_connections = \"lots\"").unwrap_err();
    assert!(matches!(err, ScanError::InvalidConfig { .. }));
}

#[test]
fn test_app_config_validate() {
    let mut config = AppConfig::default();
    config.max_concurrent_connections = 0;
    assert!(config.validate().is_err());

    let mut config = AppConfig::default();
    config.scan = ScanConfig {
        ignore_patterns: vec!["a{b".to_string()],
        ..ScanConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_load_explicit_file() {
    let temp = tempfile::TempDir::new().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(&path, "root_dir = \"/opt\"\nlog_level = \"debug\"\n").unwrap();

    let config = AppConfig::from_file(&path).unwrap();
    assert_eq!(config.root_dir, PathBuf::from("/opt"));
    assert_eq!(config.log_level, "debug");

    let missing = AppConfig::load(Some(&temp.path().join("nope.toml")));
    assert!(matches!(missing, Err(ScanError::NotFound { .. })));
}
