//! Unit tests for configuration loading
//!
//! Covers:
//! - Missing TOML file falls back to compiled defaults
//! - CLI/env layer wins over the TOML layer
//! - Validation of numeric limits
//! - Directory creation at startup

use remusic_common::config::{
    load_toml_config, locate_config_file, CompiledDefaults, ServerConfig, TomlConfig,
};
use std::path::PathBuf;

#[test]
fn test_compiled_defaults() {
    let config = ServerConfig::default();

    assert_eq!(config.host, "0.0.0.0");
    assert_eq!(config.port, 4000);
    assert_eq!(config.ocr_bin, "oemer");
    assert_eq!(config.python_bin, "python");
    assert_eq!(config.max_upload_size_mb, 12);
    assert_eq!(config.max_upload_bytes(), 12 * 1024 * 1024);
    assert_eq!(config.log_level, "info");
    assert!(config.spa_root.is_none());
    assert!(config.config_file.is_none());
    assert_eq!(config.database_path(), PathBuf::from("data").join("scores.db"));
}

#[test]
fn test_toml_parsing_partial_file() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("remusic-server.toml");
    std::fs::write(
        &path,
        r#"
port = 5100
storage_dir = "/srv/remusic/storage"
max_concurrent_jobs = 4

[logging]
level = "debug"
"#,
    )
    .unwrap();

    let layer = load_toml_config(&path).unwrap();
    assert_eq!(layer.port, Some(5100));
    assert_eq!(layer.max_concurrent_jobs, Some(4));
    assert!(layer.host.is_none());

    let config = ServerConfig::from_layer(layer, &CompiledDefaults::default()).unwrap();
    assert_eq!(config.port, 5100);
    assert_eq!(config.storage_dir, PathBuf::from("/srv/remusic/storage"));
    assert_eq!(config.host, "0.0.0.0");
    assert_eq!(config.log_level, "debug");
}

#[test]
fn test_invalid_toml_is_config_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("broken.toml");
    std::fs::write(&path, "port = \"not a number\"").unwrap();

    let err = load_toml_config(&path).unwrap_err();
    assert!(err.to_string().contains("Configuration error"));
}

#[test]
fn test_cli_layer_overrides_file_layer() {
    let cli = TomlConfig {
        port: Some(8080),
        ocr_bin: Some("/opt/oemer/bin/oemer".to_string()),
        ..Default::default()
    };
    let file = TomlConfig {
        port: Some(5100),
        python_bin: Some("python3".to_string()),
        ..Default::default()
    };

    let config = ServerConfig::from_layer(cli.merge(file), &CompiledDefaults::default()).unwrap();
    assert_eq!(config.port, 8080);
    assert_eq!(config.ocr_bin, "/opt/oemer/bin/oemer");
    assert_eq!(config.python_bin, "python3");
}

#[test]
fn test_zero_limits_rejected() {
    let layer = TomlConfig {
        max_concurrent_jobs: Some(0),
        ..Default::default()
    };
    assert!(ServerConfig::from_layer(layer, &CompiledDefaults::default()).is_err());

    let layer = TomlConfig {
        max_upload_size_mb: Some(0),
        ..Default::default()
    };
    assert!(ServerConfig::from_layer(layer, &CompiledDefaults::default()).is_err());
}

#[test]
fn test_empty_tool_names_rejected() {
    let layer = TomlConfig {
        ocr_bin: Some("  ".to_string()),
        ..Default::default()
    };
    let err = ServerConfig::from_layer(layer, &CompiledDefaults::default()).unwrap_err();
    assert_eq!(err.to_string(), "Configuration error: ocr_bin must not be empty");
}

#[test]
fn test_explicit_missing_config_file_is_error() {
    let temp = tempfile::tempdir().unwrap();
    let missing = temp.path().join("nope.toml");

    assert!(locate_config_file(Some(&missing)).is_err());
}

#[test]
fn test_explicit_config_file_is_used() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("custom.toml");
    std::fs::write(&path, "host = \"127.0.0.1\"").unwrap();

    assert_eq!(locate_config_file(Some(&path)).unwrap(), Some(path.clone()));

    let config = ServerConfig::resolve(TomlConfig::default(), Some(&path)).unwrap();
    assert_eq!(config.host, "127.0.0.1");
    assert_eq!(config.config_file, Some(path));
}

#[test]
fn test_ensure_directories_creates_missing() {
    let temp = tempfile::tempdir().unwrap();
    let config = ServerConfig {
        storage_dir: temp.path().join("storage"),
        data_dir: temp.path().join("data"),
        ..ServerConfig::default()
    };

    config.ensure_directories().unwrap();
    assert!(config.storage_dir.is_dir());
    assert!(config.data_dir.is_dir());

    // Second call is a no-op
    config.ensure_directories().unwrap();
}
