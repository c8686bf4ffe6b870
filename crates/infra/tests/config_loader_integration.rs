//! Integration tests for configuration loader
//!
//! Tests the end-to-end behavior of loading configuration from files.

use std::path::PathBuf;

use medisync_infra::config::{self, ConfigError};
use tempfile::TempDir;

fn write_config(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).expect("Failed to write config file");
    path
}

#[test]
fn test_load_config_from_json_file() {
    let json_content = r#"{
        "endpoint": {
            "base_url_override": "http://10.0.2.2:8000/api",
            "mobile_candidates": [
                { "url": "http://192.168.55.101:8000/api", "priority": 1, "description": "clinic LAN" },
                { "url": "http://localhost:8000/api", "priority": 2 }
            ],
            "legacy_fallback": true
        },
        "probe": {
            "path": "/health/",
            "timeout_ms": 1000,
            "auth_gated": false
        },
        "logging": { "level": "debug", "json": true }
    }"#;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_config(&dir, "medisync.json", json_content);

    let config = config::load_from_file(Some(path)).expect("Failed to load config from JSON file");

    assert_eq!(config.endpoint.base_url_override.as_deref(), Some("http://10.0.2.2:8000/api"));
    assert_eq!(config.endpoint.mobile_candidates.len(), 2);
    assert_eq!(config.endpoint.mobile_candidates[0].description, "clinic LAN");
    assert_eq!(config.endpoint.mobile_candidates[1].description, "");
    assert!(config.endpoint.legacy_fallback);
    assert!(config.endpoint.auto_probe);

    assert_eq!(config.probe.path, "/health/");
    assert_eq!(config.probe.timeout_ms, 1000);
    assert!(!config.probe.auth_gated);

    assert_eq!(config.logging.level, "debug");
    assert!(config.logging.json);

    // untouched sections keep their defaults
    assert_eq!(config.auth.refresh_path, "/users/token/refresh/");
    config.validate().expect("Loaded config should validate");
}

#[test]
fn test_load_config_from_toml_file() {
    let toml_content = r#"
[endpoint]
page_url = "https://medisync.example:9000/"
api_port = 8443
auto_probe = false

[[endpoint.mobile_candidates]]
url = "http://172.20.29.202:8000/api"
priority = 1
description = "Current network IP"

[auth]
login_path = "/auth/login"
"#;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_config(&dir, "medisync.toml", toml_content);

    let config = config::load_from_file(Some(path)).expect("Failed to load config from TOML file");

    assert_eq!(config.endpoint.page_url.as_deref(), Some("https://medisync.example:9000/"));
    assert_eq!(config.endpoint.api_port, 8443);
    assert!(!config.endpoint.auto_probe);
    assert_eq!(config.endpoint.mobile_candidates.len(), 1);
    assert_eq!(config.auth.login_path, "/auth/login");
    assert!(config.auth.is_bootstrap_path("/users/login/"));
    assert_eq!(config.probe.timeout_ms, 2_500);
}

#[test]
fn test_load_config_with_empty_file_uses_defaults() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_config(&dir, "medisync.toml", "");

    let config = config::load_from_file(Some(path)).expect("Empty TOML should load");
    assert_eq!(config, config::ClientConfig::default());
}

#[test]
fn test_load_config_from_nonexistent_file() {
    let result = config::load_from_file(Some("/nonexistent/path/medisync.json".into()));

    match result {
        Err(ConfigError::NotFound(path)) => assert!(path.contains("medisync.json")),
        other => panic!("Expected NotFound error, got {other:?}"),
    }
}

#[test]
fn test_load_config_with_invalid_format() {
    let dir = TempDir::new().expect("Failed to create temp dir");

    let json = write_config(&dir, "broken.json", r#"{ "this is": "not valid" "#);
    assert!(matches!(config::load_from_file(Some(json)), Err(ConfigError::InvalidJson(_))));

    let toml = write_config(&dir, "broken.toml", "[endpoint\napi_port = ");
    assert!(matches!(config::load_from_file(Some(toml)), Err(ConfigError::InvalidToml(_))));

    let yaml = write_config(&dir, "medisync.yaml", "endpoint: {}");
    assert!(matches!(
        config::load_from_file(Some(yaml)),
        Err(ConfigError::UnsupportedFormat(ext)) if ext == "yaml"
    ));
}

#[test]
fn test_invalid_candidate_url_fails_validation() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_config(
        &dir,
        "medisync.json",
        r#"{ "endpoint": { "mobile_candidates": [ { "url": "not a url", "priority": 1 } ] } }"#,
    );

    let config = config::load_from_file(Some(path)).expect("Parsing should succeed");
    match config.validate() {
        Err(ConfigError::InvalidValue { key, .. }) => assert_eq!(key, "endpoint.mobile_candidates"),
        other => panic!("Expected InvalidValue, got {other:?}"),
    }
}
