//! Configuration loader
//!
//! Loads client configuration from a config file and environment variables.
//!
//! ## Loading Strategy
//! 1. Probe the standard locations for a config file (defaults if none)
//! 2. Layer environment variables on top
//! 3. Validate the result
//!
//! ## Environment Variables
//! - `MEDISYNC_API_BASE_URL`: explicit base URL override
//! - `MEDISYNC_AUTO_PROBE`: probe candidate origins after boot (true/false)
//! - `MEDISYNC_LEGACY_FALLBACK`: also probe the legacy port (true/false)
//! - `MEDISYNC_PROBE_TIMEOUT_MS`: per-probe timeout in milliseconds
//! - `MEDISYNC_PAGE_URL`: URL of the page hosting the browser build
//! - `MEDISYNC_LOG_LEVEL`: default tracing filter directive
//! - `MEDISYNC_LOG_JSON`: emit JSON log lines (true/false)
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./medisync.toml` or `./medisync.json` (current working directory)
//! 2. `../medisync.{toml,json}` (parent directory)
//! 3. `../../medisync.{toml,json}` (grandparent directory)
//! 4. Relative to executable location

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{ClientConfig, ConfigError, ConfigResult};

pub const ENV_API_BASE_URL: &str = "MEDISYNC_API_BASE_URL";
pub const ENV_AUTO_PROBE: &str = "MEDISYNC_AUTO_PROBE";
pub const ENV_LEGACY_FALLBACK: &str = "MEDISYNC_LEGACY_FALLBACK";
pub const ENV_PROBE_TIMEOUT_MS: &str = "MEDISYNC_PROBE_TIMEOUT_MS";
pub const ENV_PAGE_URL: &str = "MEDISYNC_PAGE_URL";
pub const ENV_LOG_LEVEL: &str = "MEDISYNC_LOG_LEVEL";
pub const ENV_LOG_JSON: &str = "MEDISYNC_LOG_JSON";

const FILE_NAMES: [&str; 2] = ["medisync.toml", "medisync.json"];

/// Load configuration from the first config file found, overlaid with
/// environment variables.
///
/// A missing config file is not an error; defaults are used instead.
///
/// # Errors
/// Returns `ConfigError` if a file exists but cannot be parsed, or if an
/// environment variable holds an invalid value.
pub fn load() -> ConfigResult<ClientConfig> {
    let mut config = match probe_config_paths() {
        Some(path) => load_from_file(Some(path))?,
        None => {
            debug!("No config file found, using defaults");
            ClientConfig::default()
        }
    };

    apply_env(&mut config)?;
    config.validate()?;
    info!(
        auto_probe = config.endpoint.auto_probe,
        legacy_fallback = config.endpoint.legacy_fallback,
        "Configuration loaded"
    );
    Ok(config)
}

/// Defaults overlaid with environment variables only.
///
/// # Errors
/// Returns `ConfigError::InvalidValue` for malformed variables.
pub fn load_from_env() -> ConfigResult<ClientConfig> {
    let mut config = ClientConfig::default();
    apply_env(&mut config)?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations. Supports both JSON
/// and TOML (detected by file extension).
///
/// # Errors
/// Returns `ConfigError` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
pub fn load_from_file(path: Option<PathBuf>) -> ConfigResult<ClientConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ConfigError::NotFound(p.display().to_string()));
            }
            p
        }
        None => probe_config_paths().ok_or(ConfigError::NoConfigFile)?,
    };

    info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)?;
    parse_config(&contents, &config_path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> ConfigResult<ClientConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents).map_err(|e| ConfigError::InvalidToml(e.to_string())),
        "json" => {
            serde_json::from_str(contents).map_err(|e| ConfigError::InvalidJson(e.to_string()))
        }
        _ => Err(ConfigError::UnsupportedFormat(extension.to_string())),
    }
}

/// Probe the standard locations for a configuration file
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.extend([cwd.clone(), cwd.join(".."), cwd.join("../..")]);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            roots.extend([exe_dir.to_path_buf(), exe_dir.join("..")]);
        }
    }

    roots
        .iter()
        .flat_map(|root| FILE_NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.exists())
}

/// Overlay environment variables onto `config`.
///
/// Unset variables leave the current value untouched.
///
/// # Errors
/// Returns `ConfigError::InvalidValue` if a numeric variable does not parse.
pub fn apply_env(config: &mut ClientConfig) -> ConfigResult<()> {
    if let Some(url) = env_string(ENV_API_BASE_URL) {
        config.endpoint.base_url_override = Some(url);
    }
    if let Some(page) = env_string(ENV_PAGE_URL) {
        config.endpoint.page_url = Some(page);
    }

    config.endpoint.auto_probe = env_bool(ENV_AUTO_PROBE, config.endpoint.auto_probe);
    config.endpoint.legacy_fallback = env_bool(ENV_LEGACY_FALLBACK, config.endpoint.legacy_fallback);

    if let Some(raw) = env_string(ENV_PROBE_TIMEOUT_MS) {
        config.probe.timeout_ms = raw.parse::<u64>().map_err(|e| ConfigError::InvalidValue {
            key: ENV_PROBE_TIMEOUT_MS.to_string(),
            message: e.to_string(),
        })?;
    }

    if let Some(level) = env_string(ENV_LOG_LEVEL) {
        config.logging.level = level;
    }
    config.logging.json = env_bool(ENV_LOG_JSON, config.logging.json);

    Ok(())
}

/// Non-empty environment variable
pub(crate) fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive).
/// Unrecognized values fall back to `default`.
pub(crate) fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .and_then(|s| match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}
