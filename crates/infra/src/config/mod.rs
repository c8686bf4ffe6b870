//! Client configuration
//!
//! [`ClientConfig`] gathers everything the host can tune before boot: the
//! explicit base URL override, candidate origins, probing toggles, auth
//! endpoints and logging. Every field has a default matching the deployed
//! backend, so an empty file (or no file at all) is a valid configuration.

pub mod loader;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::endpoint::{default_mobile_candidates, EndpointCandidate};
pub use loader::{load, load_from_env, load_from_file, probe_config_paths};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("No config file found in any of the standard locations")]
    NoConfigFile,

    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Invalid TOML format: {0}")]
    InvalidToml(String),

    #[error("Invalid JSON format: {0}")]
    InvalidJson(String),

    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub endpoint: EndpointConfig,
    pub auth: AuthConfig,
    pub probe: ProbeConfig,
    pub logging: LoggingConfig,
}

impl ClientConfig {
    /// Check cross-field constraints that serde cannot express.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidValue` naming the offending key.
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(url) = self.endpoint.base_url_override.as_deref() {
            check_url("endpoint.base_url_override", url)?;
        }
        for candidate in &self.endpoint.mobile_candidates {
            check_url("endpoint.mobile_candidates", &candidate.url)?;
        }
        if let Some(page) = self.endpoint.page_url.as_deref() {
            check_url("endpoint.page_url", page)?;
        }
        if self.endpoint.api_port == 0 {
            return Err(invalid("endpoint.api_port", "port must be non-zero"));
        }
        if self.probe.timeout_ms == 0 {
            return Err(invalid("probe.timeout_ms", "timeout must be non-zero"));
        }
        if !self.probe.path.starts_with('/') {
            return Err(invalid("probe.path", "path must start with '/'"));
        }
        if !self.auth.refresh_path.starts_with('/') {
            return Err(invalid("auth.refresh_path", "path must start with '/'"));
        }
        Ok(())
    }
}

/// Where requests go.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Explicit origin set by the host before boot; wins over everything.
    pub base_url_override: Option<String>,
    /// Origins the native shell tries, lowest priority first.
    pub mobile_candidates: Vec<EndpointCandidate>,
    /// URL of the page hosting the browser build (host and port are reused).
    pub page_url: Option<String>,
    /// Port the API is served on in production.
    pub api_port: u16,
    /// Path prefix of the API on the origin.
    pub api_path: String,
    /// Port of the legacy deployment.
    pub legacy_port: u16,
    /// Also probe the legacy port when everything else fails.
    pub legacy_fallback: bool,
    /// Probe candidates after boot and switch to the first reachable one.
    pub auto_probe: bool,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url_override: None,
            mobile_candidates: default_mobile_candidates(),
            page_url: None,
            api_port: 8000,
            api_path: "/api".to_string(),
            legacy_port: 8001,
            legacy_fallback: false,
            auto_probe: true,
        }
    }
}

/// Session and token endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Path fragments that never carry a bearer token nor trigger a refresh.
    pub bootstrap_paths: Vec<String>,
    pub refresh_path: String,
    /// Where the user is sent once the session is unrecoverable.
    pub login_path: String,
    pub csrf_cookie: String,
    pub csrf_header: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            bootstrap_paths: vec![
                "/users/login/".to_string(),
                "/users/register/".to_string(),
                "/users/forgot-password/".to_string(),
                "/users/reset-password".to_string(),
                "/users/token/refresh/".to_string(),
            ],
            refresh_path: "/users/token/refresh/".to_string(),
            login_path: "/login".to_string(),
            csrf_cookie: "csrftoken".to_string(),
            csrf_header: "X-CSRFToken".to_string(),
        }
    }
}

impl AuthConfig {
    /// True when `path` targets a login, registration, password or refresh
    /// endpoint.
    pub fn is_bootstrap_path(&self, path: &str) -> bool {
        self.bootstrap_paths.iter().any(|fragment| path.contains(fragment.as_str()))
    }
}

/// Reachability probing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Path requested on every candidate origin.
    pub path: String,
    pub timeout_ms: u64,
    /// The probe path requires authentication, so 401/403/405 prove the
    /// service is there.
    pub auth_gated: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self { path: "/users/profile/".to_string(), timeout_ms: 2_500, auth_gated: true }
    }
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Tracing subscriber settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}

fn check_url(key: &str, value: &str) -> ConfigResult<()> {
    url::Url::parse(value).map(|_| ()).map_err(|err| invalid(key, &format!("{value}: {err}")))
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue { key: key.to_string(), message: message.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ClientConfig::default();
        config.validate().unwrap();
        assert_eq!(config.probe.timeout(), Duration::from_millis(2_500));
        assert_eq!(config.endpoint.mobile_candidates.len(), 5);
        assert!(config.endpoint.auto_probe);
        assert!(!config.endpoint.legacy_fallback);
    }

    #[test]
    fn test_bootstrap_paths() {
        let auth = AuthConfig::default();
        assert!(auth.is_bootstrap_path("/users/login/"));
        assert!(auth.is_bootstrap_path("/users/reset-password/confirm/"));
        assert!(auth.is_bootstrap_path("/users/token/refresh/"));
        assert!(!auth.is_bootstrap_path("/users/profile/"));
        assert!(!auth.is_bootstrap_path("/appointments/"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ClientConfig::default();
        config.endpoint.base_url_override = Some("not a url".into());
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue { .. })));

        let mut config = ClientConfig::default();
        config.probe.timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = ClientConfig::default();
        config.auth.refresh_path = "users/token/refresh/".into();
        assert!(config.validate().is_err());
    }
}
