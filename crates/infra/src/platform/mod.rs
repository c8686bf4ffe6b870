//! Ambient platform detection
//!
//! The embedding host tells the client where it runs through environment
//! variables; [`AmbientPlatformDetector`] turns them into a
//! [`PlatformInfo`] snapshot.
//!
//! | variable | meaning | default |
//! |---|---|---|
//! | `MEDISYNC_NATIVE_BRIDGE` | running inside the native mobile shell | `false` |
//! | `MEDISYNC_USER_AGENT` | user agent of the hosting web view | empty |
//! | `MEDISYNC_ONLINE` | network connectivity reported by the host | `true` |

use medisync_common::platform::{PlatformDetector, PlatformInfo};
pub use medisync_common::platform::{PlatformKind, StaticPlatformDetector, TimeoutConfig};

use crate::config::loader::{env_bool, env_string};

pub const ENV_NATIVE_BRIDGE: &str = "MEDISYNC_NATIVE_BRIDGE";
pub const ENV_USER_AGENT: &str = "MEDISYNC_USER_AGENT";
pub const ENV_ONLINE: &str = "MEDISYNC_ONLINE";

/// Reads the platform from the process environment on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct AmbientPlatformDetector;

impl AmbientPlatformDetector {
    pub fn new() -> Self {
        Self
    }
}

impl PlatformDetector for AmbientPlatformDetector {
    fn platform_info(&self) -> PlatformInfo {
        PlatformInfo::from_environment(
            env_bool(ENV_NATIVE_BRIDGE, false),
            &env_string(ENV_USER_AGENT).unwrap_or_default(),
            env_bool(ENV_ONLINE, true),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use once_cell::sync::Lazy;

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    fn clear_env() {
        for key in [ENV_NATIVE_BRIDGE, ENV_USER_AGENT, ENV_ONLINE] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_defaults_to_online_browser() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        let info = AmbientPlatformDetector::new().platform_info();
        assert_eq!(info.kind(), PlatformKind::Web);
        assert!(info.is_web);
        assert!(info.online);
        assert!(!info.is_mobile_user_agent);
    }

    #[test]
    fn test_native_bridge_and_user_agent() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();
        std::env::set_var(ENV_NATIVE_BRIDGE, "1");
        std::env::set_var(ENV_USER_AGENT, "Mozilla/5.0 (Linux; Android 14; Pixel 8)");
        std::env::set_var(ENV_ONLINE, "false");

        let info = AmbientPlatformDetector::new().platform_info();
        clear_env();

        assert_eq!(info.kind(), PlatformKind::Mobile);
        assert!(info.is_native_shell);
        assert!(!info.is_web);
        assert!(info.is_mobile_user_agent);
        assert!(!info.online);
        assert_eq!(info.timeout_config(), TimeoutConfig::MOBILE);
    }

    #[test]
    fn test_detection_is_idempotent() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();
        std::env::set_var(ENV_USER_AGENT, "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0)");

        let detector = AmbientPlatformDetector::new();
        let first = detector.platform_info();
        let second = detector.platform_info();
        clear_env();

        assert_eq!(first, second);
        // a mobile browser is still the web platform
        assert_eq!(first.kind(), PlatformKind::Web);
        assert!(first.is_mobile_user_agent);
    }
}
