//! Platform model: native mobile shell versus standard browser.
//!
//! The client behaves differently inside the native-wrapped mobile shell
//! (longer timeouts, more retries, serialized network operations, a list of
//! candidate LAN origins) than in a browser. [`PlatformInfo`] is an
//! immutable snapshot of those facts; [`PlatformDetector`] is the seam that
//! lets hosts and tests decide where the snapshot comes from.

use std::fmt;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static MOBILE_USER_AGENT: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"(?i)Android|iPhone|iPad|iPod|BlackBerry|IEMobile|Opera Mini").ok()
});

/// Coarse platform family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    /// Running inside the native-wrapped mobile shell.
    Mobile,
    /// Running in a standard browser.
    Web,
}

impl fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mobile => f.write_str("mobile"),
            Self::Web => f.write_str("web"),
        }
    }
}

/// Snapshot of the runtime environment the client runs in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformInfo {
    pub is_native_shell: bool,
    pub is_mobile_user_agent: bool,
    pub is_web: bool,
    pub online: bool,
    /// Raw user agent, kept for diagnostics only.
    #[serde(default)]
    pub user_agent: String,
}

impl PlatformInfo {
    /// Derive a snapshot from raw environment facts.
    pub fn from_environment(native_bridge: bool, user_agent: &str, online: bool) -> Self {
        Self {
            is_native_shell: native_bridge,
            is_mobile_user_agent: is_mobile_user_agent(user_agent),
            is_web: !native_bridge,
            online,
            user_agent: user_agent.to_owned(),
        }
    }

    /// Browser snapshot with a desktop user agent, online.
    pub fn web() -> Self {
        Self::from_environment(false, "Mozilla/5.0 (X11; Linux x86_64)", true)
    }

    /// Native shell snapshot on an Android device, online.
    pub fn native_shell() -> Self {
        Self::from_environment(true, "Mozilla/5.0 (Linux; Android 14) MediSync", true)
    }

    pub fn kind(&self) -> PlatformKind {
        if self.is_native_shell {
            PlatformKind::Mobile
        } else {
            PlatformKind::Web
        }
    }

    /// Human readable platform label used in diagnostics.
    pub fn label(&self) -> &'static str {
        match self.kind() {
            PlatformKind::Mobile => "Mobile (native shell)",
            PlatformKind::Web => "Web Browser",
        }
    }

    /// Timeout and retry defaults for this platform.
    pub fn timeout_config(&self) -> TimeoutConfig {
        match self.kind() {
            PlatformKind::Mobile => TimeoutConfig::MOBILE,
            PlatformKind::Web => TimeoutConfig::WEB,
        }
    }
}

/// Returns true when the user agent belongs to a phone or tablet browser.
pub fn is_mobile_user_agent(user_agent: &str) -> bool {
    MOBILE_USER_AGENT.as_ref().is_some_and(|re| re.is_match(user_agent))
}

/// Per-platform request timeout and retry defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutConfig {
    /// Timeout applied to every outbound call.
    pub timeout: Duration,
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl TimeoutConfig {
    /// Mobile connections are slower and flakier.
    pub const MOBILE: Self = Self {
        timeout: Duration::from_millis(15_000),
        max_retries: 3,
        base_delay: Duration::from_millis(2_000),
        max_delay: Duration::from_millis(15_000),
    };

    pub const WEB: Self = Self {
        timeout: Duration::from_millis(10_000),
        max_retries: 2,
        base_delay: Duration::from_millis(1_000),
        max_delay: Duration::from_millis(8_000),
    };
}

/// Source of [`PlatformInfo`] snapshots.
///
/// Implementations must be pure and idempotent: reading the platform never
/// has side effects and never fails.
pub trait PlatformDetector: Send + Sync {
    fn platform_info(&self) -> PlatformInfo;
}

/// Detector returning a fixed, injected snapshot.
#[derive(Debug, Clone)]
pub struct StaticPlatformDetector {
    info: PlatformInfo,
}

impl StaticPlatformDetector {
    pub fn new(info: PlatformInfo) -> Self {
        Self { info }
    }
}

impl PlatformDetector for StaticPlatformDetector {
    fn platform_info(&self) -> PlatformInfo {
        self.info.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mobile_user_agents() {
        assert!(is_mobile_user_agent("Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)"));
        assert!(is_mobile_user_agent("mozilla/5.0 (linux; android 13)"));
        assert!(is_mobile_user_agent("Opera/9.80 (J2ME/MIDP; Opera Mini/9.80)"));
        assert!(!is_mobile_user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64)"));
        assert!(!is_mobile_user_agent(""));
    }

    #[test]
    fn test_native_shell_is_not_web() {
        let info = PlatformInfo::from_environment(true, "", false);
        assert!(info.is_native_shell);
        assert!(!info.is_web);
        assert!(!info.online);
        assert_eq!(info.kind(), PlatformKind::Mobile);

        let web = PlatformInfo::web();
        assert!(web.is_web);
        assert_eq!(web.kind(), PlatformKind::Web);
    }

    #[test]
    fn test_timeout_defaults_differ_by_platform() {
        let mobile = PlatformInfo::native_shell().timeout_config();
        assert_eq!(mobile.timeout, Duration::from_secs(15));
        assert_eq!(mobile.max_retries, 3);

        let web = PlatformInfo::web().timeout_config();
        assert_eq!(web.timeout, Duration::from_secs(10));
        assert_eq!(web.max_retries, 2);
        assert_eq!(web.max_delay, Duration::from_secs(8));
    }

    #[test]
    fn test_static_detector_is_idempotent() {
        let detector = StaticPlatformDetector::new(PlatformInfo::native_shell());
        assert_eq!(detector.platform_info(), detector.platform_info());
    }
}
