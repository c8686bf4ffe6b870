use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use medisync_common::platform::{PlatformDetector, PlatformInfo, PlatformKind};
use reqwest::Method;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::{
    by_priority, normalize_origin, ActiveBaseUrl, ConnectivityTestResult, ProbeOutcome,
    FALLBACK_BASE_URL,
};
use crate::config::{EndpointConfig, ProbeConfig};
use crate::http::{PreparedRequest, Transport};
use crate::storage::{SessionStore, StorageError, API_BASE_URL_KEY};

/// Diagnostic snapshot of the client's network situation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkInfo {
    pub platform: String,
    pub online: bool,
    pub user_agent: String,
    pub current_endpoint: String,
    pub timestamp: DateTime<Utc>,
}

/// Picks the origin requests are sent to and keeps it current.
///
/// At construction the origin is resolved synchronously from configuration,
/// the stored override and the platform default. Afterwards
/// [`optimize_endpoint`](Self::optimize_endpoint) may probe the candidates
/// and switch to the first reachable one.
pub struct EndpointResolver {
    config: EndpointConfig,
    probe: ProbeConfig,
    detector: Arc<dyn PlatformDetector>,
    store: Arc<dyn SessionStore>,
    transport: Arc<dyn Transport>,
    active: ActiveBaseUrl,
    optimizing: AtomicBool,
}

impl EndpointResolver {
    pub fn new(
        config: EndpointConfig,
        probe: ProbeConfig,
        detector: Arc<dyn PlatformDetector>,
        store: Arc<dyn SessionStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let mut resolver = Self {
            config,
            probe,
            detector,
            store,
            transport,
            active: ActiveBaseUrl::new(FALLBACK_BASE_URL),
            optimizing: AtomicBool::new(false),
        };
        let initial = resolver.resolve_base_url_sync();
        debug!(origin = %initial, "Resolved initial API origin");
        resolver.active = ActiveBaseUrl::new(initial);
        resolver
    }

    /// Resolve the origin without any I/O.
    ///
    /// Precedence: configured override, stored `API_BASE_URL`, platform
    /// default, then [`FALLBACK_BASE_URL`]. Never empty.
    pub fn resolve_base_url_sync(&self) -> String {
        if let Some(url) = non_empty(self.config.base_url_override.as_deref()) {
            return url.to_owned();
        }

        let stored = self.store.get(API_BASE_URL_KEY);
        if let Some(url) = non_empty(stored.as_deref()) {
            return url.to_owned();
        }

        let platform_default = match self.platform().kind() {
            PlatformKind::Mobile => by_priority(&self.config.mobile_candidates)
                .first()
                .map(|candidate| normalize_origin(&candidate.url).to_owned()),
            PlatformKind::Web => Some(self.web_origin(self.config.api_port)),
        };

        platform_default
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| FALLBACK_BASE_URL.to_owned())
    }

    /// Shared handle to the active origin.
    pub fn active(&self) -> &ActiveBaseUrl {
        &self.active
    }

    pub fn platform(&self) -> PlatformInfo {
        self.detector.platform_info()
    }

    /// Origins tried by [`find_best_endpoint`](Self::find_best_endpoint), in
    /// order, without duplicates.
    pub fn candidate_origins(&self) -> Vec<String> {
        let mut origins: Vec<String> = Vec::new();
        let mut push = |url: String| {
            if !url.is_empty() && !origins.contains(&url) {
                origins.push(url);
            }
        };

        match self.platform().kind() {
            PlatformKind::Mobile => {
                for candidate in by_priority(&self.config.mobile_candidates) {
                    push(normalize_origin(&candidate.url).to_owned());
                }
            }
            PlatformKind::Web => {
                if let Some(port) = self.page_url().and_then(|page| page.port()) {
                    push(self.web_origin(port));
                }
                push(self.web_origin(self.config.api_port));
                if self.config.legacy_fallback {
                    push(self.web_origin(self.config.legacy_port));
                }
            }
        }
        origins
    }

    /// Probe `origin` once and classify the answer.
    pub async fn probe(&self, origin: &str) -> ProbeOutcome {
        let timeout = self.probe.timeout();
        let request =
            match PreparedRequest::new(Method::GET, Arc::from(normalize_origin(origin)), &self.probe.path) {
                Ok(request) => request.with_timeout(timeout),
                Err(err) => return ProbeOutcome::Unreachable { reason: err.to_string() },
            };

        match tokio::time::timeout(timeout, self.transport.execute(&request)).await {
            Ok(Ok(response)) => {
                ProbeOutcome::from_status(response.status().as_u16(), self.probe.auth_gated)
            }
            Ok(Err(err)) => ProbeOutcome::Unreachable { reason: err.to_string() },
            Err(_) => ProbeOutcome::Unreachable {
                reason: format!("timeout of {}ms exceeded", timeout.as_millis()),
            },
        }
    }

    /// Whether `origin` answers like the MediSync API.
    pub async fn probe_endpoint(&self, origin: &str) -> bool {
        let outcome = self.probe(origin).await;
        if outcome.is_reachable() {
            debug!(origin, %outcome, "Endpoint probe succeeded");
        } else {
            warn!(origin, %outcome, "Endpoint probe failed");
        }
        outcome.is_reachable()
    }

    /// Timed probe for diagnostics screens.
    pub async fn test_endpoint(&self, origin: &str) -> ConnectivityTestResult {
        let started = Instant::now();
        let outcome = self.probe(origin).await;
        let response_time = started.elapsed();

        let error = match &outcome {
            ProbeOutcome::Unreachable { reason } => Some(reason.clone()),
            other if !other.is_reachable() => Some(other.to_string()),
            _ => None,
        };

        ConnectivityTestResult {
            success: outcome.is_reachable(),
            endpoint: normalize_origin(origin).to_owned(),
            outcome,
            error,
            response_time,
        }
    }

    /// First reachable candidate, probed sequentially in order.
    pub async fn find_best_endpoint(&self) -> Option<String> {
        for origin in self.candidate_origins() {
            if self.probe_endpoint(&origin).await {
                return Some(origin);
            }
        }
        None
    }

    /// Probe the candidates and switch to the first reachable one.
    ///
    /// Returns the new origin when the active one changed. Never fails:
    /// nothing reachable keeps the current origin, and a concurrent call
    /// returns `None` immediately.
    #[instrument(skip(self))]
    pub async fn optimize_endpoint(&self) -> Option<Arc<str>> {
        if !self.config.auto_probe {
            debug!("Endpoint auto-probing disabled");
            return None;
        }
        if non_empty(self.config.base_url_override.as_deref()).is_some() {
            debug!("Configured base URL override pins the origin");
            return None;
        }

        let Some(_guard) = OptimizationGuard::acquire(&self.optimizing) else {
            debug!("Endpoint optimization already running");
            return None;
        };

        let Some(best) = self.find_best_endpoint().await else {
            warn!(current = %self.active.get(), "No reachable endpoint found, keeping current origin");
            return None;
        };

        if *self.active.get() == *best {
            debug!(origin = %best, "Active origin is already the best endpoint");
            return None;
        }

        let previous = self.active.replace(&best);
        if let Err(err) = self.store.set(API_BASE_URL_KEY, &best) {
            warn!(error = %err, "Failed to persist API base URL override");
        }
        info!(from = %previous, to = %best, "Switched API origin");
        Some(self.active.get())
    }

    /// Run [`optimize_endpoint`](Self::optimize_endpoint) on a background
    /// task. Returns `None` outside a tokio runtime.
    pub fn spawn_optimization(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let handle = tokio::runtime::Handle::try_current().ok()?;
        let resolver = Arc::clone(self);
        Some(handle.spawn(async move {
            resolver.optimize_endpoint().await;
        }))
    }

    pub fn network_info(&self) -> NetworkInfo {
        let platform = self.platform();
        NetworkInfo {
            platform: platform.label().to_owned(),
            online: platform.online,
            user_agent: platform.user_agent,
            current_endpoint: self.active.get().to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Forget the persisted override and fall back to the resolved default.
    ///
    /// # Errors
    /// Returns the storage error if the override cannot be removed; the
    /// active origin is left unchanged in that case.
    pub fn reset_override(&self) -> Result<(), StorageError> {
        self.store.remove(API_BASE_URL_KEY)?;
        let origin = self.resolve_base_url_sync();
        self.active.replace(&origin);
        info!(origin = %origin, "Cleared API base URL override");
        Ok(())
    }

    fn page_url(&self) -> Option<Url> {
        self.config.page_url.as_deref().and_then(|page| Url::parse(page).ok())
    }

    /// `{scheme}://{page host}:{port}{api_path}`, defaulting to
    /// `http://localhost` when no page URL is known.
    fn web_origin(&self, port: u16) -> String {
        let page = self.page_url();
        let scheme = page.as_ref().map_or("http", |url| url.scheme());
        let host = page.as_ref().and_then(|url| url.host_str()).unwrap_or("localhost");
        let origin = format!("{scheme}://{host}:{port}{}", self.config.api_path);
        normalize_origin(&origin).to_owned()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(normalize_origin).filter(|url| !url.is_empty())
}

/// Clears the re-entrancy flag when the optimization finishes or is dropped.
struct OptimizationGuard<'a>(&'a AtomicBool);

impl<'a> OptimizationGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).ok()?;
        Some(Self(flag))
    }
}

impl Drop for OptimizationGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
