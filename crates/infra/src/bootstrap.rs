//! Process wiring
//!
//! [`MediSync`] builds the pieces once at startup and connects them: one
//! transport and cookie jar, one session store, one active-origin cell shared
//! by the endpoint resolver and the API client.

use std::sync::Arc;

use medisync_common::platform::PlatformDetector;
use reqwest::cookie::Jar;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::auth::{LogRedirect, LoginRedirect};
use crate::config::ClientConfig;
use crate::endpoint::EndpointResolver;
use crate::http::{HttpError, ReqwestTransport, Transport};
use crate::platform::AmbientPlatformDetector;
use crate::storage::{MemoryStore, SessionStore};

/// A booted client: resolver plus API client over shared state.
pub struct MediSync {
    resolver: Arc<EndpointResolver>,
    api: ApiClient,
}

impl MediSync {
    /// # Errors
    /// Returns `HttpError::Build` if the transport cannot be built.
    pub fn new(
        config: &ClientConfig,
        detector: Arc<dyn PlatformDetector>,
        store: Arc<dyn SessionStore>,
        redirect: Arc<dyn LoginRedirect>,
    ) -> Result<Self, HttpError> {
        let platform = detector.platform_info();
        let jar = Arc::new(Jar::default());
        let transport: Arc<dyn Transport> = Arc::new(
            ReqwestTransport::builder()
                .timeout(platform.timeout_config().timeout)
                .cookie_jar(Arc::clone(&jar))
                .build()?,
        );

        Self::with_transport(config, detector, store, redirect, transport, Some(jar))
    }

    /// Like [`new`](Self::new) over a caller-supplied transport.
    ///
    /// # Errors
    /// Returns `HttpError::InvalidHeader` for a bad CSRF header name.
    pub fn with_transport(
        config: &ClientConfig,
        detector: Arc<dyn PlatformDetector>,
        store: Arc<dyn SessionStore>,
        redirect: Arc<dyn LoginRedirect>,
        transport: Arc<dyn Transport>,
        jar: Option<Arc<Jar>>,
    ) -> Result<Self, HttpError> {
        let platform = detector.platform_info();
        let resolver = Arc::new(EndpointResolver::new(
            config.endpoint.clone(),
            config.probe.clone(),
            detector,
            Arc::clone(&store),
            Arc::clone(&transport),
        ));

        let mut builder = ApiClient::builder()
            .transport(transport)
            .active_base_url(resolver.active().clone())
            .auth_config(config.auth.clone())
            .platform(platform.clone())
            .session_store(store)
            .login_redirect(redirect);
        if let Some(jar) = jar {
            builder = builder.cookies(jar);
        }
        let api = builder.build()?;

        info!(platform = platform.label(), origin = %resolver.active().get(), "MediSync client ready");
        Ok(Self { resolver, api })
    }

    /// Environment-detected platform, in-memory session, log-only redirect.
    ///
    /// # Errors
    /// Returns `HttpError::Build` if the transport cannot be built.
    pub fn from_environment(config: &ClientConfig) -> Result<Self, HttpError> {
        Self::new(
            config,
            Arc::new(AmbientPlatformDetector::new()),
            Arc::new(MemoryStore::new()),
            Arc::new(LogRedirect),
        )
    }

    /// Start background endpoint optimization. `None` outside a tokio runtime.
    pub fn start(&self) -> Option<JoinHandle<()>> {
        self.resolver.spawn_optimization()
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn resolver(&self) -> &Arc<EndpointResolver> {
        &self.resolver
    }

    /// End the session and drop back to the default origin.
    pub fn logout(&self) {
        self.api.logout();
        if let Err(err) = self.resolver.reset_override() {
            warn!(error = %err, "Failed to reset API origin after logout");
        }
    }
}
