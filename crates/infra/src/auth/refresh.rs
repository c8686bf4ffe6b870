use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::LoginRedirect;
use crate::config::AuthConfig;
use crate::http::{
    HttpError, PreparedRequest, Recovery, RequestState, RequestTrace, ResponseInterceptor,
    Transport,
};
use crate::storage::{SessionStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
    /// Present when the backend rotates refresh tokens.
    #[serde(default)]
    refresh: Option<String>,
}

/// Recovers from a 401 with one token refresh and one re-issue.
///
/// - bootstrap endpoints and non-401 failures pass through untouched
/// - a missing refresh token propagates the original error
/// - a failed refresh, or a 401 on the re-issued request, clears the session
///   and redirects to the login page before failing with the original error
///
/// Refreshes are serialized. A request that failed with a token which has
/// since been replaced reuses the new token instead of refreshing again.
pub struct TokenRefreshInterceptor {
    store: Arc<dyn SessionStore>,
    transport: Arc<dyn Transport>,
    redirect: Arc<dyn LoginRedirect>,
    refresh_path: String,
    login_path: String,
    refresh_lock: Mutex<()>,
}

impl TokenRefreshInterceptor {
    /// `transport` is used directly for the refresh call, bypassing every
    /// interceptor.
    pub fn new(
        store: Arc<dyn SessionStore>,
        transport: Arc<dyn Transport>,
        redirect: Arc<dyn LoginRedirect>,
        config: &AuthConfig,
    ) -> Self {
        Self {
            store,
            transport,
            redirect,
            refresh_path: config.refresh_path.clone(),
            login_path: config.login_path.clone(),
            refresh_lock: Mutex::new(()),
        }
    }

    async fn refresh(&self, origin: &str, refresh_token: &str) -> Result<String, HttpError> {
        let request = PreparedRequest::new(Method::POST, Arc::from(origin), &self.refresh_path)?
            .with_json(json!({ "refresh": refresh_token }));

        let response =
            self.transport.execute(&request).await?.error_for_status(request.url())?;
        let tokens: RefreshResponse = response.json()?;

        self.store
            .set(ACCESS_TOKEN_KEY, &tokens.access)
            .map_err(|e| HttpError::Request(format!("Failed to store access token: {e}")))?;
        if let Some(rotated) = tokens.refresh.as_deref() {
            self.store
                .set(REFRESH_TOKEN_KEY, rotated)
                .map_err(|e| HttpError::Request(format!("Failed to store refresh token: {e}")))?;
        }
        Ok(tokens.access)
    }

    fn end_session(&self, trace: &mut RequestTrace) {
        if let Err(err) = self.store.clear_session() {
            warn!(error = %err, "Failed to clear session after authentication failure");
        }
        self.redirect.redirect_to_login(&self.login_path);
        trace.record(RequestState::LoggedOut);
    }

    /// Token to re-issue with: the one already replacing `used`, or a fresh
    /// one from the refresh endpoint. `Ok(None)` means no refresh token is
    /// stored.
    async fn current_or_refreshed(
        &self,
        origin: &str,
        used: Option<&str>,
    ) -> Result<Option<String>, HttpError> {
        let _guard = self.refresh_lock.lock().await;

        if let Some(current) = self.store.get(ACCESS_TOKEN_KEY) {
            if used != Some(current.as_str()) {
                debug!("Access token already refreshed by a concurrent request");
                return Ok(Some(current));
            }
        }

        let Some(refresh_token) = self.store.get(REFRESH_TOKEN_KEY) else {
            return Ok(None);
        };

        info!("Attempting to refresh access token");
        let access = self.refresh(origin, &refresh_token).await?;
        info!("Token refreshed successfully");
        Ok(Some(access))
    }
}

#[async_trait]
impl ResponseInterceptor for TokenRefreshInterceptor {
    async fn on_error(
        &self,
        request: &PreparedRequest,
        error: HttpError,
        trace: &mut RequestTrace,
    ) -> Recovery {
        if !error.is_unauthorized() || request.is_auth_endpoint() {
            return Recovery::Fail(error);
        }

        if request.auth_retried() {
            error!(path = request.path(), "Request rejected again after token refresh");
            self.end_session(trace);
            return Recovery::Fail(error);
        }

        debug!(path = request.path(), "401 Unauthorized detected, attempting token refresh");
        trace.record(RequestState::Refreshing);

        match self.current_or_refreshed(request.origin(), request.bearer_token()).await {
            Ok(Some(access)) => {
                let mut retry = request.clone();
                retry.mark_auth_retried();
                if let Err(err) = retry.set_bearer_token(&access) {
                    warn!(error = %err, "Refreshed token is not a valid header value");
                    trace.record(RequestState::RefreshFailed);
                    self.end_session(trace);
                    return Recovery::Fail(error);
                }
                trace.record(RequestState::RetriedOnce);
                Recovery::Retry(retry)
            }
            Ok(None) => {
                warn!("No refresh token found");
                Recovery::Fail(error)
            }
            Err(refresh_error) => {
                error!(error = %refresh_error, "Token refresh failed");
                trace.record(RequestState::RefreshFailed);
                self.end_session(trace);
                Recovery::Fail(error)
            }
        }
    }
}
