//! Authenticated API client
//!
//! Every request goes through the same pipeline:
//!
//! 1. bind the path to a snapshot of the active origin
//! 2. run the request interceptors in order (bearer token first)
//! 3. send on the transport
//! 4. on failure run the response interceptors in order (token refresh
//!    first); the first one asking for a re-issue wins
//!
//! Inside the native shell the whole pipeline runs through the
//! [`OperationQueue`], so at most one request is in flight.

use std::sync::Arc;

use medisync_common::platform::{PlatformDetector, PlatformInfo};
use medisync_common::resilience::{execute_with_retry, AsyncOperationResult, RetryConfig};
use medisync_common::sync::{execute_mobile_safe, OperationQueue};
use reqwest::cookie::Jar;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::auth::{
    perform_logout, BearerTokenInterceptor, CookieSource, LogRedirect, LoginRedirect,
    TokenRefreshInterceptor,
};
use crate::config::AuthConfig;
use crate::endpoint::{ActiveBaseUrl, FALLBACK_BASE_URL};
use crate::http::{
    ApiRequest, HttpError, PreparedRequest, RawResponse, Recovery, ReqwestTransport,
    RequestInterceptor, RequestState, RequestTrace, ResponseInterceptor, Transport,
};
use crate::platform::AmbientPlatformDetector;
use crate::storage::{MemoryStore, SessionStore};

/// Upper bound on interceptor-requested re-issues of one request.
const MAX_REISSUES: usize = 3;

/// HTTP client for the MediSync API.
///
/// Cheap to clone; clones share the transport, the session store and the
/// active origin.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    active: ActiveBaseUrl,
    auth: AuthConfig,
    platform: PlatformInfo,
    queue: OperationQueue,
    store: Arc<dyn SessionStore>,
    redirect: Arc<dyn LoginRedirect>,
    request_interceptors: Vec<Arc<dyn RequestInterceptor>>,
    response_interceptors: Vec<Arc<dyn ResponseInterceptor>>,
    retry: RetryConfig,
}

impl ApiClient {
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    /// Origin requests are currently sent to.
    pub fn base_url(&self) -> Arc<str> {
        self.inner.active.get()
    }

    pub fn active_base_url(&self) -> &ActiveBaseUrl {
        &self.inner.active
    }

    pub fn platform(&self) -> &PlatformInfo {
        &self.inner.platform
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.inner.retry
    }

    pub fn session_store(&self) -> &Arc<dyn SessionStore> {
        &self.inner.store
    }

    /// Send `request` and return the successful response.
    ///
    /// # Errors
    /// Non-2xx responses surface as `HttpError::Status` with the status and
    /// decoded body preserved, after the response interceptors had their
    /// chance to recover.
    pub async fn send(&self, request: ApiRequest) -> Result<RawResponse, HttpError> {
        self.send_with_trace(request).await.0
    }

    /// Like [`send`](Self::send), also returning the states the request went
    /// through.
    pub async fn send_with_trace(
        &self,
        request: ApiRequest,
    ) -> (Result<RawResponse, HttpError>, RequestTrace) {
        let client = self.clone();
        let routed = execute_mobile_safe(&self.inner.platform, &self.inner.queue, move || async move {
            client.dispatch(request).await
        })
        .await;

        match routed {
            Ok(outcome) => outcome,
            Err(err) => (Err(HttpError::Queue(err)), RequestTrace::default()),
        }
    }

    async fn dispatch(&self, request: ApiRequest) -> (Result<RawResponse, HttpError>, RequestTrace) {
        let mut trace = RequestTrace::default();
        let auth_endpoint = self.inner.auth.is_bootstrap_path(request.path());
        let mut prepared =
            match PreparedRequest::from_api(request, self.inner.active.get(), auth_endpoint) {
                Ok(prepared) => prepared,
                Err(err) => return (Err(err), trace),
            };

        let mut reissues = 0;
        loop {
            for interceptor in &self.inner.request_interceptors {
                if let Err(err) = interceptor.on_request(&mut prepared) {
                    return (Err(err), trace);
                }
            }

            trace.record(RequestState::Sent);
            debug!(method = %prepared.method(), url = %prepared.url(), "Dispatching API request");

            let error = match self.inner.transport.execute(&prepared).await {
                Ok(response) => match response.error_for_status(prepared.url()) {
                    Ok(response) => {
                        trace.record(RequestState::Success);
                        return (Ok(response), trace);
                    }
                    Err(err) => err,
                },
                Err(err) => err,
            };

            trace.record(if prepared.auth_retried() {
                RequestState::Failed
            } else if error.is_unauthorized() && !prepared.is_auth_endpoint() {
                RequestState::Failed401Untried
            } else {
                RequestState::FailedNon401
            });

            let mut recovery = Recovery::Fail(error);
            for interceptor in &self.inner.response_interceptors {
                recovery = match recovery {
                    Recovery::Fail(error) => interceptor.on_error(&prepared, error, &mut trace).await,
                    retry @ Recovery::Retry(_) => retry,
                };
            }

            match recovery {
                Recovery::Retry(next) if reissues < MAX_REISSUES => {
                    reissues += 1;
                    prepared = next;
                }
                Recovery::Retry(next) => {
                    warn!(path = next.path(), reissues, "Giving up after repeated re-issues");
                    return (
                        Err(HttpError::Request(format!(
                            "{} re-issued more than {MAX_REISSUES} times",
                            next.url()
                        ))),
                        trace,
                    );
                }
                Recovery::Fail(error) => {
                    debug!(url = %prepared.url(), error = %error, "API request failed");
                    return (Err(error), trace);
                }
            }
        }
    }

    /// GET `path` and decode the JSON body.
    #[instrument(skip(self))]
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, HttpError> {
        self.send(ApiRequest::get(path)).await?.json()
    }

    #[instrument(skip(self, body))]
    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, HttpError> {
        self.send(ApiRequest::post(path, to_body(body)?)).await?.json()
    }

    #[instrument(skip(self, body))]
    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, HttpError> {
        self.send(ApiRequest::put(path, to_body(body)?)).await?.json()
    }

    #[instrument(skip(self, body))]
    pub async fn patch<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, HttpError> {
        self.send(ApiRequest::patch(path, to_body(body)?)).await?.json()
    }

    #[instrument(skip(self))]
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, HttpError> {
        self.send(ApiRequest::delete(path)).await?.json()
    }

    /// Send `request` under the client's retry policy.
    ///
    /// Each attempt is a full pipeline run, so a 401 still gets its one
    /// refresh inside an attempt. A 401 that survives it ends the loop.
    pub async fn call_with_retry(&self, request: ApiRequest) -> AsyncOperationResult<RawResponse> {
        execute_with_retry(
            || {
                let request = request.clone();
                async move { self.send(request).await }
            },
            &self.inner.retry,
        )
        .await
    }

    /// [`call_with_retry`](Self::call_with_retry) plus JSON decoding.
    pub async fn fetch_with_retry<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> AsyncOperationResult<T> {
        execute_with_retry(
            || {
                let request = request.clone();
                async move { self.send(request).await?.json::<T>() }
            },
            &self.inner.retry,
        )
        .await
    }

    /// Clear the session and the endpoint override, then redirect to login.
    pub fn logout(&self) {
        perform_logout(&*self.inner.store, &*self.inner.redirect, &self.inner.auth.login_path);
    }
}

fn to_body<B: Serialize + ?Sized>(body: &B) -> Result<Value, HttpError> {
    serde_json::to_value(body).map_err(|e| HttpError::Request(format!("Failed to serialize body: {e}")))
}

/// Builder for [`ApiClient`].
///
/// Everything is optional:
/// - platform: read from the environment
/// - transport: `reqwest` with the platform timeout and a cookie jar
/// - origin: [`FALLBACK_BASE_URL`]
/// - store: in-memory
/// - login redirect: log only
/// - retry policy: the platform defaults
///
/// Whatever retry policy is chosen, 401s are never retried by backoff.
#[derive(Default)]
pub struct ApiClientBuilder {
    transport: Option<Arc<dyn Transport>>,
    active: Option<ActiveBaseUrl>,
    auth: AuthConfig,
    platform: Option<PlatformInfo>,
    queue: Option<OperationQueue>,
    store: Option<Arc<dyn SessionStore>>,
    redirect: Option<Arc<dyn LoginRedirect>>,
    cookies: Option<Arc<dyn CookieSource>>,
    request_interceptors: Vec<Arc<dyn RequestInterceptor>>,
    response_interceptors: Vec<Arc<dyn ResponseInterceptor>>,
    retry: Option<RetryConfig>,
}

impl ApiClientBuilder {
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Fixed origin.
    #[must_use]
    pub fn base_url(mut self, url: impl AsRef<str>) -> Self {
        self.active = Some(ActiveBaseUrl::new(url));
        self
    }

    /// Origin cell shared with an [`EndpointResolver`](crate::endpoint::EndpointResolver).
    #[must_use]
    pub fn active_base_url(mut self, active: ActiveBaseUrl) -> Self {
        self.active = Some(active);
        self
    }

    #[must_use]
    pub fn auth_config(mut self, auth: AuthConfig) -> Self {
        self.auth = auth;
        self
    }

    #[must_use]
    pub fn platform(mut self, platform: PlatformInfo) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Queue used inside the native shell; defaults to the global one.
    #[must_use]
    pub fn queue(mut self, queue: OperationQueue) -> Self {
        self.queue = Some(queue);
        self
    }

    #[must_use]
    pub fn session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn login_redirect(mut self, redirect: Arc<dyn LoginRedirect>) -> Self {
        self.redirect = Some(redirect);
        self
    }

    /// Cookie source for the CSRF token; only needed with a custom transport.
    #[must_use]
    pub fn cookies(mut self, cookies: Arc<dyn CookieSource>) -> Self {
        self.cookies = Some(cookies);
        self
    }

    /// Runs after the bearer token interceptor.
    #[must_use]
    pub fn request_interceptor(mut self, interceptor: Arc<dyn RequestInterceptor>) -> Self {
        self.request_interceptors.push(interceptor);
        self
    }

    /// Runs after the token refresh interceptor.
    #[must_use]
    pub fn response_interceptor(mut self, interceptor: Arc<dyn ResponseInterceptor>) -> Self {
        self.response_interceptors.push(interceptor);
        self
    }

    #[must_use]
    pub fn retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    /// # Errors
    /// Returns `HttpError::Build` if the default transport cannot be built and
    /// `HttpError::InvalidHeader` for a bad CSRF header name.
    pub fn build(self) -> Result<ApiClient, HttpError> {
        let platform =
            self.platform.unwrap_or_else(|| AmbientPlatformDetector::new().platform_info());

        let mut cookies = self.cookies;
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => {
                let jar = Arc::new(Jar::default());
                let transport = ReqwestTransport::builder()
                    .timeout(platform.timeout_config().timeout)
                    .cookie_jar(Arc::clone(&jar))
                    .build()?;
                if cookies.is_none() {
                    cookies = Some(jar);
                }
                Arc::new(transport)
            }
        };

        let store: Arc<dyn SessionStore> =
            self.store.unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let redirect: Arc<dyn LoginRedirect> =
            self.redirect.unwrap_or_else(|| Arc::new(LogRedirect));

        let mut bearer = BearerTokenInterceptor::new(Arc::clone(&store), &self.auth)?;
        if let Some(cookies) = cookies {
            bearer = bearer.with_cookies(cookies);
        }
        let refresh = TokenRefreshInterceptor::new(
            Arc::clone(&store),
            Arc::clone(&transport),
            Arc::clone(&redirect),
            &self.auth,
        );

        let mut request_interceptors: Vec<Arc<dyn RequestInterceptor>> = vec![Arc::new(bearer)];
        request_interceptors.extend(self.request_interceptors);
        let mut response_interceptors: Vec<Arc<dyn ResponseInterceptor>> = vec![Arc::new(refresh)];
        response_interceptors.extend(self.response_interceptors);

        // a 401 reaching the retry loop already had its one refresh
        let retry = self
            .retry
            .unwrap_or_else(|| RetryConfig::for_platform(&platform))
            .excluding(|error| error.status() == Some(401));

        Ok(ApiClient {
            inner: Arc::new(Inner {
                transport,
                active: self.active.unwrap_or_else(|| ActiveBaseUrl::new(FALLBACK_BASE_URL)),
                auth: self.auth,
                platform,
                queue: self.queue.unwrap_or_else(|| OperationQueue::global().clone()),
                store,
                redirect,
                request_interceptors,
                response_interceptors,
                retry,
            }),
        })
    }
}
