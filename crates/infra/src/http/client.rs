use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use medisync_common::platform::PlatformInfo;
use reqwest::cookie::Jar;
use reqwest::Client as ReqwestClient;
use tracing::debug;

use super::{HttpError, PreparedRequest, RawResponse};

/// Sends one prepared request and returns whatever came back.
///
/// Implementations must not retry and must not interpret the status: a 500
/// is a successful `execute`. Only failures to obtain a response at all are
/// errors.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &PreparedRequest) -> Result<RawResponse, HttpError>;
}

/// Production transport backed by `reqwest`.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: ReqwestClient,
    timeout: Duration,
}

impl ReqwestTransport {
    /// Start building a new transport.
    pub fn builder() -> ReqwestTransportBuilder {
        ReqwestTransportBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self, HttpError> {
        Self::builder().build()
    }

    /// Transport using the platform's fixed request timeout.
    pub fn for_platform(platform: &PlatformInfo) -> Result<Self, HttpError> {
        Self::builder().timeout(platform.timeout_config().timeout).build()
    }

    /// Timeout applied when the request does not carry its own.
    pub fn default_timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: &PreparedRequest) -> Result<RawResponse, HttpError> {
        let timeout = request.timeout().unwrap_or(self.timeout);
        let method = request.method().clone();
        let url = request.url().clone();

        let mut builder = self
            .client
            .request(method.clone(), url.clone())
            .headers(request.headers().clone())
            .timeout(timeout);
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        debug!(%method, %url, "sending HTTP request");

        let response = builder.send().await.map_err(|err| {
            debug!(%method, %url, error = %err, "HTTP request failed");
            HttpError::from_reqwest(&err, timeout)
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|err| HttpError::from_reqwest(&err, timeout))?;

        debug!(%method, %url, %status, "received HTTP response");
        Ok(RawResponse::new(status, headers, body.to_vec()))
    }
}

/// Builder for [`ReqwestTransport`].
#[derive(Debug)]
pub struct ReqwestTransportBuilder {
    timeout: Duration,
    user_agent: Option<String>,
    default_headers: Option<reqwest::header::HeaderMap>,
    cookie_jar: Option<Arc<Jar>>,
}

impl Default for ReqwestTransportBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            user_agent: None,
            default_headers: None,
            cookie_jar: None,
        }
    }
}

impl ReqwestTransportBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn default_headers(mut self, headers: reqwest::header::HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    /// Share a cookie jar with the transport (the CSRF token lives there).
    pub fn cookie_jar(mut self, jar: Arc<Jar>) -> Self {
        self.cookie_jar = Some(jar);
        self
    }

    pub fn build(self) -> Result<ReqwestTransport, HttpError> {
        let mut builder = ReqwestClient::builder().no_proxy();

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        if let Some(headers) = self.default_headers {
            builder = builder.default_headers(headers);
        }

        if let Some(jar) = self.cookie_jar {
            builder = builder.cookie_provider(jar);
        }

        let client = builder.build().map_err(|err| HttpError::Build(err.to_string()))?;

        Ok(ReqwestTransport { client, timeout: self.timeout })
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use reqwest::{Method, StatusCode};
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn prepared(origin: &str, method: Method, path: &str) -> PreparedRequest {
        PreparedRequest::new(method, Arc::from(origin), path).expect("prepared request")
    }

    #[tokio::test]
    async fn returns_error_statuses_as_responses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/users/profile/"))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({"detail": "down"})))
            .expect(1)
            .mount(&server)
            .await;

        let transport = ReqwestTransport::new().expect("transport");
        let origin = format!("{}/api", server.uri());
        let response =
            transport.execute(&prepared(&origin, Method::GET, "/users/profile/")).await.unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.json_value(), Some(json!({"detail": "down"})));
    }

    #[tokio::test]
    async fn sends_headers_and_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/appointments/"))
            .and(header("authorization", "Bearer t0k"))
            .and(body_json(json!({"doctor": 4})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 9})))
            .expect(1)
            .mount(&server)
            .await;

        let transport = ReqwestTransport::new().expect("transport");
        let origin = format!("{}/api", server.uri());
        let mut request =
            prepared(&origin, Method::POST, "/appointments/").with_json(json!({"doctor": 4}));
        request.set_bearer_token("t0k").unwrap();

        let response = transport.execute(&request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn per_request_timeout_is_enforced() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let transport = ReqwestTransport::new().expect("transport");
        let request = prepared(&server.uri(), Method::GET, "/slow/")
            .with_timeout(Duration::from_millis(50));

        let result = transport.execute(&request).await;
        assert!(matches!(result, Err(HttpError::Timeout(t)) if t == Duration::from_millis(50)));
    }

    #[tokio::test]
    async fn connection_refused_is_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener); // release the port so that requests fail with ECONNREFUSED

        let transport = ReqwestTransport::new().expect("transport");
        let result = transport.execute(&prepared(&format!("http://{addr}"), Method::GET, "/")).await;

        assert!(matches!(result, Err(HttpError::Network(_))), "{result:?}");
    }

    #[test]
    fn platform_timeouts() {
        let mobile = ReqwestTransport::for_platform(&PlatformInfo::native_shell()).unwrap();
        assert_eq!(mobile.default_timeout(), Duration::from_secs(15));

        let web = ReqwestTransport::for_platform(&PlatformInfo::web()).unwrap();
        assert_eq!(web.default_timeout(), Duration::from_secs(10));
    }
}
