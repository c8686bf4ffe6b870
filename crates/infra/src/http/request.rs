use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use super::HttpError;

/// A request as callers describe it: method, path relative to the active
/// origin, optional JSON body.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Option<Value>,
    timeout: Option<Duration>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), headers: HeaderMap::new(), body: None, timeout: None }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).json(body)
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PUT, path).json(body)
    }

    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PATCH, path).json(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Override the transport's default timeout for this request.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// A request bound to a concrete origin, ready for the transport.
///
/// Interceptors mutate it in place; the client clones it when a response
/// interceptor asks for a re-issue.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    method: Method,
    origin: Arc<str>,
    path: String,
    url: Url,
    headers: HeaderMap,
    body: Option<Value>,
    timeout: Option<Duration>,
    auth_endpoint: bool,
    auth_retried: bool,
}

impl PreparedRequest {
    /// Bind `path` to `origin`.
    ///
    /// A `path` that is already an absolute URL is used as is.
    ///
    /// # Errors
    /// Returns `HttpError::InvalidUrl` if the joined URL does not parse.
    pub fn new(method: Method, origin: Arc<str>, path: &str) -> Result<Self, HttpError> {
        let joined = if path.starts_with("http://") || path.starts_with("https://") {
            path.to_owned()
        } else if path.is_empty() || path.starts_with('/') {
            format!("{origin}{path}")
        } else {
            format!("{origin}/{path}")
        };
        let url = Url::parse(&joined).map_err(|e| HttpError::InvalidUrl(format!("{joined}: {e}")))?;

        Ok(Self {
            method,
            origin,
            path: path.to_owned(),
            url,
            headers: HeaderMap::new(),
            body: None,
            timeout: None,
            auth_endpoint: false,
            auth_retried: false,
        })
    }

    pub(crate) fn from_api(
        request: ApiRequest,
        origin: Arc<str>,
        auth_endpoint: bool,
    ) -> Result<Self, HttpError> {
        let mut prepared = Self::new(request.method, origin, &request.path)?;
        prepared.headers = request.headers;
        prepared.body = request.body;
        prepared.timeout = request.timeout;
        prepared.auth_endpoint = auth_endpoint;
        Ok(prepared)
    }

    #[must_use]
    pub fn with_json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Origin snapshot taken when the request was dispatched.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Login, registration, password and refresh endpoints.
    pub fn is_auth_endpoint(&self) -> bool {
        self.auth_endpoint
    }

    /// Whether this request is already the re-issue after a token refresh.
    pub fn auth_retried(&self) -> bool {
        self.auth_retried
    }

    pub(crate) fn mark_auth_retried(&mut self) {
        self.auth_retried = true;
    }

    /// POST, PUT, PATCH and DELETE.
    pub fn is_unsafe_method(&self) -> bool {
        matches!(self.method, Method::POST | Method::PUT | Method::PATCH | Method::DELETE)
    }

    /// Bearer token currently attached, if any.
    pub fn bearer_token(&self) -> Option<&str> {
        self.headers.get(AUTHORIZATION)?.to_str().ok()?.strip_prefix("Bearer ")
    }

    /// # Errors
    /// Returns `HttpError::InvalidHeader` if the token is not a valid header
    /// value.
    pub fn set_bearer_token(&mut self, token: &str) -> Result<(), HttpError> {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| HttpError::InvalidHeader("authorization".into()))?;
        value.set_sensitive(true);
        self.headers.insert(AUTHORIZATION, value);
        Ok(())
    }
}

/// Response as received from the transport, any status.
#[derive(Debug, Clone)]
pub struct RawResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Vec<u8>) -> Self {
        Self { status, headers, body }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Body decoded as JSON, `None` when empty or not JSON.
    pub fn json_value(&self) -> Option<Value> {
        if self.body.is_empty() {
            return None;
        }
        serde_json::from_slice(&self.body).ok()
    }

    /// Decode the body into `T`; 204 and 205 decode from `null`.
    ///
    /// # Errors
    /// Returns `HttpError::Decode` if the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        if self.status == StatusCode::NO_CONTENT || self.status == StatusCode::RESET_CONTENT {
            return serde_json::from_value(Value::Null).map_err(|_| {
                HttpError::Decode(format!(
                    "No content response ({}), but response type cannot be deserialized from empty body",
                    self.status.as_u16()
                ))
            });
        }
        serde_json::from_slice(&self.body)
            .map_err(|e| HttpError::Decode(format!("Failed to parse response: {e}")))
    }

    /// Turn a non-success response into `HttpError::Status`.
    ///
    /// # Errors
    /// Returns the status error when the response is not 2xx.
    pub fn error_for_status(self, url: &Url) -> Result<Self, HttpError> {
        if self.is_success() {
            return Ok(self);
        }
        Err(HttpError::Status {
            status: self.status.as_u16(),
            url: url.to_string(),
            body: self.json_value(),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn origin() -> Arc<str> {
        Arc::from("http://localhost:8000/api")
    }

    #[test]
    fn test_prepared_url_joins_origin_and_path() {
        let request = PreparedRequest::new(Method::GET, origin(), "/users/profile/").unwrap();
        assert_eq!(request.url().as_str(), "http://localhost:8000/api/users/profile/");

        let relative = PreparedRequest::new(Method::GET, origin(), "appointments/").unwrap();
        assert_eq!(relative.url().as_str(), "http://localhost:8000/api/appointments/");

        let absolute =
            PreparedRequest::new(Method::GET, origin(), "http://10.0.2.2:8000/api/x/").unwrap();
        assert_eq!(absolute.url().host_str(), Some("10.0.2.2"));
    }

    #[test]
    fn test_bearer_token_roundtrip() {
        let mut request = PreparedRequest::new(Method::GET, origin(), "/x/").unwrap();
        assert_eq!(request.bearer_token(), None);

        request.set_bearer_token("abc").unwrap();
        assert_eq!(request.bearer_token(), Some("abc"));
        assert!(request.set_bearer_token("bad\ntoken").is_err());
    }

    #[test]
    fn test_unsafe_methods() {
        for (method, unsafe_method) in [
            (Method::GET, false),
            (Method::HEAD, false),
            (Method::POST, true),
            (Method::PUT, true),
            (Method::PATCH, true),
            (Method::DELETE, true),
        ] {
            let request = PreparedRequest::new(method.clone(), origin(), "/x/").unwrap();
            assert_eq!(request.is_unsafe_method(), unsafe_method, "{method}");
        }
    }

    #[test]
    fn test_no_content_decodes_from_null() {
        let response = RawResponse::new(StatusCode::NO_CONTENT, HeaderMap::new(), Vec::new());
        let value: Option<Value> = response.json().unwrap();
        assert_eq!(value, None);

        response.json::<()>().unwrap();
    }

    #[test]
    fn test_error_for_status_keeps_body() {
        let url = Url::parse("http://localhost:8000/api/x/").unwrap();
        let response = RawResponse::new(
            StatusCode::FORBIDDEN,
            HeaderMap::new(),
            serde_json::to_vec(&json!({"detail": "nope"})).unwrap(),
        );

        let error = response.error_for_status(&url).unwrap_err();
        assert_eq!(error.status(), Some(403));
        assert_eq!(error.body(), Some(&json!({"detail": "nope"})));
    }
}
