use std::sync::Arc;

use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION};
use tracing::debug;

use super::CookieSource;
use crate::config::AuthConfig;
use crate::http::{HttpError, PreparedRequest, RequestInterceptor};
use crate::storage::{SessionStore, ACCESS_TOKEN_KEY};

/// Attaches the stored access token and, on unsafe methods, the CSRF cookie.
pub struct BearerTokenInterceptor {
    store: Arc<dyn SessionStore>,
    cookies: Option<Arc<dyn CookieSource>>,
    csrf_cookie: String,
    csrf_header: HeaderName,
}

impl BearerTokenInterceptor {
    /// # Errors
    /// Returns `HttpError::InvalidHeader` if the configured CSRF header name is
    /// not a valid header name.
    pub fn new(store: Arc<dyn SessionStore>, config: &AuthConfig) -> Result<Self, HttpError> {
        let csrf_header = HeaderName::from_bytes(config.csrf_header.as_bytes())
            .map_err(|_| HttpError::InvalidHeader(config.csrf_header.clone()))?;
        Ok(Self { store, cookies: None, csrf_cookie: config.csrf_cookie.clone(), csrf_header })
    }

    #[must_use]
    pub fn with_cookies(mut self, cookies: Arc<dyn CookieSource>) -> Self {
        self.cookies = Some(cookies);
        self
    }

    fn attach_csrf(&self, request: &mut PreparedRequest) -> Result<(), HttpError> {
        let Some(cookies) = &self.cookies else {
            return Ok(());
        };
        let Some(token) = cookies.cookie(request.url(), &self.csrf_cookie) else {
            return Ok(());
        };

        let value = HeaderValue::from_str(&token)
            .map_err(|_| HttpError::InvalidHeader(self.csrf_header.to_string()))?;
        request.headers_mut().insert(self.csrf_header.clone(), value);
        Ok(())
    }
}

impl RequestInterceptor for BearerTokenInterceptor {
    fn on_request(&self, request: &mut PreparedRequest) -> Result<(), HttpError> {
        if request.is_auth_endpoint() {
            debug!(path = request.path(), "Skipping auth header for auth endpoint");
            request.headers_mut().remove(AUTHORIZATION);
        } else if let Some(token) = self.store.get(ACCESS_TOKEN_KEY) {
            request.set_bearer_token(&token)?;
        } else {
            debug!(path = request.path(), "No access token found for request");
        }

        if request.is_unsafe_method() {
            self.attach_csrf(request)?;
        }
        Ok(())
    }
}
