use async_trait::async_trait;

use super::{HttpError, PreparedRequest, RequestTrace};

/// Pre-send hook. Runs before every send, re-issues included.
pub trait RequestInterceptor: Send + Sync {
    /// # Errors
    /// An error aborts the request before it reaches the transport.
    fn on_request(&self, request: &mut PreparedRequest) -> Result<(), HttpError>;
}

/// What a response interceptor decided about a failed request.
#[derive(Debug)]
pub enum Recovery {
    /// Send this request instead.
    Retry(PreparedRequest),
    /// Give up with this error (handed to the next interceptor, if any).
    Fail(HttpError),
}

/// Post-receive hook, invoked for transport failures and non-2xx responses.
#[async_trait]
pub trait ResponseInterceptor: Send + Sync {
    async fn on_error(
        &self,
        request: &PreparedRequest,
        error: HttpError,
        trace: &mut RequestTrace,
    ) -> Recovery;
}
