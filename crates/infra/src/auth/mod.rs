//! Session authentication
//!
//! Bearer-token attachment, the one-shot 401 refresh-and-retry path and the
//! logout flow. Tokens are opaque strings read from and written to the
//! [`SessionStore`](crate::storage::SessionStore); they are never logged.

mod bearer;
mod refresh;
mod session;

pub use bearer::BearerTokenInterceptor;
pub use refresh::TokenRefreshInterceptor;
pub use session::{perform_logout, CookieSource, LogRedirect, LoginRedirect};
