use reqwest::cookie::{CookieStore, Jar};
use tracing::{info, warn};
use url::Url;

use crate::storage::{SessionStore, API_BASE_URL_KEY};

/// Navigation hook invoked once the session is gone.
pub trait LoginRedirect: Send + Sync {
    fn redirect_to_login(&self, path: &str);
}

/// Redirect that only logs; for hosts without navigation.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogRedirect;

impl LoginRedirect for LogRedirect {
    fn redirect_to_login(&self, path: &str) {
        info!(path, "Session ended, login required");
    }
}

/// Read access to cookies set by the backend (the CSRF token).
pub trait CookieSource: Send + Sync {
    fn cookie(&self, url: &Url, name: &str) -> Option<String>;
}

impl CookieSource for Jar {
    fn cookie(&self, url: &Url, name: &str) -> Option<String> {
        let header = self.cookies(url)?;
        let header = header.to_str().ok()?;
        header.split(';').map(str::trim).find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            (key == name).then(|| value.to_owned())
        })
    }
}

/// End the session on user request.
///
/// Clears the tokens, the user blob and the endpoint override (the next boot
/// re-optimizes), then redirects. Storage failures are logged and never stop
/// the redirect.
pub fn perform_logout(store: &dyn SessionStore, redirect: &dyn LoginRedirect, login_path: &str) {
    if let Err(err) = store.clear_session() {
        warn!(error = %err, "Failed to clear session during logout");
    }
    if let Err(err) = store.remove(API_BASE_URL_KEY) {
        warn!(error = %err, "Failed to clear endpoint override during logout");
    }
    info!("User logged out");
    redirect.redirect_to_login(login_path);
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::storage::{MemoryStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY};

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl LoginRedirect for Recorder {
        fn redirect_to_login(&self, path: &str) {
            self.0.lock().push(path.to_owned());
        }
    }

    #[test]
    fn test_logout_clears_everything_then_redirects() {
        let store = MemoryStore::with_entries([
            (ACCESS_TOKEN_KEY, "a"),
            (REFRESH_TOKEN_KEY, "r"),
            (USER_KEY, "{\"id\":1}"),
            (API_BASE_URL_KEY, "http://10.0.2.2:8000/api"),
        ]);
        let redirect = Recorder::default();

        perform_logout(&store, &redirect, "/login");

        assert!(store.is_empty());
        assert_eq!(*redirect.0.lock(), vec!["/login".to_string()]);
    }

    #[test]
    fn test_jar_cookie_lookup() {
        let jar = Jar::default();
        let url = Url::parse("http://localhost:8000/api/").unwrap();
        jar.add_cookie_str("sessionid=s1; Path=/", &url);
        jar.add_cookie_str("csrftoken=c5rf; Path=/", &url);

        assert_eq!(jar.cookie(&url, "csrftoken").as_deref(), Some("c5rf"));
        assert_eq!(jar.cookie(&url, "missing"), None);

        let other = Url::parse("http://example.org/").unwrap();
        assert_eq!(jar.cookie(&other, "csrftoken"), None);
    }
}
