//! Session storage
//!
//! Key-value persistence for the authentication session and the endpoint
//! override. The client only reads and writes the keys it needs; tokens are
//! opaque strings.
//!
//! Two stores are provided:
//! - [`MemoryStore`]: process-local map, used by tests and embedding hosts
//! - [`FileStore`]: JSON map on disk, rewritten atomically on every change

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;
use thiserror::Error;

/// Short-lived bearer credential.
pub const ACCESS_TOKEN_KEY: &str = "access_token";
/// Long-lived credential exchanged for a new access token.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
/// Serialized current-user blob.
pub const USER_KEY: &str = "user";
/// Persisted active base URL override.
pub const API_BASE_URL_KEY: &str = "API_BASE_URL";

/// Keys discarded when the session ends.
pub const SESSION_KEYS: [&str; 3] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY];

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage file is not a valid JSON map: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Key-value store holding the session.
///
/// Reads never fail: a key that cannot be read is treated as absent.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Remove the access token, refresh token and user blob.
    ///
    /// Every key is attempted even if an earlier removal fails; the first
    /// error is returned.
    fn clear_session(&self) -> Result<(), StorageError> {
        let mut first_error = None;
        for key in SESSION_KEYS {
            if let Err(err) = self.remove(key) {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
