use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

/// The origin every request is sent to.
///
/// Readers take an `Arc<str>` snapshot per dispatch and never hold the lock
/// across an await; writers swap the whole value, so a reader sees either
/// the old origin or the new one, never a mix.
#[derive(Clone)]
pub struct ActiveBaseUrl {
    current: Arc<RwLock<Arc<str>>>,
}

impl ActiveBaseUrl {
    pub fn new(url: impl AsRef<str>) -> Self {
        Self { current: Arc::new(RwLock::new(Arc::from(url.as_ref()))) }
    }

    pub fn get(&self) -> Arc<str> {
        Arc::clone(&self.current.read())
    }

    /// Swap in `url`, returning the previous origin.
    pub fn replace(&self, url: impl AsRef<str>) -> Arc<str> {
        std::mem::replace(&mut *self.current.write(), Arc::from(url.as_ref()))
    }
}

impl fmt::Debug for ActiveBaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ActiveBaseUrl").field(&self.get()).finish()
    }
}
