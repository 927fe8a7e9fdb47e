use std::fmt;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::query::lock::{rw_read, rw_write};

const SOURCE: &str = "api::tokens";

/// Shared in-memory bearer token.
///
/// Clones observe the same token, so a client built before login sees the
/// token set afterwards.
#[derive(Clone, Default)]
pub struct TokenStore {
    token: Arc<RwLock<Option<String>>>,
}

impl TokenStore {
    pub fn new(token: Option<String>) -> Self {
        let store = Self::default();
        if let Some(token) = token {
            store.set(token);
        }
        store
    }

    /// Blank tokens are treated as a logout.
    pub fn set(&self, token: impl Into<String>) {
        let token = token.into();
        let trimmed = token.trim();
        if trimmed.is_empty() {
            self.clear();
            return;
        }
        *rw_write(&self.token, SOURCE, "set") = Some(trimmed.to_string());
        debug!("API token stored");
    }

    pub fn get(&self) -> Option<String> {
        rw_read(&self.token, SOURCE, "get").clone()
    }

    pub fn clear(&self) {
        rw_write(&self.token, SOURCE, "clear").take();
    }

    pub fn is_set(&self) -> bool {
        rw_read(&self.token, SOURCE, "is_set").is_some()
    }
}

impl fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenStore")
            .field("token", &self.is_set().then_some("<redacted>"))
            .finish()
    }
}
