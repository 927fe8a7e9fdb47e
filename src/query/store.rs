//! Cache store.
//!
//! Single source of truth for fetched data. Values are type-erased so that
//! one store can hold every resource the dashboard reads.

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use metrics::counter;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::error::QueryError;
use super::key::CacheKey;
use super::lock::{rw_read, rw_write};
use super::subscribers::SubscriberRegistry;

const SOURCE: &str = "query::store";

pub const METRIC_CACHE_HIT: &str = "syndicate_query_cache_hit_total";
pub const METRIC_CACHE_MISS: &str = "syndicate_query_cache_miss_total";
pub const METRIC_CACHE_STALE: &str = "syndicate_query_cache_stale_total";
pub const METRIC_INVALIDATED: &str = "syndicate_query_invalidated_total";

type ErasedValue = Arc<dyn Any + Send + Sync>;

struct StoredEntry {
    value: Option<ErasedValue>,
    type_name: &'static str,
    stored_at: Instant,
    error: Option<QueryError>,
}

/// Typed copy of one stored entry.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: Option<T>,
    pub stored_at: Instant,
    pub error: Option<QueryError>,
}

impl<T> CacheEntry<T> {
    /// Fresh while strictly less than `ttl` has elapsed since storage.
    pub fn is_fresh_at(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.stored_at) < ttl
    }

    pub fn age(&self) -> Duration {
        self.stored_at.elapsed()
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Reshape the stored value into a binding result.
    pub fn into_result(self) -> Result<T, QueryError> {
        match (self.value, self.error) {
            (_, Some(err)) => Err(err),
            (Some(value), None) => Ok(value),
            (None, None) => Err(QueryError::failed("cache entry holds no value")),
        }
    }
}

/// Key → entry map plus the registry used to announce changes.
pub struct CacheStore {
    entries: RwLock<HashMap<CacheKey, StoredEntry>>,
    subscribers: Arc<SubscriberRegistry>,
    ttl: Duration,
}

impl CacheStore {
    pub fn new(ttl: Duration, subscribers: Arc<SubscriberRegistry>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            subscribers,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn subscribers(&self) -> &Arc<SubscriberRegistry> {
        &self.subscribers
    }

    /// Typed read. An entry stored under a different type reads as absent.
    pub fn get<T>(&self, key: &CacheKey) -> Option<CacheEntry<T>>
    where
        T: Clone + Send + Sync + 'static,
    {
        let entries = rw_read(&self.entries, SOURCE, "get");
        let stored = entries.get(key)?;

        let value = match &stored.value {
            Some(erased) => match erased.downcast_ref::<T>() {
                Some(value) => Some(value.clone()),
                None => {
                    warn!(
                        key = %key,
                        stored_type = stored.type_name,
                        requested_type = type_name::<T>(),
                        "Cache entry type mismatch; treating as absent"
                    );
                    return None;
                }
            },
            None => None,
        };

        Some(CacheEntry {
            value,
            stored_at: stored.stored_at,
            error: stored.error.clone(),
        })
    }

    /// Read an entry only if it is still fresh, recording hit/miss metrics.
    pub fn get_fresh<T>(&self, key: &CacheKey) -> Option<CacheEntry<T>>
    where
        T: Clone + Send + Sync + 'static,
    {
        match self.get::<T>(key) {
            Some(entry) if self.is_fresh(&entry) => {
                counter!(METRIC_CACHE_HIT).increment(1);
                Some(entry)
            }
            Some(_) => {
                counter!(METRIC_CACHE_STALE).increment(1);
                None
            }
            None => {
                counter!(METRIC_CACHE_MISS).increment(1);
                None
            }
        }
    }

    pub fn is_fresh<T>(&self, entry: &CacheEntry<T>) -> bool {
        entry.is_fresh_at(Instant::now(), self.ttl)
    }

    /// Store a value and notify the listeners of `key`.
    pub fn set<T>(&self, key: &CacheKey, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.write(
            key,
            StoredEntry {
                value: Some(Arc::new(value)),
                type_name: type_name::<T>(),
                stored_at: Instant::now(),
                error: None,
            },
        );
    }

    /// Store a failed fetch and notify the listeners of `key`.
    pub fn set_error(&self, key: &CacheKey, error: QueryError) {
        self.write(
            key,
            StoredEntry {
                value: None,
                type_name: "error",
                stored_at: Instant::now(),
                error: Some(error),
            },
        );
    }

    fn write(&self, key: &CacheKey, entry: StoredEntry) {
        let is_error = entry.error.is_some();
        rw_write(&self.entries, SOURCE, "set").insert(key.clone(), entry);
        debug!(key = %key, is_error, "Cache entry stored");
        self.subscribers.notify(key);
    }

    /// Remove entries and notify.
    ///
    /// `None` clears the whole store and notifies every listener of every
    /// key. `Some(prefix)` removes each key that starts with `prefix` and
    /// notifies the listeners of the removed keys only. Returns the removed
    /// keys.
    pub fn invalidate(&self, prefix: Option<&CacheKey>) -> Vec<CacheKey> {
        let removed: Vec<CacheKey> = {
            let mut entries = rw_write(&self.entries, SOURCE, "invalidate");
            match prefix {
                None => entries.drain().map(|(key, _)| key).collect(),
                Some(prefix) => {
                    let matching: Vec<CacheKey> = entries
                        .keys()
                        .filter(|key| key.starts_with(prefix))
                        .cloned()
                        .collect();
                    for key in &matching {
                        entries.remove(key);
                    }
                    matching
                }
            }
        };

        counter!(METRIC_INVALIDATED).increment(removed.len() as u64);

        let notified = match prefix {
            None => self.subscribers.notify_all(),
            Some(_) => removed.iter().map(|key| self.subscribers.notify(key)).sum(),
        };

        debug!(
            prefix = ?prefix.map(ToString::to_string),
            removed = removed.len(),
            notified,
            "Cache invalidated"
        );

        removed
    }

    /// Remove one entry without notifying anyone.
    pub fn remove(&self, key: &CacheKey) -> bool {
        rw_write(&self.entries, SOURCE, "remove")
            .remove(key)
            .is_some()
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        rw_read(&self.entries, SOURCE, "contains").contains_key(key)
    }

    pub fn keys(&self) -> Vec<CacheKey> {
        let mut keys: Vec<CacheKey> = rw_read(&self.entries, SOURCE, "keys")
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheStore")
            .field("entries", &self.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}
