//! Subscriber registry.
//!
//! Tracks which listeners care about which cache key so that writes and
//! invalidations reach every live consumer of that key.

use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use tracing::{trace, warn};

use super::key::CacheKey;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "query::subscribers";

/// Zero-argument notification callback.
pub type Listener = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// Maps cache keys to their listeners, in subscription order.
///
/// Notification snapshots the listener list and releases the lock before any
/// callback runs, so a callback may subscribe, unsubscribe, or write to the
/// store without deadlocking. A listener removed after the snapshot was taken
/// can still observe that one notification.
pub struct SubscriberRegistry {
    next_id: AtomicU64,
    listeners: RwLock<HashMap<CacheKey, Vec<(SubscriberId, Listener)>>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            listeners: RwLock::new(HashMap::new()),
        }
    }

    /// Register `listener` for `key`; dropping the returned guard unsubscribes.
    pub fn subscribe(self: &Arc<Self>, key: CacheKey, listener: Listener) -> Subscription {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        rw_write(&self.listeners, SOURCE, "subscribe")
            .entry(key.clone())
            .or_default()
            .push((id, listener));

        trace!(key = %key, subscriber = id.0, "Listener subscribed");

        Subscription {
            registry: Arc::downgrade(self),
            key,
            id,
            active: true,
        }
    }

    /// Remove one listener; the key disappears with its last listener.
    fn unsubscribe(&self, key: &CacheKey, id: SubscriberId) -> bool {
        let mut listeners = rw_write(&self.listeners, SOURCE, "unsubscribe");
        let Some(set) = listeners.get_mut(key) else {
            return false;
        };

        let before = set.len();
        set.retain(|(existing, _)| *existing != id);
        let removed = set.len() != before;
        if set.is_empty() {
            listeners.remove(key);
        }

        trace!(key = %key, subscriber = id.0, removed, "Listener unsubscribed");
        removed
    }

    /// Invoke every listener of `key`. Returns how many were called.
    pub fn notify(&self, key: &CacheKey) -> usize {
        let snapshot: Vec<Listener> = rw_read(&self.listeners, SOURCE, "notify")
            .get(key)
            .map(|set| set.iter().map(|(_, listener)| Arc::clone(listener)).collect())
            .unwrap_or_default();

        invoke_all(key, &snapshot)
    }

    /// Invoke every listener of every key.
    pub fn notify_all(&self) -> usize {
        let snapshot: Vec<(CacheKey, Vec<Listener>)> =
            rw_read(&self.listeners, SOURCE, "notify_all")
                .iter()
                .map(|(key, set)| {
                    (
                        key.clone(),
                        set.iter().map(|(_, listener)| Arc::clone(listener)).collect(),
                    )
                })
                .collect();

        snapshot
            .iter()
            .map(|(key, listeners)| invoke_all(key, listeners))
            .sum()
    }

    pub fn subscriber_count(&self, key: &CacheKey) -> usize {
        rw_read(&self.listeners, SOURCE, "subscriber_count")
            .get(key)
            .map_or(0, Vec::len)
    }

    /// Number of keys with at least one listener.
    pub fn key_count(&self) -> usize {
        rw_read(&self.listeners, SOURCE, "key_count").len()
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("keys", &self.key_count())
            .finish()
    }
}

fn invoke_all(key: &CacheKey, listeners: &[Listener]) -> usize {
    for listener in listeners {
        if catch_unwind(AssertUnwindSafe(|| listener())).is_err() {
            warn!(key = %key, "Query listener panicked during notification");
        }
    }
    listeners.len()
}

/// Guard for one registered listener.
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    registry: Weak<SubscriberRegistry>,
    key: CacheKey,
    id: SubscriberId,
    active: bool,
}

impl Subscription {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !std::mem::replace(&mut self.active, false) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.unsubscribe(&self.key, self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("id", &self.id)
            .field("active", &self.active)
            .finish()
    }
}
