//! Query bindings.
//!
//! A [`QueryBinding`] ties one consumer to one cache key. It serves fresh
//! entries from the store, fetches when the entry is stale or absent, and
//! follows invalidations announced through the subscriber registry.

use std::fmt;
use std::sync::{Arc, Mutex, Weak};
use std::time::Instant as WallInstant;

use futures::future::BoxFuture;
use metrics::{counter, histogram};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::client::QueryClient;
use super::error::QueryError;
use super::key::CacheKey;
use super::lock::mutex_lock;
use super::retry::RetryPolicy;
use super::store::CacheEntry;
use super::subscribers::{Listener, Subscription};

const SOURCE: &str = "query::binding";

pub const METRIC_FETCH_MS: &str = "syndicate_query_fetch_ms";
pub const METRIC_FETCH_DISCARDED: &str = "syndicate_query_fetch_discarded_total";

pub type FetchFuture<T> = BoxFuture<'static, Result<T, QueryError>>;
pub type Fetcher<T> = Arc<dyn Fn() -> FetchFuture<T> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// No key, disabled, or never activated.
    Idle,
    Fetching,
    Ready,
    Errored,
}

/// Local view of a binding, mirrored from the cache entry of its key.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<T> {
    pub data: Option<T>,
    pub is_loading: bool,
    pub error: Option<QueryError>,
    pub status: QueryStatus,
}

impl<T> QueryState<T> {
    pub fn idle() -> Self {
        Self {
            data: None,
            is_loading: false,
            error: None,
            status: QueryStatus::Idle,
        }
    }

    fn ready(data: T) -> Self {
        Self {
            data: Some(data),
            is_loading: false,
            error: None,
            status: QueryStatus::Ready,
        }
    }

    fn errored(error: QueryError) -> Self {
        Self {
            data: None,
            is_loading: false,
            error: Some(error),
            status: QueryStatus::Errored,
        }
    }

    fn from_entry(entry: CacheEntry<T>) -> Self {
        match entry.into_result() {
            Ok(data) => Self::ready(data),
            Err(error) => Self::errored(error),
        }
    }

    /// True once the binding has settled into Ready or Errored.
    pub fn is_settled(&self) -> bool {
        matches!(self.status, QueryStatus::Ready | QueryStatus::Errored)
    }
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self::idle()
    }
}

#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// A disabled binding never fetches and stays Idle.
    pub enabled: bool,
    /// Overrides the client's retry policy for this binding.
    pub retry: Option<RetryPolicy>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self {
            enabled: true,
            retry: None,
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// One consumer's live subscription to one cache key.
///
/// Dropping the binding deactivates it: its listener is removed and any
/// fetch still in flight is discarded instead of being written to the store.
pub struct QueryBinding<T> {
    inner: Arc<BindingInner<T>>,
}

struct BindingInner<T> {
    client: QueryClient,
    fetcher: Fetcher<T>,
    retry: RetryPolicy,
    slot: Mutex<Slot>,
    state: watch::Sender<QueryState<T>>,
}

struct Slot {
    key: Option<CacheKey>,
    enabled: bool,
    active: bool,
    /// Bumped on every (re)subscription; listeners and fetches carry the
    /// generation they were started under.
    generation: u64,
    /// Latest fetch ticket within the current generation.
    fetch_seq: u64,
    subscription: Option<Subscription>,
    runtime: Option<Handle>,
}

impl<T> QueryBinding<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(
        client: QueryClient,
        key: Option<CacheKey>,
        fetcher: Fetcher<T>,
        options: QueryOptions,
    ) -> Self {
        let retry = options
            .retry
            .unwrap_or_else(|| client.config().retry_policy());
        let (state, _) = watch::channel(QueryState::idle());

        Self {
            inner: Arc::new(BindingInner {
                client,
                fetcher,
                retry,
                slot: Mutex::new(Slot {
                    key,
                    enabled: options.enabled,
                    active: false,
                    generation: 0,
                    fetch_seq: 0,
                    subscription: None,
                    runtime: None,
                }),
                state,
            }),
        }
    }

    /// Start following the key: subscribe, then serve from cache or fetch.
    pub async fn activate(&self) {
        let newly_active = {
            let mut slot = mutex_lock(&self.inner.slot, SOURCE, "activate");
            slot.runtime = Handle::try_current().ok();
            !std::mem::replace(&mut slot.active, true)
        };
        if newly_active {
            self.inner.resubscribe();
        }
        self.inner.check().await;
    }

    /// Stop following the key. The last published state is kept.
    pub fn deactivate(&self) {
        self.inner.detach();
    }

    /// Point the binding at another key (or none).
    pub async fn set_key(&self, key: Option<CacheKey>) {
        let active = {
            let mut slot = mutex_lock(&self.inner.slot, SOURCE, "set_key");
            if slot.key == key {
                return;
            }
            slot.key = key;
            slot.active
        };
        self.inner.publish(QueryState::idle());
        if active {
            self.inner.resubscribe();
            self.inner.check().await;
        }
    }

    pub async fn set_enabled(&self, enabled: bool) {
        let active = {
            let mut slot = mutex_lock(&self.inner.slot, SOURCE, "set_enabled");
            if slot.enabled == enabled {
                return;
            }
            slot.enabled = enabled;
            slot.active
        };
        if !enabled {
            self.inner.publish(QueryState::idle());
        }
        if active {
            self.inner.resubscribe();
            self.inner.check().await;
        }
    }

    /// Fetch regardless of freshness. A no-op while idle.
    pub async fn refetch(&self) {
        match self.inner.target() {
            Some((key, generation)) => self.inner.fetch(key, generation).await,
            None => debug!("Refetch ignored for idle query binding"),
        }
    }

    pub fn state(&self) -> QueryState<T> {
        self.inner.state.borrow().clone()
    }

    pub fn data(&self) -> Option<T> {
        self.inner.state.borrow().data.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().is_loading
    }

    pub fn error(&self) -> Option<QueryError> {
        self.inner.state.borrow().error.clone()
    }

    pub fn status(&self) -> QueryStatus {
        self.inner.state.borrow().status
    }

    /// Receiver that observes every state the binding publishes.
    pub fn watch(&self) -> watch::Receiver<QueryState<T>> {
        self.inner.state.subscribe()
    }

    pub fn key(&self) -> Option<CacheKey> {
        mutex_lock(&self.inner.slot, SOURCE, "key").key.clone()
    }

    pub fn is_active(&self) -> bool {
        mutex_lock(&self.inner.slot, SOURCE, "is_active").active
    }
}

impl<T> Drop for QueryBinding<T> {
    fn drop(&mut self) {
        self.inner.detach();
    }
}

impl<T> fmt::Debug for QueryBinding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = mutex_lock(&self.inner.slot, SOURCE, "debug");
        f.debug_struct("QueryBinding")
            .field("key", &slot.key)
            .field("enabled", &slot.enabled)
            .field("active", &slot.active)
            .field("generation", &slot.generation)
            .finish()
    }
}

impl<T> BindingInner<T> {
    fn detach(&self) {
        let released = {
            let mut slot = mutex_lock(&self.slot, SOURCE, "detach");
            slot.active = false;
            slot.runtime = None;
            slot.generation += 1;
            slot.subscription.take()
        };
        drop(released);
    }

    fn publish(&self, state: QueryState<T>) {
        self.state.send_replace(state);
    }

    /// Current key and generation, if the binding may fetch.
    fn target(&self) -> Option<(CacheKey, u64)> {
        let slot = mutex_lock(&self.slot, SOURCE, "target");
        if !(slot.active && slot.enabled) {
            return None;
        }
        slot.key.clone().map(|key| (key, slot.generation))
    }

    fn is_current(&self, generation: u64, seq: u64) -> bool {
        let slot = mutex_lock(&self.slot, SOURCE, "is_current");
        slot.generation == generation && slot.fetch_seq == seq
    }
}

impl<T> BindingInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Replace the subscription for the current key and start a new generation.
    fn resubscribe(self: &Arc<Self>) {
        let released = {
            let mut slot = mutex_lock(&self.slot, SOURCE, "resubscribe");
            slot.generation += 1;
            let released = slot.subscription.take();

            if slot.active && slot.enabled {
                if let Some(key) = slot.key.clone() {
                    let generation = slot.generation;
                    let weak: Weak<Self> = Arc::downgrade(self);
                    let listener: Listener = Arc::new(move || {
                        if let Some(inner) = weak.upgrade() {
                            inner.on_notify(generation);
                        }
                    });
                    slot.subscription = Some(self.client.subscribers().subscribe(key, listener));
                }
            }
            released
        };
        drop(released);
    }

    async fn check(self: &Arc<Self>) {
        let Some((key, generation)) = self.target() else {
            self.publish(QueryState::idle());
            return;
        };

        match self.client.store().get_fresh::<T>(&key) {
            Some(entry) => self.publish(QueryState::from_entry(entry)),
            None => self.fetch(key, generation).await,
        }
    }

    async fn fetch(self: &Arc<Self>, key: CacheKey, generation: u64) {
        let seq = {
            let mut slot = mutex_lock(&self.slot, SOURCE, "fetch.begin");
            if slot.generation != generation {
                return;
            }
            slot.fetch_seq += 1;
            slot.fetch_seq
        };

        self.state.send_modify(|state| {
            state.is_loading = true;
            state.status = QueryStatus::Fetching;
        });
        let mut pending = PendingFetch {
            inner: &**self,
            generation,
            seq,
            settled: false,
        };

        let started_at = WallInstant::now();
        let fetcher = Arc::clone(&self.fetcher);
        let result = self.retry.run(|| fetcher()).await;
        histogram!(METRIC_FETCH_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);
        pending.settled = true;

        if !self.is_current(generation, seq) {
            counter!(METRIC_FETCH_DISCARDED).increment(1);
            debug!(key = %key, generation, seq, "Discarded superseded fetch result");
            return;
        }

        // Writing notifies our own listener, which may already start a newer fetch.
        let store = self.client.store();
        match result {
            Ok(value) => {
                store.set(&key, value.clone());
                if self.is_current(generation, seq) {
                    self.publish(QueryState::ready(value));
                }
            }
            Err(error) => {
                warn!(key = %key, error = %error, "Query fetch failed");
                store.set_error(&key, error.clone());
                if self.is_current(generation, seq) {
                    self.publish(QueryState::errored(error));
                }
            }
        }
    }

    /// Listener body: re-derive from the store after a write or invalidation.
    fn on_notify(self: &Arc<Self>, generation: u64) {
        let Some((key, current)) = self.target() else {
            return;
        };
        if current != generation {
            return;
        }

        // A present entry was just written, so it is adopted even when the
        // TTL already marks it stale. Only a removed entry is refetched.
        match self.client.store().get::<T>(&key) {
            Some(entry) => self.publish(QueryState::from_entry(entry)),
            None => self.spawn_fetch(key, generation),
        }
    }

    fn spawn_fetch(self: &Arc<Self>, key: CacheKey, generation: u64) {
        let runtime = mutex_lock(&self.slot, SOURCE, "spawn_fetch")
            .runtime
            .clone()
            .or_else(|| Handle::try_current().ok());

        match runtime {
            Some(handle) => {
                let inner = Arc::clone(self);
                handle.spawn(async move {
                    inner.fetch(key, generation).await;
                });
            }
            None => warn!(
                key = %key,
                "No async runtime for query refetch; state refreshes on next activation"
            ),
        }
    }
}

/// Clears the loading flag of a fetch that was dropped before it settled.
struct PendingFetch<'a, T> {
    inner: &'a BindingInner<T>,
    generation: u64,
    seq: u64,
    settled: bool,
}

impl<T> Drop for PendingFetch<'_, T> {
    fn drop(&mut self) {
        if self.settled || !self.inner.is_current(self.generation, self.seq) {
            return;
        }
        debug!(
            generation = self.generation,
            seq = self.seq,
            "Query fetch dropped before completion"
        );
        self.inner.state.send_modify(|state| {
            state.is_loading = false;
            state.status = if state.error.is_some() {
                QueryStatus::Errored
            } else if state.data.is_some() {
                QueryStatus::Ready
            } else {
                QueryStatus::Idle
            };
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::query::config::QueryConfig;

    fn counting_fetcher(
        calls: &Arc<AtomicUsize>,
        value: &'static str,
    ) -> impl Fn() -> futures::future::Ready<Result<String, QueryError>> + Send + Sync + 'static
    {
        let calls = Arc::clone(calls);
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            futures::future::ready(Ok(value.to_string()))
        }
    }

    #[tokio::test]
    async fn absent_key_fetches_once_and_becomes_ready() {
        let client = QueryClient::new(QueryConfig::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let binding = client.query(
            CacheKey::from(["newsletters", "1"]),
            counting_fetcher(&calls, "first"),
        );

        assert_eq!(binding.status(), QueryStatus::Idle);
        binding.activate().await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let state = binding.state();
        assert_eq!(state.status, QueryStatus::Ready);
        assert_eq!(state.data.as_deref(), Some("first"));
        assert!(!state.is_loading);
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn disabled_binding_stays_idle() {
        let client = QueryClient::new(QueryConfig::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let binding = client.query_with(
            CacheKey::from(["newsletters"]),
            counting_fetcher(&calls, "x"),
            QueryOptions::new().enabled(false),
        );

        binding.activate().await;
        binding.refetch().await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(binding.state(), QueryState::idle());
        assert_eq!(client.subscribers().key_count(), 0);
    }

    #[tokio::test]
    async fn missing_key_stays_idle() {
        let client = QueryClient::new(QueryConfig::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let binding = client.query(None::<CacheKey>, counting_fetcher(&calls, "x"));

        binding.activate().await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(binding.status(), QueryStatus::Idle);
    }

    #[tokio::test]
    async fn enabling_later_triggers_fetch() {
        let client = QueryClient::new(QueryConfig::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let binding = client.query_with(
            CacheKey::from(["subscribers"]),
            counting_fetcher(&calls, "list"),
            QueryOptions::new().enabled(false),
        );

        binding.activate().await;
        binding.set_enabled(true).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(binding.data().as_deref(), Some("list"));
        assert_eq!(client.subscribers().key_count(), 1);
    }

    #[tokio::test]
    async fn errored_fetch_is_stored_for_all_bindings() {
        let client = QueryClient::new(QueryConfig::default());
        let key = CacheKey::from(["analytics", "dashboard"]);
        let binding = client.query(key.clone(), || async {
            Err::<String, _>(QueryError::status(500, "database unavailable"))
        });

        binding.activate().await;

        let state = binding.state();
        assert_eq!(state.status, QueryStatus::Errored);
        assert!(state.data.is_none());
        assert_eq!(state.error, Some(QueryError::status(500, "database unavailable")));

        let calls = Arc::new(AtomicUsize::new(0));
        let second = client.query(key, counting_fetcher(&calls, "unused"));
        second.activate().await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(second.status(), QueryStatus::Errored);
    }

    #[tokio::test]
    async fn refetch_ignores_freshness() {
        let client = QueryClient::new(QueryConfig::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let binding = client.query(CacheKey::from(["newsletters"]), counting_fetcher(&calls, "v"));

        binding.activate().await;
        binding.refetch().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn key_change_moves_subscription() {
        let client = QueryClient::new(QueryConfig::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let first = CacheKey::from(["newsletters", "1"]);
        let second = CacheKey::from(["newsletters", "2"]);
        let binding = client.query(first.clone(), counting_fetcher(&calls, "v"));

        binding.activate().await;
        binding.set_key(Some(second.clone())).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(client.subscribers().subscriber_count(&first), 0);
        assert_eq!(client.subscribers().subscriber_count(&second), 1);
        assert_eq!(binding.key(), Some(second));
    }

    #[tokio::test]
    async fn dropping_binding_unsubscribes() {
        let client = QueryClient::new(QueryConfig::default());
        let key = CacheKey::from(["newsletters"]);
        let calls = Arc::new(AtomicUsize::new(0));
        let binding = client.query(key.clone(), counting_fetcher(&calls, "v"));

        binding.activate().await;
        assert_eq!(client.subscribers().subscriber_count(&key), 1);
        drop(binding);
        assert_eq!(client.subscribers().subscriber_count(&key), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_entry_is_refetched_on_activation() {
        let client = QueryClient::new(QueryConfig::default().with_ttl(Duration::from_secs(60)));
        let key = CacheKey::from(["newsletters"]);
        let calls = Arc::new(AtomicUsize::new(0));

        let first = client.query(key.clone(), counting_fetcher(&calls, "v"));
        first.activate().await;
        drop(first);

        tokio::time::advance(Duration::from_secs(59)).await;
        let fresh = client.query(key.clone(), counting_fetcher(&calls, "v"));
        fresh.activate().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        drop(fresh);

        tokio::time::advance(Duration::from_secs(2)).await;
        let stale = client.query(key, counting_fetcher(&calls, "v"));
        stale.activate().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_ttl_fetches_once_per_activation() {
        let client = QueryClient::new(QueryConfig::default().with_ttl(Duration::ZERO));
        let key = CacheKey::from(["analytics", "dashboard"]);
        let calls = Arc::new(AtomicUsize::new(0));
        let binding = client.query(key.clone(), counting_fetcher(&calls, "v"));

        binding.activate().await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(binding.status(), QueryStatus::Ready);
        drop(binding);

        let again = client.query(key, counting_fetcher(&calls, "v"));
        again.activate().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_refetch_clears_loading() {
        let client = QueryClient::new(QueryConfig::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let binding = client.query(CacheKey::from(["newsletters"]), move || {
            let call = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if call > 0 {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                }
                Ok::<_, QueryError>(format!("v{call}"))
            }
        });

        binding.activate().await;
        assert_eq!(binding.status(), QueryStatus::Ready);

        let outcome = tokio::time::timeout(Duration::from_millis(10), binding.refetch()).await;
        assert!(outcome.is_err());

        let state = binding.state();
        assert!(!state.is_loading);
        assert_eq!(state.status, QueryStatus::Ready);
        assert_eq!(state.data.as_deref(), Some("v0"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn dropped_first_fetch_returns_to_idle() {
        let client = QueryClient::new(QueryConfig::default());
        let binding = client.query(CacheKey::from(["subscribers"]), || {
            futures::future::pending::<Result<String, QueryError>>()
        });

        let mut activation = Box::pin(binding.activate());
        assert!(futures::poll!(activation.as_mut()).is_pending());
        assert!(binding.is_loading());
        drop(activation);

        assert!(!binding.is_loading());
        assert_eq!(binding.status(), QueryStatus::Idle);
    }
}
