//! Shared client handle for the query cache.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use tracing::debug;

use super::binding::{Fetcher, QueryBinding, QueryOptions};
use super::config::QueryConfig;
use super::error::QueryError;
use super::key::CacheKey;
use super::mutation::Mutation;
use super::store::CacheStore;
use super::subscribers::SubscriberRegistry;

/// Cheap-to-clone handle owning the cache store, the subscriber registry,
/// and the cache configuration.
///
/// Every binding and mutation created from the same client (or its clones)
/// shares one store.
#[derive(Clone)]
pub struct QueryClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: QueryConfig,
    store: CacheStore,
}

impl QueryClient {
    pub fn new(config: QueryConfig) -> Self {
        let subscribers = Arc::new(SubscriberRegistry::new());
        let store = CacheStore::new(config.ttl(), subscribers);
        Self {
            inner: Arc::new(ClientInner { config, store }),
        }
    }

    pub fn config(&self) -> &QueryConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &CacheStore {
        &self.inner.store
    }

    pub fn subscribers(&self) -> &Arc<SubscriberRegistry> {
        self.inner.store.subscribers()
    }

    /// Create an enabled binding for `key`. Call [`QueryBinding::activate`]
    /// to start it.
    pub fn query<T, F, Fut>(&self, key: impl Into<Option<CacheKey>>, fetch: F) -> QueryBinding<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, QueryError>> + Send + 'static,
    {
        self.query_with(key, fetch, QueryOptions::new())
    }

    pub fn query_with<T, F, Fut>(
        &self,
        key: impl Into<Option<CacheKey>>,
        fetch: F,
        options: QueryOptions,
    ) -> QueryBinding<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, QueryError>> + Send + 'static,
    {
        let fetcher: Fetcher<T> = Arc::new(move || fetch().boxed());
        QueryBinding::new(self.clone(), key.into(), fetcher, options)
    }

    pub fn mutation<I, O, F, Fut>(&self, operation: F) -> Mutation<I, O>
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, QueryError>> + Send + 'static,
    {
        Mutation::new(self.clone(), operation)
    }

    /// Invalidate every key starting with `prefix`, or everything for `None`.
    pub fn invalidate(&self, prefix: Option<&CacheKey>) -> Vec<CacheKey> {
        self.store().invalidate(prefix)
    }

    pub fn clear(&self) {
        self.store().invalidate(None);
    }

    /// Drop one entry without notifying its listeners.
    pub fn remove(&self, key: &CacheKey) -> bool {
        self.store().remove(key)
    }

    /// Seed or overwrite the entry for `key` and notify its listeners.
    pub fn set_query_data<T>(&self, key: &CacheKey, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.store().set(key, value);
    }

    /// Cached value for `key` regardless of freshness.
    pub fn get_query_data<T>(&self, key: &CacheKey) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.store().get::<T>(key).and_then(|entry| entry.value)
    }

    /// One-shot read-through: serve a fresh entry or fetch and store.
    pub async fn fetch_query<T, F, Fut>(&self, key: &CacheKey, fetch: F) -> Result<T, QueryError>
    where
        T: Clone + Send + Sync + 'static,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, QueryError>>,
    {
        if let Some(entry) = self.store().get_fresh::<T>(key) {
            debug!(key = %key, "Serving fresh cache entry");
            return entry.into_result();
        }

        let result = self.config().retry_policy().run(fetch).await;
        match &result {
            Ok(value) => self.store().set(key, value.clone()),
            Err(err) => self.store().set_error(key, err.clone()),
        }
        result
    }
}

impl fmt::Debug for QueryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryClient")
            .field("config", &self.inner.config)
            .field("store", &self.inner.store)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn fetch_query_reads_through_once() {
        let client = QueryClient::new(QueryConfig::default());
        let key = CacheKey::from(["analytics", "dashboard"]);
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = client
                .fetch_query(&key, || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok::<_, QueryError>(12_u32) }
                })
                .await;
            assert_eq!(value, Ok(12));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fetch_query_caches_errors() {
        let client = QueryClient::new(QueryConfig::default());
        let key = CacheKey::from(["newsletters", "9"]);

        let first: Result<String, _> = client
            .fetch_query(&key, || async { Err(QueryError::status(404, "Newsletter not found")) })
            .await;
        assert!(first.is_err());

        let second: Result<String, _> = client
            .fetch_query(&key, || async { Ok("unreachable".to_string()) })
            .await;
        assert_eq!(second, Err(QueryError::status(404, "Newsletter not found")));
    }

    #[test]
    fn clones_share_one_store() {
        let client = QueryClient::new(QueryConfig::default());
        let other = client.clone();
        let key = CacheKey::from(["subscribers"]);

        client.set_query_data(&key, 3_usize);
        assert_eq!(other.get_query_data::<usize>(&key), Some(3));

        other.clear();
        assert!(client.store().is_empty());
    }

    #[test]
    fn remove_is_silent() {
        let client = QueryClient::new(QueryConfig::default());
        let key = CacheKey::from(["newsletters"]);
        let notified = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&notified);
        let _guard = client.subscribers().subscribe(
            key.clone(),
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        client.set_query_data(&key, 1_u8);
        assert!(client.remove(&key));
        assert!(!client.remove(&key));
        assert_eq!(notified.load(Ordering::SeqCst), 1);
    }
}
