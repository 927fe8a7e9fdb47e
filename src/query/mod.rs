//! Syndicate query cache
//!
//! Client-side cache for data fetched from the ContentSyndicate API:
//!
//! - **Store**: key → entry map with freshness tracking
//! - **Subscribers**: per-key listeners notified on writes and invalidations
//! - **Bindings**: one consumer following one key, fetching on demand
//! - **Mutations**: write operations whose callbacks invalidate stale keys
//!
//! ## Configuration
//!
//! ```toml
//! [query]
//! stale_time_seconds = 300
//! retry = 0
//! ```

mod binding;
mod client;
mod config;
mod error;
mod key;
pub(crate) mod lock;
mod mutation;
mod retry;
mod store;
mod subscribers;

pub use binding::{FetchFuture, Fetcher, QueryBinding, QueryOptions, QueryState, QueryStatus};
pub use client::QueryClient;
pub use config::QueryConfig;
pub use error::{CallbackError, QueryError};
pub use key::CacheKey;
pub use mutation::{Mutation, MutationFuture, MutationState};
pub use retry::RetryPolicy;
pub use store::{CacheEntry, CacheStore};
pub use subscribers::{Listener, SubscriberId, SubscriberRegistry, Subscription};

/// Metric names emitted by the query cache.
pub mod metric_names {
    pub use super::binding::{METRIC_FETCH_DISCARDED, METRIC_FETCH_MS};
    pub use super::mutation::METRIC_MUTATIONS;
    pub use super::store::{
        METRIC_CACHE_HIT, METRIC_CACHE_MISS, METRIC_CACHE_STALE, METRIC_INVALIDATED,
    };
}
