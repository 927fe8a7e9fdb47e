//! Query bindings and mutations for the dashboard resources.
//!
//! Mutations invalidate by prefix: writing a newsletter drops every cached
//! newsletter list and the affected detail entry along with the dashboard
//! summary. Subscriber writes that change counts also drop the stats entry.

use serde::Serialize;
use syndicate_api_types::{
    ContentSource, ContentSourceCreate, DashboardMetrics, Newsletter, NewsletterAnalytics,
    NewsletterCreate, NewsletterPreview, NewsletterUpdate, Subscriber, SubscriberCreate,
    SubscriptionStats, UserProfile,
};
use tracing::debug;

use super::client::{ApiClient, ListParams};
use super::keys;
use crate::query::{CacheKey, Mutation, QueryBinding, QueryClient, QueryError};

/// Outcome of a delete mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Deleted {
    pub id: i64,
    pub message: String,
}

fn invalidate_all(client: &QueryClient, prefixes: &[CacheKey]) {
    for prefix in prefixes {
        let removed = client.invalidate(Some(prefix));
        debug!(prefix = %prefix, removed = removed.len(), "Invalidated after mutation");
    }
}

// ===========================================================================
// Reads
// ===========================================================================

pub fn newsletters(
    client: &QueryClient,
    api: &ApiClient,
    params: ListParams,
) -> QueryBinding<Vec<Newsletter>> {
    let api = api.clone();
    client.query(keys::newsletters::list(params), move || {
        let api = api.clone();
        async move { api.newsletters(params).await }
    })
}

/// Stays idle until an id is known.
pub fn newsletter(
    client: &QueryClient,
    api: &ApiClient,
    id: Option<i64>,
) -> QueryBinding<Newsletter> {
    let api = api.clone();
    client.query(id.map(keys::newsletters::detail), move || {
        let api = api.clone();
        async move {
            match id {
                Some(id) => api.newsletter(id).await,
                None => Err(QueryError::failed("newsletter id is required")),
            }
        }
    })
}

pub fn newsletter_preview(
    client: &QueryClient,
    api: &ApiClient,
    id: Option<i64>,
) -> QueryBinding<NewsletterPreview> {
    let api = api.clone();
    client.query(id.map(keys::newsletters::preview), move || {
        let api = api.clone();
        async move {
            match id {
                Some(id) => api.newsletter_preview(id).await,
                None => Err(QueryError::failed("newsletter id is required")),
            }
        }
    })
}

pub fn content_sources(
    client: &QueryClient,
    api: &ApiClient,
) -> QueryBinding<Vec<ContentSource>> {
    let api = api.clone();
    client.query(keys::content_sources::list(), move || {
        let api = api.clone();
        async move { api.content_sources().await }
    })
}

pub fn subscribers(
    client: &QueryClient,
    api: &ApiClient,
    params: ListParams,
    include_inactive: bool,
) -> QueryBinding<Vec<Subscriber>> {
    let api = api.clone();
    client.query(
        keys::subscribers::list(params, include_inactive),
        move || {
            let api = api.clone();
            async move { api.subscribers(params, include_inactive).await }
        },
    )
}

pub fn subscriber(
    client: &QueryClient,
    api: &ApiClient,
    id: Option<i64>,
) -> QueryBinding<Subscriber> {
    let api = api.clone();
    client.query(id.map(keys::subscribers::detail), move || {
        let api = api.clone();
        async move {
            match id {
                Some(id) => api.subscriber(id).await,
                None => Err(QueryError::failed("subscriber id is required")),
            }
        }
    })
}

pub fn subscription_stats(
    client: &QueryClient,
    api: &ApiClient,
) -> QueryBinding<SubscriptionStats> {
    let api = api.clone();
    client.query(keys::subscribers::stats(), move || {
        let api = api.clone();
        async move { api.subscription_stats().await }
    })
}

pub fn dashboard(client: &QueryClient, api: &ApiClient) -> QueryBinding<DashboardMetrics> {
    let api = api.clone();
    client.query(keys::analytics::dashboard(), move || {
        let api = api.clone();
        async move { api.dashboard().await }
    })
}

pub fn newsletter_analytics(
    client: &QueryClient,
    api: &ApiClient,
    id: Option<i64>,
) -> QueryBinding<NewsletterAnalytics> {
    let api = api.clone();
    client.query(id.map(keys::analytics::newsletter), move || {
        let api = api.clone();
        async move {
            match id {
                Some(id) => api.newsletter_analytics(id).await,
                None => Err(QueryError::failed("newsletter id is required")),
            }
        }
    })
}

pub fn profile(client: &QueryClient, api: &ApiClient) -> QueryBinding<UserProfile> {
    let api = api.clone();
    client.query(keys::users::profile(), move || {
        let api = api.clone();
        async move { api.profile().await }
    })
}

// ===========================================================================
// Newsletter writes
// ===========================================================================

pub fn create_newsletter(
    client: &QueryClient,
    api: &ApiClient,
) -> Mutation<NewsletterCreate, Newsletter> {
    let api = api.clone();
    client
        .mutation(move |input: NewsletterCreate| {
            let api = api.clone();
            async move { api.create_newsletter(&input).await }
        })
        .on_success(|client, _created| {
            invalidate_all(
                client,
                &[keys::newsletters::lists(), keys::analytics::dashboard()],
            );
            Ok(())
        })
}

pub fn update_newsletter(
    client: &QueryClient,
    api: &ApiClient,
) -> Mutation<(i64, NewsletterUpdate), Newsletter> {
    let api = api.clone();
    client
        .mutation(move |(id, input): (i64, NewsletterUpdate)| {
            let api = api.clone();
            async move { api.update_newsletter(id, &input).await }
        })
        .on_success(|client, updated: &Newsletter| {
            invalidate_all(
                client,
                &[
                    keys::newsletters::lists(),
                    keys::newsletters::detail(updated.id),
                    keys::analytics::dashboard(),
                ],
            );
            Ok(())
        })
}

pub fn delete_newsletter(client: &QueryClient, api: &ApiClient) -> Mutation<i64, Deleted> {
    let api = api.clone();
    client
        .mutation(move |id: i64| {
            let api = api.clone();
            async move {
                let response = api.delete_newsletter(id).await?;
                Ok::<_, QueryError>(Deleted {
                    id,
                    message: response.message,
                })
            }
        })
        .on_success(|client, deleted: &Deleted| {
            invalidate_all(
                client,
                &[
                    keys::newsletters::lists(),
                    keys::newsletters::detail(deleted.id),
                    keys::analytics::newsletter(deleted.id),
                    keys::analytics::dashboard(),
                ],
            );
            Ok(())
        })
}

// ===========================================================================
// Content source and subscriber writes
// ===========================================================================

pub fn create_content_source(
    client: &QueryClient,
    api: &ApiClient,
) -> Mutation<ContentSourceCreate, ContentSource> {
    let api = api.clone();
    client
        .mutation(move |input: ContentSourceCreate| {
            let api = api.clone();
            async move { api.create_content_source(&input).await }
        })
        .on_success(|client, _| {
            invalidate_all(client, &[keys::content_sources::lists()]);
            Ok(())
        })
}

pub fn update_content_source(
    client: &QueryClient,
    api: &ApiClient,
) -> Mutation<(i64, ContentSourceCreate), ContentSource> {
    let api = api.clone();
    client
        .mutation(move |(id, input): (i64, ContentSourceCreate)| {
            let api = api.clone();
            async move { api.update_content_source(id, &input).await }
        })
        .on_success(|client, _| {
            invalidate_all(client, &[keys::content_sources::lists()]);
            Ok(())
        })
}

pub fn delete_content_source(client: &QueryClient, api: &ApiClient) -> Mutation<i64, Deleted> {
    let api = api.clone();
    client
        .mutation(move |id: i64| {
            let api = api.clone();
            async move {
                let response = api.delete_content_source(id).await?;
                Ok::<_, QueryError>(Deleted {
                    id,
                    message: response.message,
                })
            }
        })
        .on_success(|client, _| {
            invalidate_all(client, &[keys::content_sources::lists()]);
            Ok(())
        })
}

pub fn create_subscriber(
    client: &QueryClient,
    api: &ApiClient,
) -> Mutation<SubscriberCreate, Subscriber> {
    let api = api.clone();
    client
        .mutation(move |input: SubscriberCreate| {
            let api = api.clone();
            async move { api.create_subscriber(&input).await }
        })
        .on_success(|client, _| {
            invalidate_all(
                client,
                &[
                    keys::subscribers::lists(),
                    keys::subscribers::stats(),
                    keys::analytics::dashboard(),
                ],
            );
            Ok(())
        })
}

/// Email and name only; counts are unchanged, so stats entries stay cached.
pub fn update_subscriber(
    client: &QueryClient,
    api: &ApiClient,
) -> Mutation<(i64, SubscriberCreate), Subscriber> {
    let api = api.clone();
    client
        .mutation(move |(id, input): (i64, SubscriberCreate)| {
            let api = api.clone();
            async move { api.update_subscriber(id, &input).await }
        })
        .on_success(|client, updated: &Subscriber| {
            invalidate_all(
                client,
                &[
                    keys::subscribers::lists(),
                    keys::subscribers::detail(updated.id),
                ],
            );
            Ok(())
        })
}

pub fn delete_subscriber(client: &QueryClient, api: &ApiClient) -> Mutation<i64, Deleted> {
    let api = api.clone();
    client
        .mutation(move |id: i64| {
            let api = api.clone();
            async move {
                let response = api.delete_subscriber(id).await?;
                Ok::<_, QueryError>(Deleted {
                    id,
                    message: response.message,
                })
            }
        })
        .on_success(|client, deleted: &Deleted| {
            invalidate_all(
                client,
                &[
                    keys::subscribers::lists(),
                    keys::subscribers::detail(deleted.id),
                    keys::subscribers::stats(),
                    keys::analytics::dashboard(),
                ],
            );
            Ok(())
        })
}
