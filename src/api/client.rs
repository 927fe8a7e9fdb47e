//! HTTP client for the ContentSyndicate dashboard API.

use std::time::{Duration, Instant};

use metrics::histogram;
use reqwest::{Client, Method, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use syndicate_api_types::{
    ContentSource, ContentSourceCreate, DashboardMetrics, ErrorResponse, MessageResponse,
    Newsletter, NewsletterAnalytics, NewsletterCreate, NewsletterPreview, NewsletterUpdate,
    Subscriber, SubscriberCreate, SubscriptionStats, UserProfile,
};
use tracing::{debug, warn};

use super::tokens::TokenStore;
use crate::query::QueryError;

pub const METRIC_REQUEST_MS: &str = "syndicate_api_request_ms";

/// Pagination accepted by the list endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ListParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ListParams {
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self { page, limit }
    }

    fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        pairs
    }
}

#[derive(Clone, Debug)]
pub struct ApiClient {
    http: Client,
    base: Url,
    tokens: TokenStore,
}

impl ApiClient {
    /// `base` is the API origin, optionally with a path prefix.
    pub fn new(base: Url, tokens: TokenStore, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            base: with_trailing_slash(base),
            tokens,
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("syndicate/", env!("CARGO_PKG_VERSION"))
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    // ===========================================================================
    // Newsletters
    // ===========================================================================

    pub async fn newsletters(&self, params: ListParams) -> Result<Vec<Newsletter>, QueryError> {
        self.request(Method::GET, "api/newsletters/", &params.query_pairs(), None)
            .await
    }

    pub async fn newsletter(&self, id: i64) -> Result<Newsletter, QueryError> {
        self.request(Method::GET, &format!("api/newsletters/{id}"), &[], None)
            .await
    }

    pub async fn create_newsletter(
        &self,
        input: &NewsletterCreate,
    ) -> Result<Newsletter, QueryError> {
        let body = to_body(input)?;
        self.request(Method::POST, "api/newsletters/", &[], Some(body))
            .await
    }

    pub async fn update_newsletter(
        &self,
        id: i64,
        input: &NewsletterUpdate,
    ) -> Result<Newsletter, QueryError> {
        let body = to_body(input)?;
        self.request(Method::PUT, &format!("api/newsletters/{id}"), &[], Some(body))
            .await
    }

    pub async fn delete_newsletter(&self, id: i64) -> Result<MessageResponse, QueryError> {
        self.request(Method::DELETE, &format!("api/newsletters/{id}"), &[], None)
            .await
    }

    pub async fn newsletter_preview(&self, id: i64) -> Result<NewsletterPreview, QueryError> {
        self.request(
            Method::GET,
            &format!("api/newsletters/{id}/preview"),
            &[],
            None,
        )
        .await
    }

    // ===========================================================================
    // Content sources
    // ===========================================================================

    pub async fn content_sources(&self) -> Result<Vec<ContentSource>, QueryError> {
        self.request(Method::GET, "api/content/sources", &[], None)
            .await
    }

    pub async fn create_content_source(
        &self,
        input: &ContentSourceCreate,
    ) -> Result<ContentSource, QueryError> {
        let body = to_body(input)?;
        self.request(Method::POST, "api/content/sources", &[], Some(body))
            .await
    }

    /// Replaces the platform, query, keywords and filters of a source.
    pub async fn update_content_source(
        &self,
        id: i64,
        input: &ContentSourceCreate,
    ) -> Result<ContentSource, QueryError> {
        let body = to_body(input)?;
        self.request(Method::PUT, &format!("api/content/sources/{id}"), &[], Some(body))
            .await
    }

    pub async fn delete_content_source(&self, id: i64) -> Result<MessageResponse, QueryError> {
        self.request(Method::DELETE, &format!("api/content/sources/{id}"), &[], None)
            .await
    }

    // ===========================================================================
    // Subscribers
    // ===========================================================================

    /// Lists active subscribers unless `include_inactive` is set.
    pub async fn subscribers(
        &self,
        params: ListParams,
        include_inactive: bool,
    ) -> Result<Vec<Subscriber>, QueryError> {
        let mut query = params.query_pairs();
        if include_inactive {
            query.push(("active_only", "false".to_string()));
        }
        self.request(Method::GET, "api/subscriptions/subscribers", &query, None)
            .await
    }

    pub async fn create_subscriber(
        &self,
        input: &SubscriberCreate,
    ) -> Result<Subscriber, QueryError> {
        let body = to_body(input)?;
        self.request(Method::POST, "api/subscriptions/subscribers", &[], Some(body))
            .await
    }

    pub async fn subscriber(&self, id: i64) -> Result<Subscriber, QueryError> {
        self.request(
            Method::GET,
            &format!("api/subscriptions/subscribers/{id}"),
            &[],
            None,
        )
        .await
    }

    pub async fn update_subscriber(
        &self,
        id: i64,
        input: &SubscriberCreate,
    ) -> Result<Subscriber, QueryError> {
        let body = to_body(input)?;
        self.request(
            Method::PUT,
            &format!("api/subscriptions/subscribers/{id}"),
            &[],
            Some(body),
        )
        .await
    }

    pub async fn delete_subscriber(&self, id: i64) -> Result<MessageResponse, QueryError> {
        self.request(
            Method::DELETE,
            &format!("api/subscriptions/subscribers/{id}"),
            &[],
            None,
        )
        .await
    }

    pub async fn subscription_stats(&self) -> Result<SubscriptionStats, QueryError> {
        self.request(Method::GET, "api/subscriptions/stats", &[], None)
            .await
    }

    // ===========================================================================
    // Analytics and account
    // ===========================================================================

    pub async fn dashboard(&self) -> Result<DashboardMetrics, QueryError> {
        self.request(Method::GET, "api/analytics/dashboard", &[], None)
            .await
    }

    pub async fn newsletter_analytics(&self, id: i64) -> Result<NewsletterAnalytics, QueryError> {
        self.request(
            Method::GET,
            &format!("api/analytics/newsletters/{id}"),
            &[],
            None,
        )
        .await
    }

    pub async fn profile(&self) -> Result<UserProfile, QueryError> {
        self.request(Method::GET, "api/users/profile", &[], None)
            .await
    }

    // ===========================================================================
    // Transport
    // ===========================================================================

    fn url(&self, path: &str, query: &[(&str, String)]) -> Result<Url, QueryError> {
        let mut url = self
            .base
            .join(path)
            .map_err(|err| QueryError::failed(format!("invalid request path `{path}`: {err}")))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in query {
                pairs.append_pair(name, value);
            }
        }
        Ok(url)
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<T, QueryError> {
        let url = self.url(path, query)?;
        let mut request = self.http.request(method.clone(), url.clone());
        if let Some(token) = self.tokens.get() {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let started_at = Instant::now();
        let response = request
            .send()
            .await
            .map_err(|err| QueryError::network(err.to_string()))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| QueryError::network(err.to_string()))?;

        let elapsed_ms = started_at.elapsed().as_secs_f64() * 1000.0;
        histogram!(METRIC_REQUEST_MS, "method" => method.to_string()).record(elapsed_ms);
        debug!(
            method = %method,
            path = url.path(),
            status = status.as_u16(),
            elapsed_ms,
            "API request completed"
        );

        if !status.is_success() {
            let error = status_error(status, &bytes);
            warn!(method = %method, path = url.path(), error = %error, "API request rejected");
            return Err(error);
        }

        serde_json::from_slice(&bytes).map_err(|err| QueryError::decode(err.to_string()))
    }
}

fn with_trailing_slash(mut base: Url) -> Url {
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base
}

fn to_body<T: Serialize>(input: &T) -> Result<Value, QueryError> {
    serde_json::to_value(input)
        .map_err(|err| QueryError::failed(format!("failed to encode request body: {err}")))
}

/// Prefer the backend's `detail`; fall back to the raw body, then the reason phrase.
fn status_error(status: StatusCode, body: &[u8]) -> QueryError {
    let message = match serde_json::from_slice::<ErrorResponse>(body) {
        Ok(parsed) => parsed.detail,
        Err(_) => {
            let text = String::from_utf8_lossy(body).trim().to_string();
            if text.is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                text
            }
        }
    };
    QueryError::status(status.as_u16(), message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> ApiClient {
        ApiClient::new(
            Url::parse(base).expect("valid url"),
            TokenStore::default(),
            Duration::from_secs(5),
        )
        .expect("client")
    }

    #[test]
    fn base_path_prefix_is_preserved() {
        let api = client("https://example.com/backend");
        let url = api.url("api/newsletters/", &[]).expect("url");
        assert_eq!(url.as_str(), "https://example.com/backend/api/newsletters/");
    }

    #[test]
    fn list_params_become_query_pairs() {
        let api = client("https://example.com");
        let params = ListParams::new(Some(2), Some(20));
        let url = api
            .url("api/newsletters/", &params.query_pairs())
            .expect("url");
        assert_eq!(url.query(), Some("page=2&limit=20"));

        let empty = api
            .url("api/newsletters/", &ListParams::default().query_pairs())
            .expect("url");
        assert_eq!(empty.query(), None);
    }

    #[test]
    fn status_error_prefers_detail() {
        let error = status_error(
            StatusCode::NOT_FOUND,
            br#"{"detail":"Newsletter not found"}"#,
        );
        assert_eq!(error, QueryError::status(404, "Newsletter not found"));
    }

    #[test]
    fn status_error_falls_back_to_raw_body() {
        let validation = br#"{"detail":[{"loc":["body","title"],"msg":"field required"}]}"#;
        let error = status_error(StatusCode::UNPROCESSABLE_ENTITY, validation);
        assert_eq!(error.http_status(), Some(422));
        assert!(error.to_string().contains("field required"));

        let empty = status_error(StatusCode::BAD_GATEWAY, b"");
        assert_eq!(empty, QueryError::status(502, "Bad Gateway"));
    }

    #[test]
    fn user_agent_carries_version() {
        assert!(ApiClient::user_agent().starts_with("syndicate/"));
    }
}
