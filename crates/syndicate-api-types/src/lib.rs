//! Request and response shapes shared by the ContentSyndicate dashboard API
//! client and its command-line frontend.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::PrimitiveDateTime;

// The backend emits naive ISO-8601 timestamps with optional fractional seconds.
time::serde::format_description!(
    naive_timestamp,
    PrimitiveDateTime,
    "[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NewsletterStatus {
    Draft,
    Scheduled,
    Sent,
    Failed,
}

impl NewsletterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NewsletterStatus::Draft => "draft",
            NewsletterStatus::Scheduled => "scheduled",
            NewsletterStatus::Sent => "sent",
            NewsletterStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for NewsletterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NewsletterStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "draft" => Ok(NewsletterStatus::Draft),
            "scheduled" => Ok(NewsletterStatus::Scheduled),
            "sent" => Ok(NewsletterStatus::Sent),
            "failed" => Ok(NewsletterStatus::Failed),
            other => Err(format!("unknown newsletter status `{other}`")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Newsletter {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    #[serde(default)]
    pub subject_line: Option<String>,
    #[serde(default)]
    pub content_sources: Vec<String>,
    #[serde(default)]
    pub target_audience: Option<String>,
    #[serde(default, with = "naive_timestamp::option")]
    pub scheduled_for: Option<PrimitiveDateTime>,
    #[serde(default)]
    pub content: String,
    pub status: NewsletterStatus,
    #[serde(with = "naive_timestamp")]
    pub created_at: PrimitiveDateTime,
    #[serde(default, with = "naive_timestamp::option")]
    pub sent_at: Option<PrimitiveDateTime>,
    #[serde(default)]
    pub open_rate: Option<f64>,
    #[serde(default)]
    pub click_rate: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewsletterCreate {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_line: Option<String>,
    #[serde(default)]
    pub content_sources: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_audience: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "naive_timestamp::option"
    )]
    pub scheduled_for: Option<PrimitiveDateTime>,
}

/// Partial update; absent fields are left untouched by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewsletterUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_line: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<NewsletterStatus>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "naive_timestamp::option"
    )]
    pub scheduled_for: Option<PrimitiveDateTime>,
}

impl NewsletterUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.subject_line.is_none()
            && self.content.is_none()
            && self.status.is_none()
            && self.scheduled_for.is_none()
    }
}

/// Rendered content served by the preview endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsletterPreview {
    #[serde(default)]
    pub html_content: Option<String>,
    #[serde(default)]
    pub subject_line: Option<String>,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsletterAnalytics {
    pub newsletter_id: i64,
    pub opens: u64,
    pub clicks: u64,
    pub unsubscribes: u64,
    pub open_rate: f64,
    pub click_rate: f64,
    pub unsubscribe_rate: f64,
    #[serde(with = "naive_timestamp")]
    pub created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentSource {
    pub id: i64,
    pub user_id: i64,
    pub platform: String,
    pub query: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub filters: BTreeMap<String, Value>,
    pub is_active: bool,
    #[serde(with = "naive_timestamp")]
    pub created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentSourceCreate {
    pub platform: String,
    pub query: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub filters: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscriber {
    pub id: i64,
    pub user_id: i64,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    pub is_active: bool,
    #[serde(with = "naive_timestamp")]
    pub subscribed_at: PrimitiveDateTime,
    #[serde(default)]
    pub preferences: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubscriberCreate {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Thirty-day subscriber summary for the current account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionStats {
    pub total_active_subscribers: u64,
    pub total_unsubscribed: u64,
    pub recent_growth: u64,
    pub recent_unsubscribes: u64,
    pub net_growth: i64,
    /// `-1` on unlimited tiers.
    pub subscription_limit: i64,
    /// Absent on unlimited tiers.
    #[serde(default)]
    pub usage_percentage: Option<f64>,
    pub churn_rate: f64,
}

impl SubscriptionStats {
    pub fn is_unlimited(&self) -> bool {
        self.subscription_limit < 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    Free,
    Starter,
    Professional,
    Enterprise,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub email: String,
    pub full_name: String,
    pub subscription_tier: SubscriptionTier,
    pub is_active: bool,
    #[serde(with = "naive_timestamp")]
    pub created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardMetrics {
    pub total_newsletters: u64,
    pub total_subscribers: u64,
    pub avg_open_rate: f64,
    pub avg_click_rate: f64,
    #[serde(default)]
    pub recent_newsletters: Vec<Newsletter>,
    #[serde(default)]
    pub trending_content: Vec<Value>,
}

/// Body returned by delete endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Error body produced by the backend for non-2xx responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
    #[serde(default)]
    pub error_code: Option<String>,
}
