//! Query cache configuration.
//!
//! Controls entry freshness and fetch retries. The binary derives it from
//! the validated `[query]` settings; library users may build or deserialize
//! it directly.

use std::time::Duration;

use serde::Deserialize;

use super::retry::RetryPolicy;

const DEFAULT_STALE_TIME_MS: u64 = 5 * 60 * 1000;
const DEFAULT_RETRY: u32 = 0;
const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 250;
const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 5_000;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// How long a stored entry stays fresh. Zero makes every activation
    /// refetch; a written entry is still adopted by its bindings.
    pub stale_time_ms: u64,
    /// Extra attempts after a retryable fetch failure.
    pub retry: u32,
    /// Backoff before the first retry; doubled for every further attempt.
    pub retry_base_delay_ms: u64,
    /// Upper bound for a single backoff delay.
    pub retry_max_delay_ms: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            stale_time_ms: DEFAULT_STALE_TIME_MS,
            retry: DEFAULT_RETRY,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            retry_max_delay_ms: DEFAULT_RETRY_MAX_DELAY_MS,
        }
    }
}

impl From<&crate::config::QuerySettings> for QueryConfig {
    fn from(settings: &crate::config::QuerySettings) -> Self {
        Self {
            stale_time_ms: settings.stale_time.as_millis() as u64,
            retry: settings.retry,
            retry_base_delay_ms: settings.retry_base_delay.as_millis() as u64,
            retry_max_delay_ms: settings.retry_max_delay.as_millis() as u64,
        }
    }
}

impl QueryConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.stale_time_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.retry,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms.max(self.retry_base_delay_ms)),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.stale_time_ms = ttl.as_millis() as u64;
        self
    }

    pub fn with_retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = QueryConfig::default();
        assert_eq!(config.stale_time_ms, 300_000);
        assert_eq!(config.ttl(), Duration::from_secs(300));
        assert_eq!(config.retry, 0);
        assert_eq!(config.retry_policy().max_retries, 0);
    }

    #[test]
    fn max_delay_never_below_base() {
        let config = QueryConfig {
            retry_base_delay_ms: 1_000,
            retry_max_delay_ms: 10,
            ..Default::default()
        };
        let policy = config.retry_policy();
        assert_eq!(policy.max_delay, Duration::from_secs(1));
    }

    #[test]
    fn deserializes_partial_table() {
        let config: QueryConfig =
            serde_json::from_str(r#"{"retry": 3}"#).expect("partial config should parse");
        assert_eq!(config.retry, 3);
        assert_eq!(config.stale_time_ms, DEFAULT_STALE_TIME_MS);
    }

    #[test]
    fn builders_override_fields() {
        let config = QueryConfig::default()
            .with_ttl(Duration::from_secs(1))
            .with_retry(2);
        assert_eq!(config.stale_time_ms, 1_000);
        assert_eq!(config.retry, 2);
    }
}
