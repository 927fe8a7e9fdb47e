use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::api::METRIC_REQUEST_MS;
use crate::config::{LogFormat, LoggingSettings};
use crate::query::metric_names::{
    METRIC_CACHE_HIT, METRIC_CACHE_MISS, METRIC_CACHE_STALE, METRIC_FETCH_DISCARDED,
    METRIC_FETCH_MS, METRIC_INVALIDATED, METRIC_MUTATIONS,
};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
///
/// Logs go to stderr so that command output on stdout stays machine-readable.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_CACHE_HIT,
            Unit::Count,
            "Total number of reads served from a fresh cache entry."
        );
        describe_counter!(
            METRIC_CACHE_MISS,
            Unit::Count,
            "Total number of reads that found no cache entry."
        );
        describe_counter!(
            METRIC_CACHE_STALE,
            Unit::Count,
            "Total number of reads that found an entry past its stale time."
        );
        describe_counter!(
            METRIC_INVALIDATED,
            Unit::Count,
            "Total number of cache entries removed by invalidation."
        );
        describe_counter!(
            METRIC_FETCH_DISCARDED,
            Unit::Count,
            "Total number of fetch results dropped because a newer fetch superseded them."
        );
        describe_histogram!(
            METRIC_FETCH_MS,
            Unit::Milliseconds,
            "Query fetch latency in milliseconds, retries included."
        );
        describe_counter!(
            METRIC_MUTATIONS,
            Unit::Count,
            "Total number of finished mutation calls, labelled by outcome."
        );
        describe_histogram!(
            METRIC_REQUEST_MS,
            Unit::Milliseconds,
            "Dashboard API request latency in milliseconds."
        );
    });
}
