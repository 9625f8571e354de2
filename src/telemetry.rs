use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::caching::{
    METRIC_CACHE_EVICT, METRIC_CACHE_HIT, METRIC_CACHE_MISS, METRIC_CACHE_STORE,
    METRIC_REFRESH_DEDUPLICATED, METRIC_REFRESH_FAILED, METRIC_REFRESH_MS,
    METRIC_REFRESH_SCHEDULED,
};
use crate::config::{LogFormat, LoggingSettings};
use crate::error::AppError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), AppError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            AppError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

/// Register descriptions for every metric the crate emits.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_CACHE_HIT,
            Unit::Count,
            "Total number of lookups that found a stored value."
        );
        describe_counter!(
            METRIC_CACHE_MISS,
            Unit::Count,
            "Total number of lookups that found nothing."
        );
        describe_counter!(
            METRIC_CACHE_STORE,
            Unit::Count,
            "Total number of values written to the cache."
        );
        describe_counter!(
            METRIC_CACHE_EVICT,
            Unit::Count,
            "Total number of cache evictions due to capacity."
        );
        describe_counter!(
            METRIC_REFRESH_SCHEDULED,
            Unit::Count,
            "Total number of background refreshes started."
        );
        describe_counter!(
            METRIC_REFRESH_DEDUPLICATED,
            Unit::Count,
            "Total number of refresh requests dropped because one was pending."
        );
        describe_counter!(
            METRIC_REFRESH_FAILED,
            Unit::Count,
            "Total number of background refreshes that failed or panicked."
        );
        describe_histogram!(
            METRIC_REFRESH_MS,
            Unit::Milliseconds,
            "Background refresh latency in milliseconds."
        );
    });
}
