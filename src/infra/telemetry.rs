use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
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
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
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

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "bookshelf_cache_hit_total",
            Unit::Count,
            "Total number of book reads served from the speed cache."
        );
        describe_counter!(
            "bookshelf_cache_miss_total",
            Unit::Count,
            "Total number of book reads that missed the speed cache."
        );
        describe_counter!(
            "bookshelf_cache_error_total",
            Unit::Count,
            "Total number of speed cache operations that failed and were ignored."
        );
        describe_counter!(
            "bookshelf_events_published_total",
            Unit::Count,
            "Total number of domain events delivered to the sink."
        );
        describe_counter!(
            "bookshelf_events_dropped_total",
            Unit::Count,
            "Total number of domain events dropped on a full or closed queue or failed delivery."
        );
        describe_counter!(
            "bookshelf_access_denied_total",
            Unit::Count,
            "Total number of calls rejected by the access guard."
        );
        describe_counter!(
            "bookshelf_rpc_requests_total",
            Unit::Count,
            "Total RPC requests by method and result code."
        );
        describe_histogram!(
            "bookshelf_rpc_duration_seconds",
            Unit::Seconds,
            "RPC handling latency in seconds."
        );
    });
}
