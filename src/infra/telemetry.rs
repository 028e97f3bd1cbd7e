//! Tracing subscriber installation and metric descriptions.

use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use thiserror::Error;
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

static METRIC_DESCRIPTIONS: Once = Once::new();

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to install tracing subscriber: {message}")]
    Subscriber { message: String },
}

/// Install a global tracing subscriber using the provided logging settings.
///
/// Embedding hosts that already run their own subscriber should skip this
/// and only rely on the hook's structured events.
pub fn init(logging: &LoggingSettings) -> Result<(), TelemetryError> {
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
        .map_err(|err| TelemetryError::Subscriber {
            message: err.to_string(),
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "levigo_deferred_replay_total",
            Unit::Count,
            "Total number of deferred invocations replayed successfully."
        );
        describe_counter!(
            "levigo_deferred_replay_error_total",
            Unit::Count,
            "Total number of deferred invocations that failed during replay."
        );
        describe_counter!(
            "levigo_minify_run_total",
            Unit::Count,
            "Total number of templates run through the HTML minifier."
        );
        describe_counter!(
            "levigo_minify_skip_total",
            Unit::Count,
            "Total number of templates returned unminified due to configuration."
        );
        describe_histogram!(
            "levigo_minify_ms",
            Unit::Milliseconds,
            "HTML minification latency in milliseconds."
        );
    });
}
