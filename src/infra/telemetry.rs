use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::application::articles::{METRIC_ARTICLES_PUBLISHED, METRIC_ID_COLLISIONS};
use crate::application::auth::METRIC_LOGIN_FAILURES;
use crate::config::{LogFormat, LoggingSettings};
use crate::infra::http::METRIC_HTTP_REQUEST_MS;

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
            METRIC_ARTICLES_PUBLISHED,
            Unit::Count,
            "Total number of articles published."
        );
        describe_counter!(
            METRIC_ID_COLLISIONS,
            Unit::Count,
            "Publish attempts that lost an article id to a concurrent writer."
        );
        describe_counter!(
            METRIC_LOGIN_FAILURES,
            Unit::Count,
            "Rejected operator sign-in attempts."
        );
        describe_histogram!(
            METRIC_HTTP_REQUEST_MS,
            Unit::Milliseconds,
            "HTTP request latency in milliseconds."
        );
    });
}
