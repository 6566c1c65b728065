use metrics_exporter_statsd::StatsdBuilder;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{CommonConfig, MetricsConfig};

#[derive(thiserror::Error, Debug)]
pub enum TelemetryError {
    #[error("could not build statsd exporter: {0}")]
    Statsd(String),
    #[error("could not install metrics recorder: {0}")]
    Recorder(String),
    #[error("could not install tracing subscriber: {0}")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}

/// Installs logging, error reporting and metrics export.
///
/// The returned guard flushes pending Sentry events when dropped and must live
/// until the process exits.
pub fn init(config: &CommonConfig) -> Result<Option<sentry::ClientInitGuard>, TelemetryError> {
    let sentry_guard = config.logging.as_ref().map(|logging| {
        sentry::init((
            logging.sentry_dsn.as_str(),
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let sentry_layer = sentry_guard
        .as_ref()
        .map(|_| sentry::integrations::tracing::layer());

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(sentry_layer)
        .try_init()?;

    if let Some(metrics) = &config.metrics {
        init_statsd(metrics)?;
    }

    Ok(sentry_guard)
}

fn init_statsd(config: &MetricsConfig) -> Result<(), TelemetryError> {
    let recorder = StatsdBuilder::from(config.statsd_host.as_str(), config.statsd_port)
        .build(Some("notes"))
        .map_err(|e| TelemetryError::Statsd(e.to_string()))?;
    metrics::set_global_recorder(recorder).map_err(|e| TelemetryError::Recorder(e.to_string()))?;

    shared::metrics_defs::describe_metrics(bootstrap::metrics_defs::ALL_METRICS);
    tracing::info!(
        host = %config.statsd_host,
        port = config.statsd_port,
        "Exporting metrics to statsd"
    );
    Ok(())
}
