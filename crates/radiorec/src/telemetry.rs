use tracing_log::LogTracer;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{
    fmt,
    layer::{Layer, SubscriberExt},
    EnvFilter,
};

use crate::config::{LogFormat, LoggingConfig};
use crate::error::RadioRecError;

/// Install the global tracing subscriber and route `log` records into it.
///
/// `RUST_LOG` overrides the configured level.
pub fn init(logging: &LoggingConfig) -> Result<(), RadioRecError> {
    let default_directive: Directive = logging.level.parse().map_err(|err| {
        RadioRecError::Telemetry(format!("invalid log level '{}': {err}", logging.level))
    })?;
    let env_filter = EnvFilter::builder()
        .with_default_directive(default_directive)
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

    let subscriber = tracing_subscriber::registry().with(env_filter).with(fmt_layer);

    LogTracer::init().map_err(|err| {
        RadioRecError::Telemetry(format!("failed to install log bridge: {err}"))
    })?;
    tracing::subscriber::set_global_default(subscriber).map_err(|err| {
        RadioRecError::Telemetry(format!("failed to install tracing subscriber: {err}"))
    })
}
