use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogFormat, LogLevel};

/// Filter used by [`init_logging`]. `RUST_LOG` wins over `level`.
pub fn env_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()))
}

/// Install the global subscriber.
///
/// `LogFormat::Json` writes one flattened JSON object per event;
/// `LogFormat::Text` writes pretty, colored output. Fails if a global
/// subscriber is already installed.
pub fn init_logging(level: LogLevel, format: LogFormat) -> Result<(), TryInitError> {
    let registry = tracing_subscriber::registry().with(env_filter(level));

    match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_target(true)
                    .with_ansi(false),
            )
            .try_init(),
        LogFormat::Text => registry
            .with(fmt::layer().pretty().with_target(true).with_ansi(true))
            .try_init(),
    }
}
