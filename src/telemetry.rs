use tracing_subscriber::{
    fmt,
    layer::{Layer, SubscriberExt},
    util::{SubscriberInitExt, TryInitError},
    EnvFilter,
};

use crate::cli::LoggingSettings;

/// Install a global tracing subscriber using the provided logging settings.
///
/// `RUST_LOG` directives, when present, refine the configured base level.
pub fn init(logging: &LoggingSettings) -> Result<(), TryInitError> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = if logging.json {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .boxed()
    } else {
        fmt::layer().compact().with_target(true).boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
}
