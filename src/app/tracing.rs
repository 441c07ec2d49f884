use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::domain::ConfigError;

/// Initialize the tracing subscriber for the pipeline's own diagnostics.
///
/// Uses JSON when `RUST_LOG_FORMAT=json`, compact text otherwise. Output goes
/// to stderr so a console sink on stdout stays clean. `RUST_LOG` directives
/// are honored on top of `default_level`.
pub fn init_tracing(default_level: Level) -> Result<(), ConfigError> {
    let use_json = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let result = if use_json {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(true)
                    .with_writer(std::io::stderr),
            )
            .with(filter)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .with(filter)
            .try_init()
    };

    result.map_err(|e| ConfigError::InvalidConfig(format!("tracing already initialized: {e}")))
}
