//! Logging bootstrap for the CLI.

use crate::error::{AccuracyError, Result};
use tracing_subscriber::EnvFilter;

/// Install a compact stderr subscriber. `RUST_LOG` wins over `level`.
pub fn init(level: &str) -> Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).map_err(|e| {
            AccuracyError::Telemetry(format!("invalid log level/filter '{}': {}", level, e))
        })?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .map_err(|e| AccuracyError::Telemetry(e.to_string()))
}
