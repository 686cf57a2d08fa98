//! Tracing subscriber setup.

use crate::error::{ScError, ScResult};
use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global `tracing` subscriber with the given filter directive.
///
/// Fails when the directive does not parse or a subscriber is already set.
pub fn init_logging(level: &str) -> ScResult<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_new(level).map_err(|_| ScError::InvalidParams("invalid log level"))?,
        )
        .with_target(true)
        .with_thread_ids(true)
        .try_init()
        .map_err(|_| ScError::InvalidParams("logging already initialized"))
}
