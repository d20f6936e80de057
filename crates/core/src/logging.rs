//! Tracing subscriber setup
//!
//! Hosts call [`init`] once at startup. Later calls are no-ops, so every
//! surface can call it without coordinating.

use tracing_subscriber::{prelude::*, EnvFilter};

use crate::{
    config::Config,
    errors::{PromptError, Result},
};

/// Install the global fmt subscriber using the configured filter
///
/// Returns `Ok(false)` when a subscriber was already installed.
pub fn init(config: &Config) -> Result<bool> {
    let filter = EnvFilter::builder()
        .parse(&config.log_filter)
        .map_err(|e| {
            PromptError::ConfigError(format!("Invalid log filter '{}': {}", config.log_filter, e))
        })?;

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(filter = %config.log_filter, "logging initialized");
    }
    Ok(installed)
}
