//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingSettings;
use crate::error::{EngineError, EngineResult};

/// Installs the global fmt subscriber.
///
/// `RUST_LOG` wins over the configured filter. Fails if a global subscriber
/// is already set.
pub fn try_init_tracing(settings: &LoggingSettings) -> EngineResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.filter))
        .map_err(|e| EngineError::InvalidConfig(format!("log filter: {}", e)))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| EngineError::InvalidConfig(format!("tracing already initialized: {}", e)))
}

/// Like [`try_init_tracing`], but keeps whatever subscriber is already
/// installed.
pub fn init_tracing(settings: &LoggingSettings) {
    if let Err(e) = try_init_tracing(settings) {
        tracing::debug!("Tracing not (re)initialized: {}", e);
    }
}
