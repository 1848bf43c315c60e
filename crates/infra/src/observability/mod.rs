//! Tracing subscriber installation
//!
//! Installs a global `tracing-subscriber` registry with an [`EnvFilter`] and
//! one fmt layer (text or JSON). `RUST_LOG` always wins over the configured
//! filter; without either, `info` is used.

use smartcache_common::{CommonError, CommonResult};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};

/// Filter applied when neither `RUST_LOG` nor the configuration sets one
pub const DEFAULT_FILTER: &str = "info";

/// Build the event filter for `config`
///
/// # Errors
/// Returns `CommonError::Config` if the configured directives do not parse.
pub fn build_filter(config: &LoggingConfig) -> CommonResult<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let directives = config.filter.as_deref().unwrap_or(DEFAULT_FILTER);
    EnvFilter::try_new(directives).map_err(|e| {
        CommonError::config_field("logging.filter", format!("Invalid filter '{directives}': {e}"))
    })
}

/// Install the global tracing subscriber
///
/// # Errors
/// Returns `CommonError::Config` for an invalid filter and
/// `CommonError::Internal` if a global subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> CommonResult<()> {
    let filter = build_filter(config)?;

    let (text, json) = match config.format {
        LogFormat::Text => (Some(fmt::layer().with_target(true)), None),
        LogFormat::Json => (None, Some(fmt::layer().json().with_current_span(false))),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(text)
        .with(json)
        .try_init()
        .map_err(|e| CommonError::internal_with_context(e.to_string(), "init_tracing"))?;

    tracing::debug!(format = %config.format, "tracing initialized");
    Ok(())
}
