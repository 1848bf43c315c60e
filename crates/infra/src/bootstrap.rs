//! Engine bootstrap
//!
//! The fail-fast startup path: an invalid collection configuration stops the
//! process before any cache traffic is served. The library never exits on
//! its own; callers receive a `CommonError::Config` and decide.

use std::path::PathBuf;

use smartcache_common::{CommonError, CommonResult};
use smartcache_core::{CacheError, CacheValue, Engine};

use crate::config::{self, EngineConfig};

/// Build an [`Engine`] with every collection in `config`
///
/// # Errors
/// Returns `CommonError::Config` if any collection configuration is invalid
/// (no collection is registered in that case).
pub fn start_engine<V>(config: &EngineConfig) -> CommonResult<Engine<V>>
where
    V: CacheValue,
{
    let engine = Engine::start(config.collections.iter().cloned()).map_err(|err| {
        let err = startup_error(err);
        tracing::error!(fields = ?err.as_tracing_fields(), "Cache engine failed to start");
        err
    })?;

    tracing::info!(collections = engine.len(), "Cache engine started");
    engine.info();
    Ok(engine)
}

/// Load configuration (environment first, then `path`) and start the engine
///
/// # Errors
/// Returns the loader's error if no configuration can be loaded (see
/// [`config::load_from_file`]) and `CommonError::Config` if it is invalid.
pub fn start_from<V>(path: Option<PathBuf>) -> CommonResult<Engine<V>>
where
    V: CacheValue,
{
    let config = config::load(path)?;
    start_engine(&config)
}

fn startup_error(err: CacheError) -> CommonError {
    match err {
        CacheError::Configuration { message } => {
            CommonError::config(format!("Invalid cache configuration: {message}"))
        }
        other => CommonError::internal_with_context(other.to_string(), "start_engine"),
    }
}
