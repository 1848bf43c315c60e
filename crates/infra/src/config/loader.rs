//! Configuration loader
//!
//! Loads the engine configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If `SMARTCACHE_COLLECTIONS` is not set, falls back to a file
//! 3. Without an explicit path, probes standard locations
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `SMARTCACHE_COLLECTIONS`: comma-separated collection names (required)
//! - `SMARTCACHE_<NAME>_CAPACITY`: maximum entries for collection `<NAME>`
//! - `SMARTCACHE_<NAME>_TTL_MS`: entry time-to-live in milliseconds
//! - `SMARTCACHE_<NAME>_GC_INTERVAL_MS`: background sweep period in
//!   milliseconds
//! - `SMARTCACHE_LOG_FILTER`: default `EnvFilter` directives
//! - `SMARTCACHE_LOG_FORMAT`: `text` or `json`
//!
//! `<NAME>` is the collection name upper-cased, with every character that is
//! not ASCII alphanumeric replaced by `_` (`user-sessions` becomes
//! `USER_SESSIONS`).
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./smartcache.toml` or `./smartcache.json` (current working directory)
//! 2. `./config/smartcache.toml` or `./config/smartcache.json`
//! 3. Next to the executable

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use smartcache_common::{CommonError, CommonResult};
use smartcache_core::CollectionConfig;

use super::{EngineConfig, LoggingConfig};

const COLLECTIONS_VAR: &str = "SMARTCACHE_COLLECTIONS";
const LOG_FILTER_VAR: &str = "SMARTCACHE_LOG_FILTER";
const LOG_FORMAT_VAR: &str = "SMARTCACHE_LOG_FORMAT";

const CONFIG_FILE_NAMES: [&str; 2] = ["smartcache.toml", "smartcache.json"];

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If
/// `SMARTCACHE_COLLECTIONS` is missing, falls back to `path` (or the probed
/// standard locations when `path` is `None`).
///
/// # Errors
/// Returns `CommonError::Config` if environment variables are present but
/// invalid, otherwise whatever [`load_from_file`] returns.
pub fn load(path: Option<PathBuf>) -> CommonResult<EngineConfig> {
    if std::env::var_os(COLLECTIONS_VAR).is_none() {
        tracing::debug!(var = COLLECTIONS_VAR, "Not set, loading configuration from file");
        return load_from_file(path);
    }

    let config = load_from_env()?;
    tracing::info!(
        collections = config.collections.len(),
        "Configuration loaded from environment variables"
    );
    Ok(config)
}

/// Load configuration from environment variables
///
/// # Environment Variables
/// See module documentation for the complete list.
///
/// # Errors
/// Returns `CommonError::Config` if `SMARTCACHE_COLLECTIONS` is missing or
/// empty, or any per-collection variable has an invalid value.
pub fn load_from_env() -> CommonResult<EngineConfig> {
    let names = env_var(COLLECTIONS_VAR)?;

    let collections = names
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(collection_from_env)
        .collect::<CommonResult<Vec<_>>>()?;

    if collections.is_empty() {
        return Err(CommonError::config_field(COLLECTIONS_VAR, "No collection names listed"));
    }

    let logging = LoggingConfig {
        filter: std::env::var(LOG_FILTER_VAR).ok(),
        format: env_parse(LOG_FORMAT_VAR)?.unwrap_or_default(),
    };

    Ok(EngineConfig { collections, logging })
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations. Supports both JSON
/// and TOML formats (detected by file extension).
///
/// # Errors
/// - `CommonError::NotFound` if `path` does not exist, or no standard
///   location holds a config file when `path` is `None`
/// - `CommonError::Persistence` if the file cannot be read
/// - `CommonError::Serialization` if the contents do not parse
/// - `CommonError::Config` for an unsupported file extension
pub fn load_from_file(path: Option<PathBuf>) -> CommonResult<EngineConfig> {
    let config_path = match path {
        Some(p) if !p.exists() => {
            return Err(CommonError::not_found_with_id("Config file", p.display().to_string()));
        }
        Some(p) => p,
        None => probe_config_paths().ok_or_else(|| CommonError::not_found("Config file"))?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)?;
    parse_config(&contents, &config_path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
///
/// # Errors
/// Returns `CommonError::Serialization` if parsing fails and
/// `CommonError::Config` for an unknown extension.
fn parse_config(contents: &str, path: &Path) -> CommonResult<EngineConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    let config: EngineConfig = match extension {
        "toml" => toml::from_str(contents)?,
        "json" => serde_json::from_str(contents)?,
        _ => return Err(CommonError::config(format!("Unsupported config format: {extension}"))),
    };
    Ok(config)
}

/// Probe standard paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        let nested = cwd.join("config");
        dirs.extend([cwd, nested]);
    }
    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)) {
        dirs.push(exe_dir);
    }

    dirs.iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.exists())
}

/// Build one collection's configuration from its prefixed variables
fn collection_from_env(name: &str) -> CommonResult<CollectionConfig> {
    let prefix = format!("SMARTCACHE_{}", env_key(name));
    let mut config = CollectionConfig::new(name);

    if let Some(capacity) = env_parse::<usize>(&format!("{prefix}_CAPACITY"))? {
        config.capacity = capacity;
    }
    if let Some(ttl) = env_parse::<u64>(&format!("{prefix}_TTL_MS"))? {
        config.ttl = Duration::from_millis(ttl);
    }
    if let Some(interval) = env_parse::<u64>(&format!("{prefix}_GC_INTERVAL_MS"))? {
        config.gc_interval = Duration::from_millis(interval);
    }

    Ok(config)
}

/// Environment-variable form of a collection name
fn env_key(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect()
}

/// Get required environment variable
///
/// # Errors
/// Returns `CommonError::Config` if the variable is not set.
fn env_var(key: &str) -> CommonResult<String> {
    std::env::var(key).map_err(|_| {
        CommonError::config_field(key, format!("Missing required environment variable: {key}"))
    })
}

/// Parse an optional environment variable
///
/// # Errors
/// Returns `CommonError::Config` if the variable is set but does not parse.
fn env_parse<T>(key: &str) -> CommonResult<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| CommonError::config_field(key, format!("Invalid value '{raw}': {e}"))),
        Err(_) => Ok(None),
    }
}
