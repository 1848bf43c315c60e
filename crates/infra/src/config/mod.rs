//! Configuration loading and management
//!
//! This module provides the engine configuration types and utilities for
//! loading them from environment variables and files.

pub mod loader;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use smartcache_common::CommonError;
use smartcache_core::CollectionConfig;

// Re-export commonly used items
pub use loader::{load, load_from_env, load_from_file, probe_config_paths};

/// Top-level configuration: every collection plus logging settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Collections to register at startup
    #[serde(default)]
    pub collections: Vec<CollectionConfig>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Tracing subscriber settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directives used when `RUST_LOG` is not set
    #[serde(default)]
    pub filter: Option<String>,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

/// Log line format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl FromStr for LogFormat {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(CommonError::config_field(
                "logging.format",
                format!("Unknown log format '{other}' (expected 'text' or 'json')"),
            )),
        }
    }
}
