//! # SmartCache Infrastructure
//!
//! Outer layer around `smartcache-core`.
//!
//! This crate contains:
//! - Configuration loading (environment variables, TOML/JSON files)
//! - Tracing subscriber installation
//! - Engine bootstrap from a loaded configuration
//!
//! ## Architecture
//! - Depends on `smartcache-common` and `smartcache-core`
//! - Contains all "impure" code (environment, file system, global
//!   subscriber)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod bootstrap;
pub mod config;
pub mod observability;

// Re-export commonly used items
pub use bootstrap::{start_engine, start_from};
pub use config::{EngineConfig, LogFormat, LoggingConfig};
pub use observability::init_tracing;
