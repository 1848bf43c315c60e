//! Foundation utilities shared across SmartCache crates.
//!
//! # Modules
//!
//! - [`error`]: error classification (`ErrorClassification`, `ErrorSeverity`)
//!   and the outer-layer `CommonError`
//! - [`time`]: the `Clock` abstraction used for TTL bookkeeping, with a
//!   controllable `MockClock` for deterministic tests
//! - [`utils`]: serde helpers such as [`duration_millis`]

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod error;
pub mod time;
pub mod utils;

// Re-export commonly used types and traits for convenience
pub use error::{CommonError, CommonResult, ErrorClassification, ErrorSeverity};
pub use time::{Clock, MockClock, SystemClock};
pub use utils::serde::duration_millis;
