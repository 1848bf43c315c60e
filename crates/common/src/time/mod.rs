//! Time abstractions
//!
//! TTL bookkeeping never calls `Instant::now()` directly; it goes through a
//! [`Clock`] so tests can move time forward without sleeping.
//!
//! ```rust
//! use std::time::Duration;
//!
//! use smartcache_common::time::{Clock, MockClock};
//!
//! let clock = MockClock::new();
//! let start = clock.now();
//! clock.advance(Duration::from_secs(5));
//! assert_eq!(clock.now().duration_since(start), Duration::from_secs(5));
//! ```

mod clock;

pub use clock::{Clock, MockClock, SystemClock};
