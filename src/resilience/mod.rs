//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! manager.rs execute_with_retry(name, op, retry, options)
//!     → retries.rs (loop; stop on open circuit or exhausted attempts)
//!     → executor.rs execute(name, options, op)
//!         → registry.rs (get or create circuit)
//!         → circuit.rs (admit? Closed / Open / Half-Open)
//!         → timeouts.rs (deadline race)
//!         → circuit.rs (record outcome, maybe transition)
//!     → backoff.rs (delay before next attempt)
//!
//! manager.rs status / metrics
//!     → stats.rs (read-only projections)
//! ```
//!
//! # Design Decisions
//! - No global registry; the host owns a manager and passes it around
//! - One lock per circuit; calls on different names never contend
//! - An open circuit is never retried
//! - Time comes from an injected clock so tests run on paused tokio time

pub mod backoff;
pub mod circuit;
pub mod clock;
pub mod error;
pub mod executor;
pub mod manager;
pub mod options;
pub mod registry;
pub mod retries;
pub mod samples;
pub mod stats;
pub mod timeouts;

pub use circuit::CircuitState;
pub use error::{BreakerError, BreakerResult, InvalidOptions};
pub use manager::CircuitBreakerManager;
pub use options::{CircuitOptions, CircuitOptionsUpdate, RetryConfig};
pub use stats::{CircuitBreakerMetrics, CircuitBreakerStatus};
