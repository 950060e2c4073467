//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Executor, retry loop, health monitor produce:
//!     → logging.rs (structured log events, pretty or JSON)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout / log aggregation
//!     → Prometheus scrape endpoint
//! ```

pub mod logging;
pub mod metrics;
