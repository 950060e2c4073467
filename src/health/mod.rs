//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Per-circuit timer (active.rs):
//!     every health_check_interval_ms
//!     → probe.rs (GET health_check_path, 5s deadline)
//!     → state.rs (healthy / unhealthy)
//!     → open circuit past its window? move to half-open
//!
//! Global sweep (active.rs):
//!     every 30s, or on demand
//!     → same probe for every circuit with a target
//! ```
//!
//! # Design Decisions
//! - Probe failures never reach application callers
//! - A healthy probe never cuts the open window short; it only takes the
//!   half-open edge without waiting for a call
//! - Timers hold weak references, so removing a circuit releases it

pub mod active;
pub mod probe;
pub mod state;

pub use active::HealthMonitor;
pub use probe::{HealthProbe, HttpProbe};
pub use state::HealthStatus;
