//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Build manager → Declare circuits → Start sweep
//!
//! Reload (startup.rs):
//!     Watcher delivers config → Apply circuit options → Swap config
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop admin server → Stop sweep → Cancel timers
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
