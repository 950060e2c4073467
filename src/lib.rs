//! Circuit breaker, retry and timeout protection for named downstream calls.

pub mod admin;
pub mod config;
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::ServiceConfig;
pub use health::{HealthProbe, HealthStatus, HttpProbe};
pub use lifecycle::Shutdown;
pub use resilience::{
    BreakerError, BreakerResult, CircuitBreakerManager, CircuitBreakerMetrics,
    CircuitBreakerStatus, CircuitOptions, CircuitOptionsUpdate, CircuitState, RetryConfig,
};
