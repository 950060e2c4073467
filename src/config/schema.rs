//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML. Every
//! section has defaults so a minimal (even empty) file is valid.

use serde::{Deserialize, Serialize};

use crate::resilience::options::{CircuitOptions, CircuitOptionsUpdate, RetryConfig};

/// Root configuration for the resilience sidecar.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Admin API settings.
    pub admin: AdminConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,

    /// Options every new circuit starts from.
    pub defaults: CircuitOptions,

    /// Retry policy used when a caller supplies none.
    pub retry: RetryConfig,

    /// Global health sweep settings.
    pub health: HealthSweepConfig,

    /// Circuits created at startup.
    pub circuits: Vec<CircuitConfig>,
}

/// A circuit declared up front, with overrides on top of `defaults`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CircuitConfig {
    /// Unique circuit name.
    pub name: String,

    /// Overrides merged into the defaults.
    #[serde(default, flatten)]
    pub options: CircuitOptionsUpdate,
}

/// Global health sweep configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthSweepConfig {
    /// Run the periodic sweep over every circuit with a probe target.
    pub sweep_enabled: bool,

    /// Sweep period in milliseconds.
    pub sweep_interval_ms: u64,

    /// Deadline of a single probe in milliseconds.
    pub probe_timeout_ms: u64,
}

impl Default for HealthSweepConfig {
    fn default() -> Self {
        Self {
            sweep_enabled: true,
            sweep_interval_ms: 30_000,
            probe_timeout_ms: 5_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log format ("pretty" or "json").
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
