//! Configuration validation.
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use thiserror::Error;

use crate::config::schema::ServiceConfig;
use crate::resilience::options::{CircuitOptions, RetryConfig};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{scope}: failure_threshold must be greater than 0")]
    ZeroFailureThreshold { scope: String },

    #[error("{scope}: reset_timeout_ms must be greater than 0")]
    ZeroResetTimeout { scope: String },

    #[error("{scope}: timeout_ms must be greater than 0")]
    ZeroTimeout { scope: String },

    #[error("{scope}: invalid health_check_path '{path}': {reason}")]
    InvalidHealthCheckPath { scope: String, path: String, reason: String },

    #[error("retry: base_delay_ms must be greater than 0")]
    ZeroBaseDelay,

    #[error("retry: max_delay_ms ({max}) is below base_delay_ms ({base})")]
    MaxDelayBelowBase { base: u64, max: u64 },

    #[error("health: sweep_interval_ms must be greater than 0")]
    ZeroSweepInterval,

    #[error("circuits: empty circuit name")]
    EmptyCircuitName,

    #[error("circuits: duplicate circuit name '{0}'")]
    DuplicateCircuit(String),

    #[error("admin: api_key must not be empty when the admin API is enabled")]
    EmptyApiKey,

    #[error("{field}: invalid socket address '{value}'")]
    InvalidAddress { field: &'static str, value: String },
}

/// Validate a whole config, collecting every problem.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    validate_options("defaults", &config.defaults, &mut errors);
    validate_retry(&config.retry, &mut errors);

    if config.health.sweep_enabled && config.health.sweep_interval_ms == 0 {
        errors.push(ValidationError::ZeroSweepInterval);
    }

    let mut seen = HashSet::new();
    for circuit in &config.circuits {
        if circuit.name.trim().is_empty() {
            errors.push(ValidationError::EmptyCircuitName);
            continue;
        }
        if !seen.insert(circuit.name.as_str()) {
            errors.push(ValidationError::DuplicateCircuit(circuit.name.clone()));
        }
        let mut merged = config.defaults.clone();
        circuit.options.apply(&mut merged);
        validate_options(&format!("circuits.{}", circuit.name), &merged, &mut errors);
    }

    if config.admin.enabled {
        if config.admin.api_key.is_empty() {
            errors.push(ValidationError::EmptyApiKey);
        }
        check_address("admin.bind_address", &config.admin.bind_address, &mut errors);
    }
    if config.observability.metrics_enabled {
        check_address(
            "observability.metrics_address",
            &config.observability.metrics_address,
            &mut errors,
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate one set of circuit options.
pub fn validate_options(scope: &str, options: &CircuitOptions, errors: &mut Vec<ValidationError>) {
    if options.failure_threshold == 0 {
        errors.push(ValidationError::ZeroFailureThreshold { scope: scope.to_string() });
    }
    if options.reset_timeout_ms == 0 {
        errors.push(ValidationError::ZeroResetTimeout { scope: scope.to_string() });
    }
    if options.timeout_ms == Some(0) {
        errors.push(ValidationError::ZeroTimeout { scope: scope.to_string() });
    }
    if let Some(path) = &options.health_check_path {
        if let Err(e) = url::Url::parse(path) {
            errors.push(ValidationError::InvalidHealthCheckPath {
                scope: scope.to_string(),
                path: path.clone(),
                reason: e.to_string(),
            });
        }
    }
}

fn validate_retry(retry: &RetryConfig, errors: &mut Vec<ValidationError>) {
    if retry.base_delay_ms == 0 {
        errors.push(ValidationError::ZeroBaseDelay);
    }
    if retry.max_delay_ms < retry.base_delay_ms {
        errors.push(ValidationError::MaxDelayBelowBase {
            base: retry.base_delay_ms,
            max: retry.max_delay_ms,
        });
    }
}

fn check_address(field: &'static str, value: &str, errors: &mut Vec<ValidationError>) {
    if value.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}
