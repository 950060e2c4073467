//! Errors surfaced by protected calls.

use thiserror::Error;

use crate::config::validation::ValidationError;

/// Options for a circuit were rejected; nothing was changed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid options for circuit '{name}': {}", join_errors(.errors))]
pub struct InvalidOptions {
    pub name: String,
    pub errors: Vec<ValidationError>,
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Failure of a call made through a circuit.
///
/// `E` is the operation's own error type, passed through unchanged.
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The circuit rejected the call; the operation was never invoked.
    #[error("circuit '{name}' is open, next attempt at {next_attempt_time} (unix ms)")]
    CircuitOpen {
        name: String,
        next_attempt_time: u64,
    },

    /// The operation did not finish within its deadline.
    #[error("operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The merged circuit options are unusable; the operation was never
    /// invoked.
    #[error(transparent)]
    InvalidOptions(#[from] InvalidOptions),

    /// The operation itself failed.
    #[error(transparent)]
    Operation(E),
}

impl<E> BreakerError<E> {
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, BreakerError::CircuitOpen { .. })
    }

    pub fn is_invalid_options(&self) -> bool {
        matches!(self, BreakerError::InvalidOptions(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, BreakerError::Timeout { .. })
    }

    /// The operation's error, if that is what this is.
    pub fn into_operation(self) -> Option<E> {
        match self {
            BreakerError::Operation(e) => Some(e),
            _ => None,
        }
    }

    /// Label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            BreakerError::CircuitOpen { .. } => "circuit_open",
            BreakerError::Timeout { .. } => "timeout",
            BreakerError::InvalidOptions(_) => "invalid_options",
            BreakerError::Operation(_) => "failure",
        }
    }
}

/// Shorthand for results of protected calls.
pub type BreakerResult<T, E> = Result<T, BreakerError<E>>;
