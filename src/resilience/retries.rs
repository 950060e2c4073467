//! Retry logic.
//!
//! # Responsibilities
//! - Re-run a failed protected call with exponential backoff + jitter
//! - Stop as soon as the circuit is open (further attempts are pointless)
//! - Surface the last failure once attempts are exhausted
//!
//! # Design Decisions
//! - Timeouts and operation errors are retryable
//! - `CircuitOpen` and `InvalidOptions` are never retried
//! - Jittered backoff prevents thundering herd

use std::fmt;
use std::future::Future;
use tokio::time;

use crate::observability::metrics;
use crate::resilience::backoff::retry_delay;
use crate::resilience::circuit::CircuitState;
use crate::resilience::error::BreakerResult;
use crate::resilience::executor::CircuitBreakerExecutor;
use crate::resilience::options::{CircuitOptionsUpdate, RetryConfig};

#[derive(Debug, Clone)]
pub struct RetryExecutor {
    breaker: CircuitBreakerExecutor,
}

impl RetryExecutor {
    pub fn new(breaker: CircuitBreakerExecutor) -> Self {
        Self { breaker }
    }

    pub fn breaker(&self) -> &CircuitBreakerExecutor {
        &self.breaker
    }

    /// Run `operation` through circuit `name`, retrying per `retry`.
    ///
    /// Makes at most `retry.max_retries + 1` attempts.
    pub async fn execute_with_retry<T, E, F, Fut>(
        &self,
        name: &str,
        mut operation: F,
        retry: &RetryConfig,
        update: Option<&CircuitOptionsUpdate>,
    ) -> BreakerResult<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let mut attempt: u32 = 0;
        loop {
            let error = match self.breaker.execute(name, update, &mut operation).await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::info!(circuit = %name, attempt, "Call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            if error.is_invalid_options() {
                return Err(error);
            }

            if error.is_circuit_open() || self.breaker.state(name) == Some(CircuitState::Open) {
                tracing::debug!(circuit = %name, attempt, error = %error, "Circuit open, not retrying");
                return Err(error);
            }

            if attempt >= retry.max_retries {
                tracing::warn!(
                    circuit = %name,
                    attempts = attempt + 1,
                    error = %error,
                    "Retries exhausted"
                );
                return Err(error);
            }

            let delay = retry_delay(attempt, retry);
            tracing::info!(
                circuit = %name,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying call"
            );
            metrics::record_retry(name);
            time::sleep(delay).await;
            attempt += 1;
        }
    }
}
