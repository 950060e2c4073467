//! Protected call execution through a named circuit.
//!
//! # Flow
//! ```text
//! execute(name, update, op)
//!     → registry: get or create circuit, merge options (invalid? fail fast)
//!     → circuit.admit(now): rejected? fail fast, op never invoked
//!     → timeouts: run op with the circuit's deadline, if any
//!     → circuit.record_success / record_failure (dropped early: abandon_call)
//!     → return the op's result (or the timeout) unchanged
//! ```
//!
//! The circuit lock is only held for the admission and the recording step,
//! never across the operation itself.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::health::active::HealthMonitor;
use crate::observability::metrics;
use crate::resilience::circuit::{Admission, CircuitState, Transition, Trial};
use crate::resilience::clock::Clock;
use crate::resilience::error::{BreakerError, BreakerResult, InvalidOptions};
use crate::resilience::options::CircuitOptionsUpdate;
use crate::resilience::registry::{CircuitRef, CircuitRegistry};
use crate::resilience::timeouts::maybe_with_timeout;

/// Log a state change and update the state gauge.
pub(crate) fn report_transition(name: &str, transition: Transition) {
    match transition.to {
        CircuitState::Open => tracing::warn!(
            circuit = %name,
            from = %transition.from,
            to = %transition.to,
            "Circuit opened"
        ),
        _ => tracing::info!(
            circuit = %name,
            from = %transition.from,
            to = %transition.to,
            "Circuit state changed"
        ),
    }
    metrics::record_state(name, transition.to);
}

/// Settles an admitted call that is dropped before it reports an outcome.
struct CallGuard<'a> {
    circuit: &'a CircuitRef,
    trial: Option<Trial>,
    armed: bool,
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.circuit.lock().abandon_call(self.trial);
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerExecutor {
    registry: Arc<CircuitRegistry>,
    monitor: Arc<HealthMonitor>,
    clock: Arc<dyn Clock>,
}

impl CircuitBreakerExecutor {
    pub fn new(
        registry: Arc<CircuitRegistry>,
        monitor: Arc<HealthMonitor>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            monitor,
            clock,
        }
    }

    /// Get or create the circuit, merging `update` and (re)scheduling its
    /// health probe when needed.
    pub fn resolve(
        &self,
        name: &str,
        update: Option<&CircuitOptionsUpdate>,
    ) -> Result<CircuitRef, InvalidOptions> {
        let resolved = self
            .registry
            .get_or_create(name, update, self.clock.now())
            .inspect_err(|e| tracing::warn!(circuit = %name, error = %e, "Circuit options rejected"))?;
        if resolved.created {
            metrics::record_state(name, CircuitState::Closed);
        }
        if resolved.created || resolved.change.health_changed {
            self.monitor.schedule(&resolved.circuit);
        }
        Ok(resolved.circuit)
    }

    /// Current state of a circuit, if it exists.
    pub fn state(&self, name: &str) -> Option<CircuitState> {
        self.registry.get(name).map(|c| c.lock().state())
    }

    /// Run `operation` through the circuit `name`.
    ///
    /// Fails with [`BreakerError::CircuitOpen`] without calling `operation`
    /// while the circuit rejects calls, and with
    /// [`BreakerError::InvalidOptions`] when `update` would leave the
    /// circuit with unusable options. Otherwise the outcome is recorded
    /// and returned unchanged, with deadline breaches reported as
    /// [`BreakerError::Timeout`].
    pub async fn execute<T, E, F, Fut>(
        &self,
        name: &str,
        update: Option<&CircuitOptionsUpdate>,
        operation: F,
    ) -> BreakerResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let circuit = self.resolve(name, update)?;

        let now = self.clock.now();
        let (admission, timeout) = {
            let mut guard = circuit.lock();
            (guard.admit(now), guard.options().timeout())
        };

        let trial = match admission {
            Admission::Rejected { next_attempt } => {
                let next_attempt_time = self.clock.to_unix_millis(next_attempt);
                tracing::debug!(circuit = %name, next_attempt_time, "Call rejected by open circuit");
                metrics::record_rejected(name);
                return Err(BreakerError::CircuitOpen {
                    name: name.to_string(),
                    next_attempt_time,
                });
            }
            Admission::Allowed { trial, transition } => {
                if let Some(transition) = transition {
                    report_transition(name, transition);
                }
                trial
            }
        };

        let mut call_guard = CallGuard {
            circuit: &circuit,
            trial,
            armed: true,
        };

        let start = self.clock.now();
        let result = maybe_with_timeout(operation(), timeout).await;
        let finished = self.clock.now();
        let latency = finished.saturating_duration_since(start);
        call_guard.armed = false;

        let transition = {
            let mut guard = circuit.lock();
            match &result {
                Ok(_) => guard.record_success(latency, finished, trial),
                Err(_) => guard.record_failure(latency, finished, trial),
            }
        };

        match &result {
            Ok(_) => metrics::record_call(name, "success", latency),
            Err(e) => {
                metrics::record_call(name, e.kind(), latency);
                tracing::debug!(
                    circuit = %name,
                    error = %e,
                    latency_ms = latency.as_millis() as u64,
                    "Protected call failed"
                );
            }
        }

        if let Some(transition) = transition {
            report_transition(name, transition);
        }

        result
    }
}

