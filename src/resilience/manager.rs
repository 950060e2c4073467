//! Public entry point tying the resilience pieces together.
//!
//! A [`CircuitBreakerManager`] is constructed by the host and shared (it is
//! cheap to clone); there is no process-wide instance.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::health::active::HealthMonitor;
use crate::health::probe::{HealthProbe, HttpProbe};
use crate::resilience::clock::{Clock, TokioClock};
use crate::resilience::error::{BreakerResult, InvalidOptions};
use crate::resilience::executor::{report_transition, CircuitBreakerExecutor};
use crate::resilience::options::{CircuitOptions, CircuitOptionsUpdate, RetryConfig};
use crate::resilience::registry::CircuitRegistry;
use crate::resilience::retries::RetryExecutor;
use crate::resilience::stats::{aggregate, CircuitBreakerMetrics, CircuitBreakerStatus};

#[derive(Debug, Clone)]
pub struct CircuitBreakerManager {
    registry: Arc<CircuitRegistry>,
    monitor: Arc<HealthMonitor>,
    retrier: RetryExecutor,
    retry_defaults: RetryConfig,
    clock: Arc<dyn Clock>,
}

impl CircuitBreakerManager {
    pub fn new(
        defaults: CircuitOptions,
        retry_defaults: RetryConfig,
        probe: Arc<dyn HealthProbe>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let registry = Arc::new(CircuitRegistry::new(defaults));
        let monitor = Arc::new(HealthMonitor::new(registry.clone(), probe, clock.clone()));
        let breaker = CircuitBreakerExecutor::new(registry.clone(), monitor.clone(), clock.clone());

        Self {
            registry,
            monitor,
            retrier: RetryExecutor::new(breaker),
            retry_defaults,
            clock,
        }
    }

    /// Default options, HTTP probes and the tokio clock.
    pub fn with_defaults() -> Self {
        Self::new(
            CircuitOptions::default(),
            RetryConfig::default(),
            Arc::new(HttpProbe::default()),
            Arc::new(TokioClock),
        )
    }

    pub fn registry(&self) -> &Arc<CircuitRegistry> {
        &self.registry
    }

    pub fn executor(&self) -> &CircuitBreakerExecutor {
        self.retrier.breaker()
    }

    /// Run `operation` once through circuit `name`.
    pub async fn execute<T, E, F, Fut>(
        &self,
        name: &str,
        operation: F,
        options: Option<&CircuitOptionsUpdate>,
    ) -> BreakerResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        self.executor().execute(name, options, operation).await
    }

    /// Run `operation` through circuit `name` with retries.
    ///
    /// Without an explicit `retry`, attempts and delay come from the
    /// circuit's `retry_count` / `retry_delay_ms` and the rest from the
    /// manager's retry defaults.
    pub async fn execute_with_retry<T, E, F, Fut>(
        &self,
        name: &str,
        operation: F,
        retry: Option<&RetryConfig>,
        options: Option<&CircuitOptionsUpdate>,
    ) -> BreakerResult<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let retry = match retry {
            Some(retry) => retry.clone(),
            None => {
                let circuit = self.executor().resolve(name, options)?;
                let derived = circuit.lock().options().retry_config(&self.retry_defaults);
                derived
            }
        };
        self.retrier
            .execute_with_retry(name, operation, &retry, options)
            .await
    }

    pub fn get_circuit_status(&self, name: &str) -> Option<CircuitBreakerStatus> {
        let circuit = self.registry.get(name)?;
        let guard = circuit.lock();
        Some(CircuitBreakerStatus::from_circuit(&guard, self.clock.as_ref()))
    }

    pub fn get_all_statuses(&self) -> Vec<CircuitBreakerStatus> {
        self.registry
            .snapshot()
            .iter()
            .map(|c| CircuitBreakerStatus::from_circuit(&c.lock(), self.clock.as_ref()))
            .collect()
    }

    pub fn get_metrics(&self) -> CircuitBreakerMetrics {
        aggregate(self.get_all_statuses())
    }

    /// Current effective options of a circuit.
    pub fn circuit_options(&self, name: &str) -> Option<CircuitOptions> {
        let circuit = self.registry.get(name)?;
        let options = circuit.lock().options().clone();
        Some(options)
    }

    pub fn circuit_names(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Force a circuit closed. False if the name is unknown.
    pub fn reset_circuit(&self, name: &str) -> bool {
        match self.registry.reset(name, self.clock.now()) {
            Some(transition) => {
                tracing::info!(circuit = %name, "Circuit reset");
                if let Some(transition) = transition {
                    report_transition(name, transition);
                }
                true
            }
            None => {
                tracing::debug!(circuit = %name, "Reset requested for unknown circuit");
                false
            }
        }
    }

    /// Delete a circuit and cancel its health timer. False if the name is
    /// unknown.
    pub fn remove_circuit(&self, name: &str) -> bool {
        match self.registry.remove(name) {
            Some(_) => {
                tracing::info!(circuit = %name, "Circuit removed");
                true
            }
            None => {
                tracing::debug!(circuit = %name, "Remove requested for unknown circuit");
                false
            }
        }
    }

    /// Merge `update` into an existing circuit's options, restarting its
    /// health timer when a health field changed. False if the name is
    /// unknown or the merged options do not validate, in which case the
    /// circuit keeps its current options.
    pub fn update_circuit_options(&self, name: &str, update: &CircuitOptionsUpdate) -> bool {
        let (circuit, change) = match self.registry.update(name, update) {
            Some(Ok(updated)) => updated,
            Some(Err(e)) => {
                tracing::warn!(circuit = %name, error = %e, "Circuit options rejected");
                return false;
            }
            None => return false,
        };

        if change.changed {
            tracing::info!(circuit = %name, health_changed = change.health_changed, "Circuit options updated");
        }
        if change.health_changed {
            self.monitor.schedule(&circuit);
        }
        true
    }

    /// Create a circuit ahead of its first call, or merge `options` into
    /// an existing one.
    pub fn declare_circuit(
        &self,
        name: &str,
        options: Option<&CircuitOptionsUpdate>,
    ) -> Result<(), InvalidOptions> {
        self.executor().resolve(name, options).map(|_| ())
    }

    /// Probe every circuit with a configured target right now.
    pub async fn check_all_circuits_health(&self) {
        self.monitor.check_all().await;
    }

    /// Start the periodic global sweep. Must be called within a tokio
    /// runtime.
    pub fn start_health_sweep(&self, interval: Duration, shutdown: broadcast::Receiver<()>) {
        self.monitor.start_sweep(interval, shutdown);
    }

    pub fn health_sweep_running(&self) -> bool {
        self.monitor.sweep_running()
    }

    /// Cancel every timer and forget every circuit.
    pub fn cleanup(&self) {
        self.monitor.stop_sweep();
        let count = self.registry.len();
        self.registry.clear();
        tracing::info!(circuits = count, "Circuit breakers cleaned up");
    }
}

impl Default for CircuitBreakerManager {
    fn default() -> Self {
        Self::with_defaults()
    }
}
