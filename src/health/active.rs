//! Active health checking.
//!
//! # Responsibilities
//! - Run a probe timer per circuit that has a target and an interval
//! - Run a coarse global sweep over every circuit with a target
//! - Record the probe outcome and nudge eligible open circuits to half-open

use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time;

use crate::health::probe::HealthProbe;
use crate::health::state::HealthStatus;
use crate::observability::metrics;
use crate::resilience::clock::{Clock, TimerHandle};
use crate::resilience::executor::report_transition;
use crate::resilience::registry::{CircuitRef, CircuitRegistry};

/// Default period of the global sweep.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub struct HealthMonitor {
    registry: Arc<CircuitRegistry>,
    probe: Arc<dyn HealthProbe>,
    clock: Arc<dyn Clock>,
    sweep: Mutex<Option<TimerHandle>>,
}

impl HealthMonitor {
    pub fn new(
        registry: Arc<CircuitRegistry>,
        probe: Arc<dyn HealthProbe>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            probe,
            clock,
            sweep: Mutex::new(None),
        }
    }

    /// (Re)start the probe timer of one circuit according to its current
    /// options, or cancel it when probing is not configured.
    pub fn schedule(&self, circuit: &CircuitRef) {
        let mut guard = circuit.lock();
        let Some((interval, target)) = guard.options().health_check() else {
            if guard.has_health_timer() {
                tracing::info!(circuit = %guard.name(), "Health checks disabled");
            }
            guard.cancel_health_timer();
            return;
        };

        let target = target.to_string();
        let weak: Weak<_> = Arc::downgrade(circuit);
        let probe = self.probe.clone();
        let clock = self.clock.clone();

        tracing::info!(
            circuit = %guard.name(),
            interval_ms = interval.as_millis() as u64,
            target = %target,
            "Health checks scheduled"
        );

        let timer = TimerHandle::spawn_every(interval, move || {
            let weak = weak.clone();
            let probe = probe.clone();
            let clock = clock.clone();
            let target = target.clone();
            async move {
                if let Some(circuit) = weak.upgrade() {
                    probe_circuit(&circuit, probe.as_ref(), clock.as_ref(), &target).await;
                }
            }
        });
        if timer.is_none() {
            tracing::warn!(circuit = %guard.name(), "No async runtime, health checks not started");
        }
        guard.set_health_timer(timer);
    }

    /// Probe every circuit that has a target, one after another.
    pub async fn check_all(&self) {
        for circuit in self.registry.snapshot() {
            let target = circuit.lock().options().health_check_target().map(str::to_string);
            if let Some(target) = target {
                probe_circuit(&circuit, self.probe.as_ref(), self.clock.as_ref(), &target).await;
            }
        }
    }

    /// Sweep all circuits every `interval` until `shutdown` fires or
    /// [`HealthMonitor::stop_sweep`] is called.
    pub fn start_sweep(self: &Arc<Self>, interval: Duration, shutdown: broadcast::Receiver<()>) {
        let monitor = self.clone();
        let task = tokio::spawn(async move { monitor.run_sweep(interval, shutdown).await });
        if let Some(previous) = self.sweep.lock().replace(TimerHandle::from_task(task)) {
            previous.cancel();
        }
    }

    async fn run_sweep(&self, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval_ms = interval.as_millis() as u64, "Health sweep starting");

        let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health sweep received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    pub fn stop_sweep(&self) {
        if let Some(sweep) = self.sweep.lock().take() {
            sweep.cancel();
        }
    }

    pub fn sweep_running(&self) -> bool {
        self.sweep
            .lock()
            .as_ref()
            .is_some_and(|sweep| !sweep.is_finished())
    }
}

/// Run one probe and apply its outcome to `circuit`.
pub async fn probe_circuit(
    circuit: &CircuitRef,
    probe: &dyn HealthProbe,
    clock: &dyn Clock,
    target: &str,
) {
    let healthy = probe.check(target).await;

    let (name, transition) = {
        let mut guard = circuit.lock();
        guard.set_health_status(HealthStatus::from_probe(healthy));
        let transition = guard.try_health_recovery(clock.now());
        (guard.name().to_string(), transition)
    };

    tracing::debug!(circuit = %name, healthy, "Health check completed");
    metrics::record_health(&name, healthy);

    if let Some(transition) = transition {
        tracing::info!(circuit = %name, "Healthy probe moved circuit to half-open ahead of its next call");
        report_transition(&name, transition);
    }
}
