//! Building the manager from configuration and applying reloads.
//!
//! # Design Decisions
//! - Fail fast: a config that does not validate never reaches this module
//! - Defaults and retry policy are fixed at startup; a reload only touches
//!   the circuits it declares

use std::sync::Arc;
use std::time::Duration;

use crate::config::schema::{CircuitConfig, ServiceConfig};
use crate::health::probe::HttpProbe;
use crate::resilience::clock::TokioClock;
use crate::resilience::manager::CircuitBreakerManager;

/// Build a manager with HTTP probes and declare every configured circuit.
pub fn build_manager(config: &ServiceConfig) -> CircuitBreakerManager {
    let probe = HttpProbe::new(Duration::from_millis(config.health.probe_timeout_ms));
    let manager = CircuitBreakerManager::new(
        config.defaults.clone(),
        config.retry.clone(),
        Arc::new(probe),
        Arc::new(TokioClock),
    );
    apply_circuits(&manager, &config.circuits);

    tracing::info!(circuits = config.circuits.len(), "Circuit breaker manager ready");
    manager
}

/// Push declared circuit options into the manager, creating circuits that
/// do not exist yet. Returns how many circuits were created.
pub fn apply_circuits(manager: &CircuitBreakerManager, circuits: &[CircuitConfig]) -> usize {
    let mut created = 0;
    for circuit in circuits {
        if manager.registry().get(&circuit.name).is_some() {
            manager.update_circuit_options(&circuit.name, &circuit.options);
            continue;
        }
        match manager.declare_circuit(&circuit.name, Some(&circuit.options)) {
            Ok(()) => created += 1,
            Err(e) => tracing::warn!(error = %e, "Skipping declared circuit"),
        }
    }
    created
}
