//! Read-only status and fleet statistics.

use serde::{Deserialize, Serialize};

use crate::health::state::HealthStatus;
use crate::resilience::circuit::{Circuit, CircuitState};
use crate::resilience::clock::Clock;

/// Snapshot of one circuit for external consumers.
///
/// Timestamps are unix-epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CircuitBreakerStatus {
    pub name: String,
    pub state: CircuitState,
    pub failures: u32,
    pub total_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    pub last_failure_time: Option<u64>,
    pub next_attempt_time: Option<u64>,
    pub last_state_change_time: u64,
    pub health_check_status: HealthStatus,
    pub average_response_time_ms: f64,
    pub uptime_ms: u64,
}

impl CircuitBreakerStatus {
    pub fn from_circuit(circuit: &Circuit, clock: &dyn Clock) -> Self {
        let now = clock.now();
        Self {
            name: circuit.name().to_string(),
            state: circuit.state(),
            failures: circuit.failure_count(),
            total_calls: circuit.total_calls(),
            successful_calls: circuit.successful_calls(),
            failed_calls: circuit.failed_calls(),
            last_failure_time: circuit.last_failure_time().map(|t| clock.to_unix_millis(t)),
            next_attempt_time: match circuit.state() {
                CircuitState::Open => circuit.next_attempt_time().map(|t| clock.to_unix_millis(t)),
                _ => None,
            },
            last_state_change_time: clock.to_unix_millis(circuit.last_state_change_time()),
            health_check_status: circuit.health_status(),
            average_response_time_ms: circuit.average_response_time().unwrap_or(0.0),
            uptime_ms: now
                .saturating_duration_since(circuit.last_state_change_time())
                .as_millis() as u64,
        }
    }
}

/// Fleet-wide roll-up across every registered circuit.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CircuitBreakerMetrics {
    pub total_circuits: usize,
    pub closed_circuits: usize,
    pub open_circuits: usize,
    pub half_open_circuits: usize,
    pub total_calls: u64,
    pub total_failures: u64,
    /// Percentage of admitted calls that succeeded; 100 with no calls.
    pub success_rate: f64,
    /// Mean of per-circuit averages, over circuits that have samples.
    pub average_response_time_ms: f64,
    pub circuits: Vec<CircuitBreakerStatus>,
}

/// Roll up per-circuit statuses.
pub fn aggregate(circuits: Vec<CircuitBreakerStatus>) -> CircuitBreakerMetrics {
    let mut closed = 0;
    let mut open = 0;
    let mut half_open = 0;
    let mut total_calls = 0u64;
    let mut total_failures = 0u64;
    let mut latency_sum = 0.0;
    let mut latency_count = 0usize;

    for status in &circuits {
        match status.state {
            CircuitState::Closed => closed += 1,
            CircuitState::Open => open += 1,
            CircuitState::HalfOpen => half_open += 1,
        }
        total_calls += status.total_calls;
        total_failures += status.failed_calls;
        if status.total_calls > 0 {
            latency_sum += status.average_response_time_ms;
            latency_count += 1;
        }
    }

    let success_rate = if total_calls == 0 {
        100.0
    } else {
        total_calls.saturating_sub(total_failures) as f64 / total_calls as f64 * 100.0
    };
    let average_response_time_ms = if latency_count == 0 {
        0.0
    } else {
        latency_sum / latency_count as f64
    };

    CircuitBreakerMetrics {
        total_circuits: circuits.len(),
        closed_circuits: closed,
        open_circuits: open,
        half_open_circuits: half_open,
        total_calls,
        total_failures,
        success_rate,
        average_response_time_ms,
        circuits,
    }
}
