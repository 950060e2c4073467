//! Circuit state machine.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls fail fast
//! - Half-Open: one trial call decides between Closed and Open
//!
//! # State Transitions
//! ```text
//! Closed    → Open:      failure_count >= failure_threshold after a failure
//! Open      → Half-Open: a call arrives at or after next_attempt_time
//! Open      → Half-Open: probe reports healthy at or after next_attempt_time
//! Half-Open → Closed:    trial call succeeds (failure_count reset)
//! Half-Open → Open:      trial call fails (fresh reset window)
//! ```
//!
//! Transitions are evaluated lazily when a call arrives; the health monitor
//! is the only proactive path. Nothing in this module performs I/O: every
//! method receives the current instant from its caller.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

use crate::health::state::HealthStatus;
use crate::resilience::clock::TimerHandle;
use crate::resilience::options::CircuitOptions;
use crate::resilience::samples::LatencySamples;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    #[default]
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    /// Numeric encoding used for the state gauge.
    pub fn as_gauge(self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::HalfOpen => 1.0,
            CircuitState::Open => 2.0,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// A state change, returned so callers can log and export it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: CircuitState,
    pub to: CircuitState,
}

/// Ticket of one admitted half-open trial. Only the outcome reported with
/// the ticket of the trial in flight can close or reopen the circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trial(u64);

/// Outcome of asking a circuit to admit a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The call may proceed. `trial` is set for the single half-open trial;
    /// `transition` is set when admitting it moved the circuit from Open to
    /// Half-Open.
    Allowed {
        trial: Option<Trial>,
        transition: Option<Transition>,
    },
    /// The call must not run before `next_attempt`.
    Rejected { next_attempt: Instant },
}

/// One named circuit. Owned by the registry behind a per-circuit lock.
#[derive(Debug)]
pub struct Circuit {
    name: String,
    state: CircuitState,
    failure_count: u32,
    total_calls: u64,
    successful_calls: u64,
    failed_calls: u64,
    last_failure_time: Option<Instant>,
    next_attempt_time: Option<Instant>,
    last_state_change_time: Instant,
    options: CircuitOptions,
    samples: LatencySamples,
    health_status: HealthStatus,
    health_timer: Option<TimerHandle>,
    trial_in_flight: Option<Trial>,
    trials_started: u64,
}

impl Circuit {
    pub fn new(name: impl Into<String>, options: CircuitOptions, now: Instant) -> Self {
        Self {
            name: name.into(),
            state: CircuitState::Closed,
            failure_count: 0,
            total_calls: 0,
            successful_calls: 0,
            failed_calls: 0,
            last_failure_time: None,
            next_attempt_time: None,
            last_state_change_time: now,
            options,
            samples: LatencySamples::default(),
            health_status: HealthStatus::Unknown,
            health_timer: None,
            trial_in_flight: None,
            trials_started: 0,
        }
    }

    /// Decide whether a call may run, performing the lazy Open → Half-Open
    /// edge. Admitted calls count toward `total_calls`; rejected ones don't.
    ///
    /// Every admitted call must be settled with [`Circuit::record_success`],
    /// [`Circuit::record_failure`] or [`Circuit::abandon_call`], which keeps
    /// `total_calls == successful_calls + failed_calls` once nothing is in
    /// flight.
    pub fn admit(&mut self, now: Instant) -> Admission {
        let mut transition = None;
        let trial = match self.state {
            CircuitState::Closed => None,
            CircuitState::Open => {
                let next_attempt = self.next_attempt_time.unwrap_or(now);
                if now < next_attempt {
                    return Admission::Rejected { next_attempt };
                }
                transition = Some(self.transition_to(CircuitState::HalfOpen, now));
                Some(self.start_trial())
            }
            CircuitState::HalfOpen => {
                if self.trial_in_flight.is_some() {
                    // A failing trial reopens for a full window from no
                    // earlier than now.
                    return Admission::Rejected {
                        next_attempt: now + self.options.reset_timeout(),
                    };
                }
                Some(self.start_trial())
            }
        };
        self.total_calls += 1;
        Admission::Allowed { trial, transition }
    }

    fn start_trial(&mut self) -> Trial {
        self.trials_started += 1;
        let trial = Trial(self.trials_started);
        self.trial_in_flight = Some(trial);
        trial
    }

    /// Clears the trial slot when `trial` is the one in flight.
    fn settle_trial(&mut self, trial: Option<Trial>) -> bool {
        if trial.is_some() && trial == self.trial_in_flight {
            self.trial_in_flight = None;
            return true;
        }
        false
    }

    /// Record a successful call. Only the current half-open trial closes
    /// the circuit; other late successes just update counters.
    pub fn record_success(
        &mut self,
        latency: Duration,
        now: Instant,
        trial: Option<Trial>,
    ) -> Option<Transition> {
        self.successful_calls += 1;
        self.samples.push(latency.as_secs_f64() * 1_000.0);

        if self.settle_trial(trial) && self.state == CircuitState::HalfOpen {
            return Some(self.transition_to(CircuitState::Closed, now));
        }
        None
    }

    /// Record a failed call. Closed trips at the threshold; Half-Open
    /// reopens only on the failure of its own trial.
    pub fn record_failure(
        &mut self,
        latency: Duration,
        now: Instant,
        trial: Option<Trial>,
    ) -> Option<Transition> {
        self.failure_count = self.failure_count.saturating_add(1);
        self.failed_calls += 1;
        self.last_failure_time = Some(now);
        self.samples.push(latency.as_secs_f64() * 1_000.0);

        if self.settle_trial(trial) {
            if self.state == CircuitState::HalfOpen {
                return Some(self.transition_to(CircuitState::Open, now));
            }
            return None;
        }
        match self.state {
            CircuitState::Closed if self.failure_count >= self.options.failure_threshold => {
                Some(self.transition_to(CircuitState::Open, now))
            }
            _ => None,
        }
    }

    /// Proactive Open → Half-Open edge driven by a healthy probe.
    pub fn try_health_recovery(&mut self, now: Instant) -> Option<Transition> {
        if self.state != CircuitState::Open || !self.health_status.is_healthy() {
            return None;
        }
        match self.next_attempt_time {
            Some(next_attempt) if now >= next_attempt => {
                Some(self.transition_to(CircuitState::HalfOpen, now))
            }
            _ => None,
        }
    }

    /// Force the circuit closed and clear failure bookkeeping.
    pub fn force_close(&mut self, now: Instant) -> Option<Transition> {
        self.trial_in_flight = None;
        self.last_failure_time = None;
        if self.state == CircuitState::Closed {
            self.failure_count = 0;
            self.next_attempt_time = None;
            return None;
        }
        Some(self.transition_to(CircuitState::Closed, now))
    }

    /// Settle an admitted call that was dropped before reporting an
    /// outcome: it no longer counts as a call, and a trial frees its slot.
    pub fn abandon_call(&mut self, trial: Option<Trial>) {
        self.total_calls = self.total_calls.saturating_sub(1);
        self.settle_trial(trial);
    }

    fn transition_to(&mut self, to: CircuitState, now: Instant) -> Transition {
        let from = self.state;
        self.state = to;
        self.last_state_change_time = now;
        match to {
            CircuitState::Open => {
                self.next_attempt_time = Some(now + self.options.reset_timeout());
            }
            CircuitState::Closed => {
                self.failure_count = 0;
                self.next_attempt_time = None;
            }
            CircuitState::HalfOpen => {
                self.next_attempt_time = None;
            }
        }
        Transition { from, to }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    pub fn total_calls(&self) -> u64 {
        self.total_calls
    }

    pub fn successful_calls(&self) -> u64 {
        self.successful_calls
    }

    /// Lifetime failures of admitted calls.
    pub fn failed_calls(&self) -> u64 {
        self.failed_calls
    }

    pub fn last_failure_time(&self) -> Option<Instant> {
        self.last_failure_time
    }

    pub fn next_attempt_time(&self) -> Option<Instant> {
        self.next_attempt_time
    }

    pub fn last_state_change_time(&self) -> Instant {
        self.last_state_change_time
    }

    pub fn options(&self) -> &CircuitOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut CircuitOptions {
        &mut self.options
    }

    pub fn average_response_time(&self) -> Option<f64> {
        self.samples.mean()
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn health_status(&self) -> HealthStatus {
        self.health_status
    }

    pub fn set_health_status(&mut self, status: HealthStatus) {
        self.health_status = status;
    }

    pub fn has_health_timer(&self) -> bool {
        self.health_timer.is_some()
    }

    /// Install a probe timer, cancelling any previous one.
    pub fn set_health_timer(&mut self, timer: Option<TimerHandle>) {
        if let Some(old) = self.health_timer.take() {
            old.cancel();
        }
        self.health_timer = timer;
    }

    pub fn cancel_health_timer(&mut self) {
        self.set_health_timer(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn circuit(threshold: u32, reset_ms: u64, now: Instant) -> Circuit {
        let options = CircuitOptions {
            failure_threshold: threshold,
            reset_timeout_ms: reset_ms,
            ..Default::default()
        };
        Circuit::new("svc", options, now)
    }

    fn trip(c: &mut Circuit, now: Instant) {
        for _ in 0..c.options().failure_threshold {
            assert!(matches!(c.admit(now), Admission::Allowed { trial: None, .. }));
            c.record_failure(Duration::from_millis(1), now, None);
        }
    }

    fn admit_trial(c: &mut Circuit, now: Instant) -> Trial {
        match c.admit(now) {
            Admission::Allowed { trial: Some(trial), .. } => trial,
            other => panic!("expected a trial, got {other:?}"),
        }
    }

    #[test]
    fn test_trips_open_at_threshold() {
        let t0 = Instant::now();
        let mut c = circuit(3, 5_000, t0);

        c.admit(t0);
        assert_eq!(c.record_failure(Duration::ZERO, t0, None), None);
        c.admit(t0);
        assert_eq!(c.record_failure(Duration::ZERO, t0, None), None);
        c.admit(t0);
        let transition = c.record_failure(Duration::ZERO, t0, None).unwrap();
        assert_eq!(transition.from, CircuitState::Closed);
        assert_eq!(transition.to, CircuitState::Open);

        assert_eq!(c.state(), CircuitState::Open);
        assert_eq!(c.next_attempt_time(), Some(t0 + Duration::from_millis(5_000)));
        assert!(c.next_attempt_time().unwrap() > c.last_state_change_time());
    }

    #[test]
    fn test_open_rejects_until_window_elapses() {
        let t0 = Instant::now();
        let mut c = circuit(1, 1_000, t0);
        trip(&mut c, t0);

        let before = t0 + Duration::from_millis(999);
        assert_eq!(
            c.admit(before),
            Admission::Rejected { next_attempt: t0 + Duration::from_millis(1_000) }
        );
        assert_eq!(c.total_calls(), 1);

        let at = t0 + Duration::from_millis(1_000);
        match c.admit(at) {
            Admission::Allowed { trial: Some(_), transition: Some(t) } => {
                assert_eq!(t.to, CircuitState::HalfOpen);
            }
            other => panic!("unexpected admission: {other:?}"),
        }
        assert_eq!(c.state(), CircuitState::HalfOpen);
        assert_eq!(c.next_attempt_time(), None);
        assert_eq!(c.total_calls(), 2);
    }

    #[test]
    fn test_half_open_admits_single_trial() {
        let t0 = Instant::now();
        let mut c = circuit(1, 100, t0);
        trip(&mut c, t0);

        let t1 = t0 + Duration::from_millis(100);
        admit_trial(&mut c, t1);

        let t2 = t0 + Duration::from_millis(130);
        assert_eq!(
            c.admit(t2),
            Admission::Rejected { next_attempt: t2 + Duration::from_millis(100) }
        );
    }

    #[test]
    fn test_half_open_success_closes() {
        let t0 = Instant::now();
        let mut c = circuit(2, 100, t0);
        trip(&mut c, t0);

        let t1 = t0 + Duration::from_millis(150);
        let trial = admit_trial(&mut c, t1);
        let transition = c.record_success(Duration::from_millis(3), t1, Some(trial)).unwrap();
        assert_eq!(transition.to, CircuitState::Closed);
        assert_eq!(c.failure_count(), 0);
        assert_eq!(c.next_attempt_time(), None);
        assert_eq!(c.last_state_change_time(), t1);
    }

    #[test]
    fn test_half_open_failure_reopens_with_fresh_window() {
        let t0 = Instant::now();
        let mut c = circuit(2, 100, t0);
        trip(&mut c, t0);

        let t1 = t0 + Duration::from_millis(400);
        let trial = admit_trial(&mut c, t1);
        let transition = c.record_failure(Duration::ZERO, t1, Some(trial)).unwrap();
        assert_eq!(transition.from, CircuitState::HalfOpen);
        assert_eq!(transition.to, CircuitState::Open);
        assert_eq!(c.next_attempt_time(), Some(t1 + Duration::from_millis(100)));
    }

    #[test]
    fn test_stale_outcomes_do_not_decide_the_trial() {
        let t0 = Instant::now();
        let mut c = circuit(2, 100, t0);

        // Admitted while closed, finishes during the trial.
        assert!(matches!(c.admit(t0), Admission::Allowed { trial: None, .. }));
        trip(&mut c, t0);

        let t1 = t0 + Duration::from_millis(150);
        let trial = admit_trial(&mut c, t1);

        let t2 = t0 + Duration::from_millis(300);
        assert_eq!(c.record_failure(Duration::ZERO, t2, None), None);
        assert_eq!(c.state(), CircuitState::HalfOpen);
        assert_eq!(c.record_success(Duration::ZERO, t2, None), None);
        assert_eq!(c.state(), CircuitState::HalfOpen);

        let t3 = t0 + Duration::from_millis(650);
        let transition = c.record_success(Duration::ZERO, t3, Some(trial)).unwrap();
        assert_eq!(transition.to, CircuitState::Closed);
        assert_eq!(c.failure_count(), 0);
    }

    #[test]
    fn test_trial_from_before_reset_is_ignored() {
        let t0 = Instant::now();
        let mut c = circuit(1, 100, t0);
        trip(&mut c, t0);
        let old = admit_trial(&mut c, t0 + Duration::from_millis(100));

        c.force_close(t0 + Duration::from_millis(110));
        trip(&mut c, t0 + Duration::from_millis(120));
        let current = admit_trial(&mut c, t0 + Duration::from_millis(220));
        assert_ne!(old, current);

        let t1 = t0 + Duration::from_millis(230);
        assert_eq!(c.record_failure(Duration::ZERO, t1, Some(old)), None);
        assert_eq!(c.state(), CircuitState::HalfOpen);
        let transition = c.record_success(Duration::ZERO, t1, Some(current)).unwrap();
        assert_eq!(transition.to, CircuitState::Closed);
    }

    #[test]
    fn test_abandoned_calls_leave_counters_consistent() {
        let t0 = Instant::now();
        let mut c = circuit(1, 100, t0);
        c.admit(t0);
        c.abandon_call(None);
        assert_eq!(c.total_calls(), 0);

        trip(&mut c, t0);
        let t1 = t0 + Duration::from_millis(100);
        let trial = admit_trial(&mut c, t1);
        c.abandon_call(Some(trial));

        assert_eq!(c.total_calls(), c.successful_calls() + c.failed_calls());
        // The slot is free again.
        admit_trial(&mut c, t1);
    }

    #[test]
    fn test_success_while_closed_keeps_failure_count() {
        let t0 = Instant::now();
        let mut c = circuit(3, 100, t0);
        c.admit(t0);
        c.record_failure(Duration::ZERO, t0, None);
        c.admit(t0);
        c.record_success(Duration::ZERO, t0, None);
        assert_eq!(c.failure_count(), 1);
        assert_eq!(c.state(), CircuitState::Closed);
    }

    #[test]
    fn test_health_recovery_requires_healthy_and_elapsed_window() {
        let t0 = Instant::now();
        let mut c = circuit(1, 1_000, t0);
        trip(&mut c, t0);

        let t1 = t0 + Duration::from_millis(1_500);
        assert_eq!(c.try_health_recovery(t1), None);

        c.set_health_status(HealthStatus::Healthy);
        assert_eq!(c.try_health_recovery(t0 + Duration::from_millis(10)), None);

        let transition = c.try_health_recovery(t1).unwrap();
        assert_eq!(transition.to, CircuitState::HalfOpen);
        // The next call is the trial.
        assert!(matches!(
            c.admit(t1),
            Admission::Allowed { trial: Some(_), transition: None }
        ));
    }

    #[test]
    fn test_force_close_resets_failures() {
        let t0 = Instant::now();
        let mut c = circuit(1, 1_000, t0);
        trip(&mut c, t0);

        let transition = c.force_close(t0).unwrap();
        assert_eq!(transition.to, CircuitState::Closed);
        assert_eq!(c.failure_count(), 0);
        assert_eq!(c.last_failure_time(), None);
        assert!(matches!(c.admit(t0), Admission::Allowed { .. }));
    }
}
