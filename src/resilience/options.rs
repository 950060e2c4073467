//! Per-circuit and retry option types.
//!
//! All durations are milliseconds, matching the `*_ms` convention of the
//! config schema so the same types deserialize straight from TOML.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Options governing a single circuit.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitOptions {
    /// Failures needed to trip the circuit open.
    pub failure_threshold: u32,

    /// How long an open circuit rejects calls before allowing a trial.
    pub reset_timeout_ms: u64,

    /// Window used when reporting on the circuit.
    pub monitoring_period_ms: u64,

    /// Deadline applied to each protected call, if any.
    pub timeout_ms: Option<u64>,

    /// Attempts used by callers that retry with the circuit's own settings.
    pub retry_count: u32,

    /// Delay between those attempts.
    pub retry_delay_ms: u64,

    /// Health probe interval; probing is off when unset or zero.
    pub health_check_interval_ms: Option<u64>,

    /// Probe target (an absolute URL).
    pub health_check_path: Option<String>,
}

impl Default for CircuitOptions {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_ms: 60_000,
            monitoring_period_ms: 10_000,
            timeout_ms: None,
            retry_count: 3,
            retry_delay_ms: 1_000,
            health_check_interval_ms: None,
            health_check_path: None,
        }
    }
}

impl CircuitOptions {
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Interval and target for the per-circuit probe, when both are usable.
    pub fn health_check(&self) -> Option<(Duration, &str)> {
        match (self.health_check_interval_ms, self.health_check_path.as_deref()) {
            (Some(ms), Some(path)) if ms > 0 && !path.is_empty() => {
                Some((Duration::from_millis(ms), path))
            }
            _ => None,
        }
    }

    /// Probe target, regardless of whether a per-circuit interval is set.
    pub fn health_check_target(&self) -> Option<&str> {
        self.health_check_path.as_deref().filter(|p| !p.is_empty())
    }

    /// Retry settings taking attempts and delay from `retry_count` /
    /// `retry_delay_ms`, everything else from `base`.
    pub fn retry_config(&self, base: &RetryConfig) -> RetryConfig {
        RetryConfig {
            max_retries: self.retry_count,
            base_delay_ms: self.retry_delay_ms,
            ..base.clone()
        }
    }
}

/// Partial update merged into an existing circuit's options.
///
/// `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitOptionsUpdate {
    pub failure_threshold: Option<u32>,
    pub reset_timeout_ms: Option<u64>,
    pub monitoring_period_ms: Option<u64>,
    pub timeout_ms: Option<u64>,
    pub retry_count: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub health_check_interval_ms: Option<u64>,
    pub health_check_path: Option<String>,
}

/// What an [`CircuitOptionsUpdate::apply`] call changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptionsChange {
    pub changed: bool,
    pub health_changed: bool,
}

fn merge<T: PartialEq + Clone>(target: &mut T, value: &Option<T>) -> bool {
    match value {
        Some(v) if target != v => {
            *target = v.clone();
            true
        }
        _ => false,
    }
}

impl CircuitOptionsUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge into `options` in place. Counters are not touched.
    pub fn apply(&self, options: &mut CircuitOptions) -> OptionsChange {
        let mut changed = false;
        changed |= merge(&mut options.failure_threshold, &self.failure_threshold);
        changed |= merge(&mut options.reset_timeout_ms, &self.reset_timeout_ms);
        changed |= merge(&mut options.monitoring_period_ms, &self.monitoring_period_ms);
        changed |= merge(&mut options.retry_count, &self.retry_count);
        changed |= merge(&mut options.retry_delay_ms, &self.retry_delay_ms);
        if self.timeout_ms.is_some() {
            changed |= merge(&mut options.timeout_ms, &Some(self.timeout_ms));
        }

        let mut health_changed = false;
        if self.health_check_interval_ms.is_some() {
            health_changed |= merge(
                &mut options.health_check_interval_ms,
                &Some(self.health_check_interval_ms),
            );
        }
        if self.health_check_path.is_some() {
            health_changed |= merge(
                &mut options.health_check_path,
                &Some(self.health_check_path.clone()),
            );
        }

        OptionsChange {
            changed: changed || health_changed,
            health_changed,
        }
    }
}

impl From<CircuitOptions> for CircuitOptionsUpdate {
    fn from(options: CircuitOptions) -> Self {
        Self {
            failure_threshold: Some(options.failure_threshold),
            reset_timeout_ms: Some(options.reset_timeout_ms),
            monitoring_period_ms: Some(options.monitoring_period_ms),
            timeout_ms: options.timeout_ms,
            retry_count: Some(options.retry_count),
            retry_delay_ms: Some(options.retry_delay_ms),
            health_check_interval_ms: options.health_check_interval_ms,
            health_check_path: options.health_check_path,
        }
    }
}

/// Retry policy used by the retry executor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,

    /// Delay before the first retry in milliseconds.
    pub base_delay_ms: u64,

    /// Double the delay after every attempt.
    pub exponential_backoff: bool,

    /// Upper bound for the un-jittered delay.
    pub max_delay_ms: u64,

    /// Add up to 10% random delay.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            exponential_backoff: true,
            max_delay_ms: 30_000,
            jitter: true,
        }
    }
}
