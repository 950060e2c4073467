//! Exponential backoff with jitter.

use rand::Rng;
use std::time::Duration;

use crate::resilience::options::RetryConfig;

/// Un-jittered delay after the failed attempt `attempt` (0-based).
pub fn base_delay(attempt: u32, config: &RetryConfig) -> u64 {
    if !config.exponential_backoff {
        return config.base_delay_ms;
    }
    let exponential_base = 2u64.saturating_pow(attempt);
    config
        .base_delay_ms
        .saturating_mul(exponential_base)
        .min(config.max_delay_ms)
}

/// Delay to wait before the attempt following `attempt`.
pub fn retry_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let delay_ms = base_delay(attempt, config);

    // Apply jitter (0 to 10% of the delay)
    let jitter_range = delay_ms / 10;
    let jitter = if config.jitter && jitter_range > 0 {
        rand::thread_rng().gen_range(0..=jitter_range)
    } else {
        0
    };

    Duration::from_millis(delay_ms + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base: u64, max: u64, exponential: bool, jitter: bool) -> RetryConfig {
        RetryConfig {
            max_retries: 5,
            base_delay_ms: base,
            exponential_backoff: exponential,
            max_delay_ms: max,
            jitter,
        }
    }

    #[test]
    fn test_exponential_schedule_is_capped() {
        let cfg = config(1_000, 30_000, true, false);
        let delays: Vec<u64> = (0..6).map(|a| base_delay(a, &cfg)).collect();
        assert_eq!(delays, vec![1_000, 2_000, 4_000, 8_000, 16_000, 30_000]);
        assert_eq!(base_delay(40, &cfg), 30_000);
    }

    #[test]
    fn test_fixed_delay_without_exponential() {
        let cfg = config(10, 1_000, false, false);
        assert_eq!(retry_delay(0, &cfg), Duration::from_millis(10));
        assert_eq!(retry_delay(3, &cfg), Duration::from_millis(10));
    }

    #[test]
    fn test_jitter_stays_within_ten_percent() {
        let cfg = config(100, 1_000, true, true);
        for _ in 0..200 {
            let delay = retry_delay(2, &cfg).as_millis() as u64;
            assert!((400..=440).contains(&delay), "delay {delay} out of range");
        }
    }
}
