//! Bounded latency sample buffer.

use std::collections::VecDeque;

/// Number of response-time samples kept per circuit.
pub const SAMPLE_CAPACITY: usize = 100;

/// Fixed-capacity ring buffer of response times in milliseconds.
///
/// Once full, each push evicts the oldest sample.
#[derive(Debug, Clone)]
pub struct LatencySamples {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl LatencySamples {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, millis: f64) {
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(millis);
    }

    /// Arithmetic mean, or `None` when nothing has been recorded.
    pub fn mean(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.samples.iter().sum::<f64>() / self.samples.len() as f64)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

impl Default for LatencySamples {
    fn default() -> Self {
        Self::new(SAMPLE_CAPACITY)
    }
}
