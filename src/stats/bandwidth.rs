//! Bandwidth calculation from byte counts and elapsed time

use crate::defaults::RATE_FLOOR_SECONDS;

/// Converts transferred bytes into megabits per second
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandwidthCalculator {
    overhead: f64,
}

impl BandwidthCalculator {
    pub fn new(overhead: f64) -> Self {
        Self { overhead }
    }

    pub fn overhead(&self) -> f64 {
        self.overhead
    }

    /// `bytes * 8 * overhead / elapsed / 1e6`
    pub fn rate(bytes: u64, elapsed_seconds: f64, overhead: f64) -> f64 {
        bytes as f64 * 8.0 * overhead / elapsed_seconds / 1_000_000.0
    }

    /// Live rate, or `None` while inside the floor window
    pub fn rate_checked(&self, bytes: u64, elapsed_seconds: f64) -> Option<f64> {
        if elapsed_seconds <= RATE_FLOOR_SECONDS {
            return None;
        }
        Some(Self::rate(bytes, elapsed_seconds, self.overhead))
    }

    /// Authoritative rate at phase end; 0 when no time elapsed
    pub fn final_rate(&self, bytes: u64, elapsed_seconds: f64) -> f64 {
        if elapsed_seconds <= 0.0 {
            return 0.0;
        }
        Self::rate(bytes, elapsed_seconds, self.overhead)
    }
}

impl Default for BandwidthCalculator {
    fn default() -> Self {
        Self::new(crate::defaults::DEFAULT_OVERHEAD_FACTOR)
    }
}
