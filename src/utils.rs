//! Utility functions and helpers
//!
//! Common utilities used throughout the mining client.

use std::time::Duration;

/// Format hash rate as a human-readable string
pub fn format_hash_rate(hashes_per_sec: f64) -> String {
    const UNITS: &[&str] = &["H/s", "KH/s", "MH/s", "GH/s", "TH/s", "PH/s"];
    let mut rate = hashes_per_sec;
    let mut unit_index = 0;

    while rate >= 1000.0 && unit_index < UNITS.len() - 1 {
        rate /= 1000.0;
        unit_index += 1;
    }

    format!("{:.2} {}", rate, UNITS[unit_index])
}

/// Compute hashes per second over a time period
pub fn compute_hash_rate(hashes: u64, elapsed: Duration) -> f64 {
    if elapsed.as_secs_f64() > 0.0 {
        hashes as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    }
}

/// Exponential backoff calculator
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    current_attempt: u32,
}

impl ExponentialBackoff {
    /// Create a new exponential backoff calculator
    pub fn new(initial_delay: Duration, max_delay: Duration, multiplier: f64) -> Self {
        Self {
            initial_delay,
            max_delay,
            multiplier,
            current_attempt: 0,
        }
    }

    /// Get the next delay
    pub fn next_delay(&mut self) -> Duration {
        let delay = if self.current_attempt == 0 {
            self.initial_delay
        } else {
            let exponential = self.initial_delay.as_millis() as f64
                * self.multiplier.powi(self.current_attempt as i32);
            Duration::from_millis(exponential as u64).min(self.max_delay)
        };

        self.current_attempt += 1;
        delay
    }

    /// Next delay with up to 10% random jitter added
    pub fn next_delay_with_jitter(&mut self) -> Duration {
        let delay = self.next_delay();
        let jitter = delay.as_millis() as f64 * 0.1 * rand::random::<f64>();
        delay + Duration::from_millis(jitter as u64)
    }

    /// Get current attempt number
    pub fn attempt(&self) -> u32 {
        self.current_attempt
    }
}
