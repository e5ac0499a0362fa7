//! Capped exponential backoff with jitter for polling lock services

use std::time::Duration;

use rand::Rng;

/// Base delay between polls (10ms)
pub const BACKOFF_BASE: Duration = Duration::from_millis(10);

/// Largest delay between polls (200ms)
pub const BACKOFF_MAX: Duration = Duration::from_millis(200);

/// Delay sequence for retrying a contended acquisition
///
/// Each step doubles the base (capped at `max`) and adds up to 50% random
/// jitter so contending pollers spread out.
#[derive(Debug, Clone)]
pub struct Backoff {
    current: Duration,
    max: Duration,
}

impl Backoff {
    /// Create a backoff starting at `base`, never exceeding `max`
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            current: base.min(max),
            max,
        }
    }

    /// Next delay, clamped to `remaining`
    pub fn next_delay(&mut self, remaining: Duration) -> Duration {
        let step = self.current.min(self.max);
        let jitter_cap = (step.as_micros() / 2) as u64;
        let jitter = if jitter_cap == 0 {
            Duration::ZERO
        } else {
            Duration::from_micros(rand::thread_rng().gen_range(0..=jitter_cap))
        };
        self.current = self.current.saturating_mul(2).min(self.max);
        (step + jitter).min(self.max).min(remaining)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(BACKOFF_BASE, BACKOFF_MAX)
    }
}
