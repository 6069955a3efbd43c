//! Retry delay computation.

use std::time::Duration;

use rand::Rng;

use legisync_core::config::WorkerConfig;

/// Maximum relative jitter applied to each delay.
pub const JITTER: f64 = 0.25;

/// Exponential backoff: `base × 2^retries`, scaled by a random factor in
/// `[1 - JITTER, 1 + JITTER]`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
}

impl Backoff {
    /// Backoff with an explicit base and cap.
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Backoff from worker configuration.
    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(config.backoff_base(), config.max_backoff())
    }

    /// Delay before the retry following `retries` failed retries.
    pub fn delay(&self, retries: u32) -> Duration {
        let factor = rand::thread_rng().gen_range((1.0 - JITTER)..=(1.0 + JITTER));
        self.delay_with_factor(retries, factor)
    }

    /// Delay for an explicit jitter factor.
    pub fn delay_with_factor(&self, retries: u32, factor: f64) -> Duration {
        let exp = 2f64.powi(retries.min(32) as i32);
        let secs = self.base.as_secs_f64() * exp * factor;
        if !secs.is_finite() || secs >= self.max.as_secs_f64() {
            return self.max;
        }
        Duration::from_secs_f64(secs.max(0.0))
    }

    /// Inclusive bounds any `delay(retries)` falls within.
    pub fn bounds(&self, retries: u32) -> (Duration, Duration) {
        (
            self.delay_with_factor(retries, 1.0 - JITTER),
            self.delay_with_factor(retries, 1.0 + JITTER),
        )
    }
}
