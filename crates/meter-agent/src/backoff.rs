//! Exponential reconnect backoff with jitter.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use meter_config::ReconnectConfig;

/// Delay generator for consecutive poll failures.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: ReconnectConfig,
    delay_ms: u64,
}

impl Backoff {
    pub fn new(config: ReconnectConfig) -> Self {
        let delay_ms = config.initial_delay_ms;
        Self { config, delay_ms }
    }

    /// Delay to wait now, then grow the base delay for the next failure.
    pub fn next_delay(&mut self) -> Duration {
        // delay * (1 ± jitter)
        let jitter_factor = 1.0 + self.config.jitter * (2.0 * rand_f64() - 1.0);
        #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let actual_delay = (self.delay_ms as f64 * jitter_factor) as u64;

        #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let next = (self.delay_ms as f64 * self.config.multiplier) as u64;
        self.delay_ms = next.min(self.config.max_delay_ms);

        Duration::from_millis(actual_delay)
    }

    /// Back to the initial delay after a successful poll.
    pub fn reset(&mut self) {
        self.delay_ms = self.config.initial_delay_ms;
    }

    /// Base delay of the next failure, before jitter.
    pub fn current_ms(&self) -> u64 {
        self.delay_ms
    }
}

/// Simple pseudo-random f64 in [0, 1) for jitter.
/// Uses system time nanoseconds; good enough for backoff jitter.
fn rand_f64() -> f64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    f64::from(nanos) / f64::from(u32::MAX)
}
