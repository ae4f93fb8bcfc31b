//! Backoff delay sequences.

use crate::BackoffStrategy;
use std::time::Duration;
use tokio_retry2::strategy::jitter;

/// Infinite iterator of backoff delays for one retry invocation.
///
/// Attempt numbering is 1-based: the first yielded delay follows the first
/// failed attempt. Delays are computed in `f64` seconds so runaway
/// exponential growth saturates at `max_delay` instead of overflowing.
#[derive(Debug, Clone)]
pub struct BackoffSchedule {
    strategy: BackoffStrategy,
    base: Duration,
    max: Duration,
    factor: f64,
    jitter: bool,
    attempt: u32,
}

impl BackoffSchedule {
    /// Create a schedule starting at attempt one.
    pub fn new(
        strategy: BackoffStrategy,
        base: Duration,
        max: Duration,
        factor: f64,
        jitter: bool,
    ) -> Self {
        Self {
            strategy,
            base,
            max,
            factor,
            jitter,
            attempt: 0,
        }
    }
}

impl Iterator for BackoffSchedule {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        self.attempt += 1;
        let base = self.base.as_secs_f64();
        let raw = match self.strategy {
            BackoffStrategy::Constant => base,
            BackoffStrategy::Linear => base * f64::from(self.attempt),
            BackoffStrategy::Exponential => base * self.factor.powi(self.attempt as i32 - 1),
        };
        let capped = if raw.is_finite() {
            raw.min(self.max.as_secs_f64())
        } else {
            self.max.as_secs_f64()
        };
        let delay = Duration::from_secs_f64(capped.max(0.0));
        Some(if self.jitter { jitter(delay) } else { delay })
    }
}
