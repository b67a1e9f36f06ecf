//! Reconnect delay schedule.

use std::time::Duration;

use rand::Rng;

/// Exponential backoff with multiplicative jitter and a hard cap.
///
/// `delay(n) = min(initial * multiplier^n * (1 + jitter * r), max_delay)` for
/// `r` in `[0, 1)`. When `multiplier >= 1 + jitter` consecutive delays never
/// shrink, whatever `r` is drawn.
#[derive(Clone, Debug, PartialEq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    pub jitter: f64,
    /// Failed attempts allowed before the manager gives up.
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            jitter: 0.5,
            max_attempts: 10,
        }
    }
}

impl BackoffPolicy {
    /// Delay before retry number `attempt` given a jitter roll in `[0, 1)`.
    #[must_use]
    pub fn delay(&self, attempt: u32, roll: f64) -> Duration {
        let cap = self.max_delay.as_secs_f64();
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let base = self.initial.as_secs_f64() * self.multiplier.powi(exponent);
        let jittered = base * (1.0 + self.jitter * roll.clamp(0.0, 1.0));
        if !jittered.is_finite() || jittered >= cap {
            return self.max_delay;
        }
        Duration::from_secs_f64(jittered.max(0.0))
    }

    /// Delay before retry number `attempt` with a fresh random roll.
    #[must_use]
    pub fn next_delay(&self, attempt: u32) -> Duration {
        self.delay(attempt, rand::rng().random::<f64>())
    }

    #[must_use]
    pub fn exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }
}

#[cfg(test)]
#[path = "backoff_test.rs"]
mod tests;
