//! Application-level ping/pong bookkeeping.
//!
//! The driver owns the timers; this type only remembers which ping is in
//! flight and how many in a row went unanswered.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeartbeatConfig {
    pub interval: Duration,
    /// How long a ping waits for its pong.
    pub timeout: Duration,
    /// Consecutive unanswered pings that force a reconnect.
    pub max_misses: u32,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(25),
            timeout: Duration::from_secs(10),
            max_misses: 3,
        }
    }
}

#[derive(Debug, Default)]
pub struct Heartbeat {
    in_flight: Option<(i64, Instant)>,
    misses: u32,
}

impl Heartbeat {
    /// Record a ping carrying `timestamp`, superseding any unanswered one.
    pub fn begin(&mut self, timestamp: i64) {
        self.in_flight = Some((timestamp, Instant::now()));
    }

    /// Match a pong against the ping in flight. Returns the measured latency.
    pub fn on_pong(&mut self, timestamp: i64) -> Option<Duration> {
        match self.in_flight {
            Some((sent, at)) if sent == timestamp => {
                self.in_flight = None;
                self.misses = 0;
                Some(at.elapsed())
            }
            _ => None,
        }
    }

    /// The ping in flight went unanswered. Returns consecutive misses so far.
    pub fn on_timeout(&mut self) -> u32 {
        self.in_flight = None;
        self.misses = self.misses.saturating_add(1);
        self.misses
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// A ping is out and has neither been answered nor timed out.
    #[must_use]
    pub fn awaiting_pong(&self) -> bool {
        self.in_flight.is_some()
    }
}

#[cfg(test)]
#[path = "heartbeat_test.rs"]
mod tests;
