//! Single owned arena of connection timers.
//!
//! Every deadline the connection driver waits on lives here, keyed by what it
//! is for. Re-arming a kind replaces its deadline; `clear` drops them all in
//! one step, so teardown cannot miss a handle.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimerKind {
    /// Transport open plus Socket.IO handshake must finish before this fires.
    ConnectTimeout,
    /// Next reconnect attempt.
    Backoff,
    /// Post-connect delay before the join announcement.
    JoinSettle,
    /// Next heartbeat ping.
    HeartbeatInterval,
    /// Outstanding ping gives up waiting for its pong.
    HeartbeatTimeout,
    /// Local typing indicator goes idle.
    TypingIdle,
}

#[derive(Debug, Default)]
pub struct TimerSet {
    deadlines: BTreeMap<TimerKind, Instant>,
}

impl TimerSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `kind` to fire `after` from now, replacing any earlier deadline.
    pub fn arm(&mut self, kind: TimerKind, after: Duration) {
        self.deadlines.insert(kind, Instant::now() + after);
    }

    /// Returns true when the timer was armed.
    pub fn cancel(&mut self, kind: TimerKind) -> bool {
        self.deadlines.remove(&kind).is_some()
    }

    #[must_use]
    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.deadlines.contains_key(&kind)
    }

    #[must_use]
    pub fn deadline(&self, kind: TimerKind) -> Option<Instant> {
        self.deadlines.get(&kind).copied()
    }

    pub fn clear(&mut self) {
        self.deadlines.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }

    #[must_use]
    pub fn armed(&self) -> Vec<TimerKind> {
        self.deadlines.keys().copied().collect()
    }

    /// Earliest deadline. Ties go to the kind declared first.
    #[must_use]
    pub fn next_due(&self) -> Option<(TimerKind, Instant)> {
        self.deadlines
            .iter()
            .map(|(kind, at)| (*kind, *at))
            .min_by_key(|(kind, at)| (*at, *kind))
    }

    /// Wait for the earliest timer and disarm it.
    ///
    /// Pending forever while nothing is armed. Cancel-safe: dropping the
    /// future before it resolves leaves every timer armed.
    pub async fn fired(&mut self) -> TimerKind {
        let Some((kind, at)) = self.next_due() else {
            return std::future::pending().await;
        };
        tokio::time::sleep_until(at).await;
        self.deadlines.remove(&kind);
        kind
    }
}

#[cfg(test)]
#[path = "timers_test.rs"]
mod tests;
