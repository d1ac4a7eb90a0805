//! Retransmission timer and idle-threshold bookkeeping.
//!
//! Neither type owns a task.  The endpoint loop asks them for the nearest
//! deadline, blocks on the channel until then, and checks them again when the
//! timed receive reports `TimedOut`.  Window mutation and timer expiry are
//! therefore handled on the same task and never race.
//!
//! - [`RetransmitTimer`] — the single Go-Back-N timer covering the oldest
//!   unacknowledged packet.
//! - [`IdleClock`] — time since the last verified inbound packet, compared
//!   against the two-tier termination thresholds in [`TimerConfig`].
//!
//! Instants come from `tokio::time` so tests can run the thresholds in
//! paused (virtual) time.

use std::time::Duration;

use tokio::time::Instant;

/// Timeout thresholds for both endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerConfig {
    /// Sender: silence after which the whole window is retransmitted.
    pub retransmit_after: Duration,
    /// Sender: silence after which the peer is declared unresponsive.
    pub sender_abort_after: Duration,
    /// Receiver: silence after which it sends a close notice and stops.
    pub receiver_close_after: Duration,
    /// Receiver: silence after which it stops without notifying anyone.
    pub receiver_abandon_after: Duration,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            retransmit_after: Duration::from_secs(5),
            sender_abort_after: Duration::from_secs(20),
            receiver_close_after: Duration::from_secs(10),
            receiver_abandon_after: Duration::from_secs(50),
        }
    }
}

/// The sender's single retransmission timer.
#[derive(Debug, Clone)]
pub struct RetransmitTimer {
    timeout: Duration,
    deadline: Option<Instant>,
}

impl RetransmitTimer {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            deadline: None,
        }
    }

    /// Arm the timer if it is not already running.
    pub fn start(&mut self, now: Instant) {
        if self.deadline.is_none() {
            self.deadline = Some(now + self.timeout);
        }
    }

    /// Arm the timer from `now`, discarding any earlier deadline.
    pub fn restart(&mut self, now: Instant) {
        self.deadline = Some(now + self.timeout);
    }

    pub fn stop(&mut self) {
        self.deadline = None;
    }

    pub fn is_running(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// `true` once a running timer's deadline has passed.
    pub fn expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|d| now >= d)
    }
}

/// Tracks when an endpoint last heard a verified packet from its peer.
#[derive(Debug, Clone, Copy)]
pub struct IdleClock {
    last_heard: Instant,
}

impl IdleClock {
    pub fn new(now: Instant) -> Self {
        Self { last_heard: now }
    }

    /// Record a verified inbound packet.
    pub fn touch(&mut self, now: Instant) {
        self.last_heard = now;
    }

    pub fn last_heard(&self) -> Instant {
        self.last_heard
    }

    /// Instant at which a silence of `threshold` will have elapsed.
    pub fn deadline(&self, threshold: Duration) -> Instant {
        self.last_heard + threshold
    }

    /// `true` when at least `threshold` has passed without inbound traffic.
    pub fn exceeded(&self, threshold: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.last_heard) >= threshold
    }
}

/// Time left until `deadline`, zero if it already passed.
pub fn until(deadline: Instant, now: Instant) -> Duration {
    deadline.saturating_duration_since(now)
}
