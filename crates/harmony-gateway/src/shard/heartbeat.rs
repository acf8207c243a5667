//! Heartbeat bookkeeping
//!
//! Times are monotonic milliseconds from [`harmony_core::MonotonicClock`], passed in by the
//! caller so the monitor itself stays deterministic.

use std::time::Duration;

/// Unacknowledged heartbeats tolerated before the connection is declared dead
pub const MAX_MISSED_ACKS: u32 = 2;

/// Outcome of a heartbeat timer tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Beat {
    /// Send a heartbeat
    Send,
    /// The server stopped acknowledging; drop the connection
    Zombie,
}

/// Tracks sent heartbeats against their acknowledgements
#[derive(Debug, Clone, Default)]
pub struct HeartbeatMonitor {
    awaiting_ack: bool,
    missed: u32,
    last_sent: Option<u64>,
    latency: Option<Duration>,
}

impl HeartbeatMonitor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A timer tick at `now`.
    ///
    /// A tick that finds the previous heartbeat unacknowledged counts as a miss; reaching
    /// [`MAX_MISSED_ACKS`] consecutive misses yields [`Beat::Zombie`].
    pub fn tick(&mut self, now: u64) -> Beat {
        if self.awaiting_ack {
            self.missed += 1;
            if self.missed >= MAX_MISSED_ACKS {
                return Beat::Zombie;
            }
        }
        self.sent(now);
        Beat::Send
    }

    /// A heartbeat sent outside the timer (server request)
    pub fn sent(&mut self, now: u64) {
        self.awaiting_ack = true;
        self.last_sent = Some(now);
    }

    pub fn ack(&mut self, now: u64) {
        if let Some(sent) = self.last_sent {
            self.latency = Some(Duration::from_millis(now.saturating_sub(sent)));
        }
        self.awaiting_ack = false;
        self.missed = 0;
    }

    /// Forget the connection's heartbeat history, keeping the last latency
    pub fn reset(&mut self) {
        self.awaiting_ack = false;
        self.missed = 0;
        self.last_sent = None;
    }

    pub fn missed(&self) -> u32 {
        self.missed
    }

    pub fn latency(&self) -> Option<Duration> {
        self.latency
    }
}
