//! Process-wide rate limit shared by every route

use harmony_core::MonotonicClock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic "resume after" timestamp that only ever moves forward
#[derive(Debug, Default)]
pub struct GlobalLimiter {
    resume_at: AtomicU64,
}

impl GlobalLimiter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the resume point to `max(current, until)`; returns the resulting value.
    ///
    /// Concurrent raises in any order settle on the largest proposal.
    pub fn raise(&self, until: u64) -> u64 {
        let previous = self.resume_at.fetch_max(until, Ordering::AcqRel);
        previous.max(until)
    }

    /// Current resume point on the [`MonotonicClock`] timeline
    pub fn resume_at(&self) -> u64 {
        self.resume_at.load(Ordering::Acquire)
    }

    /// When requests may resume, if that is later than `now`
    pub fn blocked_until(&self, now: u64) -> Option<u64> {
        let resume_at = self.resume_at();
        (resume_at > now).then_some(resume_at)
    }

    /// Shorthand for [`blocked_until`](Self::blocked_until) at the current instant
    pub fn blocked_now(&self) -> Option<u64> {
        self.blocked_until(MonotonicClock::now_millis())
    }
}
