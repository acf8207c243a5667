//! Process-wide monotonic clock
//!
//! All deadlines in the client (rate-limit resets, the global limiter, heartbeat latency)
//! are expressed as milliseconds since a single process origin. The origin is an
//! [`Instant`] captured on first use, so readings never go backward even if the wall
//! clock is adjusted. A wall-clock offset is sampled at the same moment so monotonic
//! readings can be mapped onto Unix time when comparing against snowflake timestamps.

use std::sync::OnceLock;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

struct Origin {
    instant: Instant,
    unix_millis: u64,
}

static ORIGIN: OnceLock<Origin> = OnceLock::new();

fn origin() -> &'static Origin {
    ORIGIN.get_or_init(|| Origin {
        instant: Instant::now(),
        unix_millis: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0),
    })
}

/// Monotonic time source shared by every component of the process
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl MonotonicClock {
    /// Milliseconds elapsed since the process origin
    #[inline]
    pub fn now_millis() -> u64 {
        origin().instant.elapsed().as_millis() as u64
    }

    /// The [`Instant`] corresponding to a reading of [`MonotonicClock::now_millis`]
    #[inline]
    pub fn instant_at(millis: u64) -> Instant {
        origin().instant + Duration::from_millis(millis)
    }

    /// Convert an [`Instant`] to a monotonic reading, saturating at the origin
    #[inline]
    pub fn millis_at(instant: Instant) -> u64 {
        instant
            .saturating_duration_since(origin().instant)
            .as_millis() as u64
    }

    /// Current Unix time in milliseconds, derived from the monotonic reading
    ///
    /// Drifts from the system clock only by whatever adjustment the system clock
    /// received after the origin was captured.
    #[inline]
    pub fn unix_millis() -> u64 {
        let origin = origin();
        origin.unix_millis + origin.instant.elapsed().as_millis() as u64
    }

    /// Time remaining until a monotonic reading, or zero if it has passed
    #[inline]
    pub fn until(millis: u64) -> Duration {
        Duration::from_millis(millis.saturating_sub(Self::now_millis()))
    }
}
