//! Per-route rate-limit buckets

use super::headers::RateLimitHeaders;
use super::route::Route;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};

/// Accounting state of one bucket; times are [`MonotonicClock`](harmony_core::MonotonicClock) millis
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketState {
    pub limit: Option<u32>,
    /// Requests left in the current window; `None` until the server has told us
    pub remaining: Option<u32>,
    pub reset_at: u64,
}

impl BucketState {
    /// When the bucket reopens, if it is exhausted as of `now`
    #[must_use]
    pub fn blocked_until(&self, now: u64) -> Option<u64> {
        (self.remaining == Some(0) && self.reset_at > now).then_some(self.reset_at)
    }

    /// Fold in the headers of a response received at `now`
    pub fn update(&mut self, headers: &RateLimitHeaders, now: u64) {
        if let Some(limit) = headers.limit {
            self.limit = Some(limit);
        }
        if let Some(remaining) = headers.remaining {
            self.remaining = Some(remaining);
        }
        if let Some(reset_after) = headers.reset_after {
            self.reset_at = now.saturating_add(millis(reset_after));
        }
    }

    /// Close the bucket until `until`
    pub fn exhaust(&mut self, until: u64) {
        self.remaining = Some(0);
        self.reset_at = self.reset_at.max(until);
    }
}

/// A bucket; its lock is held for the whole admission-check-request-update cycle
#[derive(Debug, Default)]
pub struct Bucket {
    state: Mutex<BucketState>,
}

impl Bucket {
    pub async fn lock(&self) -> MutexGuard<'_, BucketState> {
        self.state.lock().await
    }
}

/// Lazily created buckets, retained for the life of the requester
#[derive(Debug, Default)]
pub struct BucketRegistry {
    buckets: DashMap<String, Arc<Bucket>>,
    /// Route key to server-assigned bucket hash
    hashes: DashMap<String, String>,
}

impl BucketRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bucket for a route, preferring the server-assigned identity once known
    pub fn bucket(&self, route: &Route) -> Arc<Bucket> {
        let key = self
            .hashes
            .get(&route.key)
            .map_or_else(|| route.key.clone(), |hash| route.hashed_key(&hash));

        Arc::clone(self.buckets.entry(key).or_default().value())
    }

    /// Record the server's bucket hash for a route.
    ///
    /// The bucket that served the request becomes the hashed bucket when none exists yet,
    /// so its accounting carries over.
    pub fn learn(&self, route: &Route, hash: &str, served_by: &Arc<Bucket>) {
        if self.hashes.get(&route.key).is_some_and(|known| known.as_str() == hash) {
            return;
        }
        tracing::debug!(route = %route.key, bucket = hash, "Learned rate-limit bucket");

        self.hashes.insert(route.key.clone(), hash.to_string());
        self.buckets
            .entry(route.hashed_key(hash))
            .or_insert_with(|| Arc::clone(served_by));
    }

    /// Number of buckets created so far
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

#[allow(clippy::cast_possible_truncation)]
fn millis(duration: Duration) -> u64 {
    duration.as_millis().min(u128::from(u64::MAX)) as u64
}
