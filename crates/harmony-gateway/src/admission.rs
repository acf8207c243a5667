//! Identify admission control
//!
//! The server allows `max_concurrency` handshakes at once, one per concurrency bucket
//! (`shard_id % max_concurrency`), and expects successive handshakes in one bucket to be
//! spaced out. Each bucket is a single lock holding the time of its last handshake, so a
//! shard can only handshake while it holds its bucket and only after the spacing elapsed.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Spacing the server enforces between handshakes in one bucket
pub const DEFAULT_SPACING: Duration = Duration::from_secs(5);

/// Admission errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    #[error("admission wait cancelled")]
    Cancelled,
}

/// Serializes shard handshakes against the session start limits
#[derive(Debug)]
pub struct AdmissionController {
    buckets: Box<[Arc<Mutex<Option<Instant>>>]>,
    spacing: Duration,
}

impl AdmissionController {
    /// `max_concurrency` of zero is treated as one
    #[must_use]
    pub fn new(max_concurrency: u32, spacing: Duration) -> Self {
        let buckets = (0..max_concurrency.max(1))
            .map(|_| Arc::new(Mutex::new(None)))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self { buckets, spacing }
    }

    pub fn max_concurrency(&self) -> usize {
        self.buckets.len()
    }

    pub fn spacing(&self) -> Duration {
        self.spacing
    }

    /// Concurrency bucket of a shard
    pub fn bucket_of(&self, shard_id: u32) -> usize {
        shard_id as usize % self.buckets.len()
    }

    /// Wait until `shard_id` may send a handshake.
    ///
    /// The returned permit keeps the bucket closed to other shards until dropped.
    pub async fn acquire(
        &self,
        shard_id: u32,
        cancel: &CancellationToken,
    ) -> Result<AdmissionPermit, AdmissionError> {
        let bucket = self.bucket_of(shard_id);
        let lock = Arc::clone(&self.buckets[bucket]);

        let mut guard = tokio::select! {
            () = cancel.cancelled() => return Err(AdmissionError::Cancelled),
            guard = lock.lock_owned() => guard,
        };

        if let Some(last) = *guard {
            let ready_at = last + self.spacing;
            if ready_at > Instant::now() {
                tracing::debug!(
                    shard_id,
                    bucket,
                    wait_ms = u64::try_from((ready_at - Instant::now()).as_millis()).unwrap_or(u64::MAX),
                    "Waiting for handshake spacing"
                );
                tokio::select! {
                    () = cancel.cancelled() => return Err(AdmissionError::Cancelled),
                    () = tokio::time::sleep_until(ready_at) => {}
                }
            }
        }

        *guard = Some(Instant::now());
        tracing::debug!(shard_id, bucket, "Handshake admitted");
        Ok(AdmissionPermit {
            shard_id,
            bucket,
            _guard: guard,
        })
    }
}

impl Default for AdmissionController {
    fn default() -> Self {
        Self::new(1, DEFAULT_SPACING)
    }
}

/// Exclusive right to handshake within one concurrency bucket
#[derive(Debug)]
pub struct AdmissionPermit {
    shard_id: u32,
    bucket: usize,
    _guard: OwnedMutexGuard<Option<Instant>>,
}

impl AdmissionPermit {
    pub fn shard_id(&self) -> u32 {
        self.shard_id
    }

    pub fn bucket(&self) -> usize {
        self.bucket
    }
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        tracing::trace!(shard_id = self.shard_id, bucket = self.bucket, "Admission slot released");
    }
}
