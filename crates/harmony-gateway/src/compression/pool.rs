//! Pool of reusable inflaters
//!
//! Shards check a context out per connection and hand it back when the connection ends.
//! Returned contexts are reset before anyone else can see them, so no compressed state or
//! buffered bytes cross from one session to the next.

use super::inflater::Inflater;
use parking_lot::Mutex;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Idle contexts kept by default
pub const DEFAULT_MAX_IDLE: usize = 16;

/// Shared pool of [`Inflater`]s
#[derive(Debug)]
pub struct DecompressorPool {
    idle: Mutex<Vec<Inflater>>,
    max_idle: usize,
}

impl DecompressorPool {
    #[must_use]
    pub fn new(max_idle: usize) -> Arc<Self> {
        Arc::new(Self {
            idle: Mutex::new(Vec::with_capacity(max_idle)),
            max_idle,
        })
    }

    /// Take a clean context, allocating one if the pool is empty
    #[must_use]
    pub fn checkout(self: &Arc<Self>) -> PooledInflater {
        let inflater = self.idle.lock().pop().unwrap_or_default();
        PooledInflater {
            inflater,
            pool: Arc::clone(self),
        }
    }

    /// Contexts currently waiting for reuse
    pub fn idle(&self) -> usize {
        self.idle.lock().len()
    }

    fn give_back(&self, mut inflater: Inflater) {
        inflater.reset();
        let mut idle = self.idle.lock();
        if idle.len() < self.max_idle {
            idle.push(inflater);
        }
    }
}

impl Default for DecompressorPool {
    fn default() -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            max_idle: DEFAULT_MAX_IDLE,
        }
    }
}

/// A checked-out inflater, returned to its pool on drop
#[derive(Debug)]
pub struct PooledInflater {
    inflater: Inflater,
    pool: Arc<DecompressorPool>,
}

impl Deref for PooledInflater {
    type Target = Inflater;

    fn deref(&self) -> &Inflater {
        &self.inflater
    }
}

impl DerefMut for PooledInflater {
    fn deref_mut(&mut self) -> &mut Inflater {
        &mut self.inflater
    }
}

impl Drop for PooledInflater {
    fn drop(&mut self) {
        self.pool.give_back(std::mem::take(&mut self.inflater));
    }
}
