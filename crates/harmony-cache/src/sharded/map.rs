//! Fixed-width partitioned hash map
//!
//! Spreads lock contention over 256 independently locked partitions. Every operation
//! touching a single key locks exactly one partition; whole-map operations visit the
//! partitions one at a time and therefore observe a point-in-time view per partition only.

use super::PartitionKey;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Number of partitions in every [`ShardedMap`]
pub const PARTITIONS: usize = 256;

/// Concurrent map partitioned by [`PartitionKey::partition`]
pub struct ShardedMap<K, V> {
    partitions: Box<[RwLock<HashMap<K, V>>]>,
}

impl<K: PartitionKey, V> ShardedMap<K, V> {
    /// Create an empty map
    #[must_use]
    pub fn new() -> Self {
        let partitions = (0..PARTITIONS)
            .map(|_| RwLock::new(HashMap::new()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self { partitions }
    }

    /// Partition index a key is stored in
    #[inline]
    pub fn partition_of(key: &K) -> usize {
        usize::from(key.partition())
    }

    #[inline]
    fn partition(&self, key: &K) -> &RwLock<HashMap<K, V>> {
        &self.partitions[Self::partition_of(key)]
    }

    /// Clone the value for `key`
    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.partition(key).read().get(key).cloned()
    }

    /// Run `f` against the value for `key` under the partition's read lock
    pub fn with<R>(&self, key: &K, f: impl FnOnce(&V) -> R) -> Option<R> {
        self.partition(key).read().get(key).map(f)
    }

    /// Insert or overwrite, returning the previous value
    pub fn set(&self, key: K, value: V) -> Option<V> {
        self.partition(&key).write().insert(key, value)
    }

    /// Remove `key`, returning its value
    pub fn delete(&self, key: &K) -> Option<V> {
        self.partition(key).write().remove(key)
    }

    /// Whether `key` is present
    pub fn has(&self, key: &K) -> bool {
        self.partition(key).read().contains_key(key)
    }

    /// Return the existing value, or store `value` if absent.
    ///
    /// The flag is `true` when the value was already present.
    pub fn get_or_set(&self, key: K, value: V) -> (V, bool)
    where
        V: Clone,
    {
        let mut partition = self.partition(&key).write();
        if let Some(existing) = partition.get(&key) {
            return (existing.clone(), true);
        }
        partition.insert(key, value.clone());
        (value, false)
    }

    /// Return the existing value, or store the result of `make` if absent
    pub fn get_or_insert_with(&self, key: K, make: impl FnOnce() -> V) -> V
    where
        V: Clone,
    {
        self.partition(&key)
            .write()
            .entry(key)
            .or_insert_with(make)
            .clone()
    }

    /// Atomic read-modify-write of one key.
    ///
    /// `f` sees the current value (if any) and returns the replacement; returning
    /// `None` removes the key. No other writer can interleave on this partition
    /// between the read and the write. Returns the new value.
    pub fn update<F>(&self, key: K, f: F) -> Option<V>
    where
        V: Clone,
        F: FnOnce(Option<&V>) -> Option<V>,
    {
        let mut partition = self.partition(&key).write();
        match f(partition.get(&key)) {
            Some(next) => {
                partition.insert(key, next.clone());
                Some(next)
            }
            None => {
                partition.remove(&key);
                None
            }
        }
    }

    /// Mutate an existing value in place; returns `false` if the key is absent
    pub fn modify(&self, key: &K, f: impl FnOnce(&mut V)) -> bool {
        match self.partition(key).write().get_mut(key) {
            Some(value) => {
                f(value);
                true
            }
            None => false,
        }
    }

    /// Visit entries until `f` returns `false`.
    ///
    /// Each partition is read-locked only while it is being visited.
    pub fn range(&self, mut f: impl FnMut(&K, &V) -> bool) {
        for partition in self.partitions.iter() {
            let guard = partition.read();
            for (key, value) in guard.iter() {
                if !f(key, value) {
                    return;
                }
            }
        }
    }

    /// Keep only the entries for which `f` returns `true`
    pub fn retain(&self, mut f: impl FnMut(&K, &mut V) -> bool) {
        for partition in self.partitions.iter() {
            partition.write().retain(|k, v| f(k, v));
        }
    }

    /// Entry count; a snapshot, not consistent under concurrent mutation
    pub fn len(&self) -> usize {
        self.partitions.iter().map(|p| p.read().len()).sum()
    }

    /// Whether every partition is empty at the moment it is checked
    pub fn is_empty(&self) -> bool {
        self.partitions.iter().all(|p| p.read().is_empty())
    }

    /// Snapshot of all keys
    pub fn keys(&self) -> Vec<K>
    where
        K: Clone,
    {
        let mut keys = Vec::new();
        for partition in self.partitions.iter() {
            keys.extend(partition.read().keys().cloned());
        }
        keys
    }

    /// Snapshot of all values
    pub fn values(&self) -> Vec<V>
    where
        V: Clone,
    {
        let mut values = Vec::new();
        for partition in self.partitions.iter() {
            values.extend(partition.read().values().cloned());
        }
        values
    }

    /// Remove every entry
    pub fn clear(&self) {
        for partition in self.partitions.iter() {
            partition.write().clear();
        }
    }
}

impl<K: PartitionKey, V> Default for ShardedMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: PartitionKey, V> std::fmt::Debug for ShardedMap<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardedMap")
            .field("partitions", &PARTITIONS)
            .field("len", &self.len())
            .finish()
    }
}
