//! Partition assignment for sharded map keys

use harmony_core::Snowflake;
use std::hash::Hash;

/// A key that can be assigned to one of the map's 256 partitions.
///
/// The assignment must be a pure function of the key so a key maps to the same
/// partition for the lifetime of the map.
pub trait PartitionKey: Eq + Hash {
    /// Partition index in `0..=255`
    fn partition(&self) -> u8;
}

impl PartitionKey for Snowflake {
    /// Low byte of the id
    #[inline]
    fn partition(&self) -> u8 {
        (self.get() & 0xFF) as u8
    }
}

impl PartitionKey for (Snowflake, Snowflake) {
    /// XOR of the low bytes of both ids
    #[inline]
    fn partition(&self) -> u8 {
        self.0.partition() ^ self.1.partition()
    }
}

impl PartitionKey for u64 {
    #[inline]
    fn partition(&self) -> u8 {
        (self & 0xFF) as u8
    }
}

impl PartitionKey for String {
    #[inline]
    fn partition(&self) -> u8 {
        self.as_str().partition()
    }
}

impl PartitionKey for &str {
    /// FNV-1a over the bytes, folded to one byte
    #[inline]
    fn partition(&self) -> u8 {
        const OFFSET: u32 = 0x811c_9dc5;
        const PRIME: u32 = 0x0100_0193;

        let hash = self
            .bytes()
            .fold(OFFSET, |h, b| (h ^ u32::from(b)).wrapping_mul(PRIME));
        (hash ^ (hash >> 8) ^ (hash >> 16) ^ (hash >> 24)) as u8
    }
}
