//! Sharded concurrent map
//!
//! Backs every hot cache in the client with 256 independently locked partitions.

mod key;
mod map;

pub use key::PartitionKey;
pub use map::{ShardedMap, PARTITIONS};
