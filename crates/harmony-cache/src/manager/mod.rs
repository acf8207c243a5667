//! Entity cache built on sharded maps

mod cache;
mod flags;
mod payloads;

pub use cache::{CacheManager, CacheStats, Entity};
pub use flags::{CacheFlags, UnknownCacheKind};
