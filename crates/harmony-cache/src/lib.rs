//! # harmony-cache
//!
//! In-memory caching of remote state.
//!
//! ## Features
//!
//! - **Sharded Map**: 256 independently locked partitions keyed by snowflake low byte
//! - **Cache Manager**: One map per entity kind plus guild-scoped secondary indexes
//! - **Cache Flags**: Select which entity kinds are populated
//!
//! ## Example
//!
//! ```ignore
//! use harmony_cache::{CacheFlags, CacheManager};
//!
//! let cache = CacheManager::new(CacheFlags::GUILDS | CacheFlags::MEMBERS);
//! cache.apply("GUILD_CREATE", &payload);
//!
//! for user_id in cache.guild_member_ids(guild_id) {
//!     let member = cache.member(guild_id, user_id);
//! }
//! ```

pub mod manager;
pub mod sharded;

// Re-export sharded map types
pub use sharded::{PartitionKey, ShardedMap, PARTITIONS};

// Re-export cache manager types
pub use manager::{CacheFlags, CacheManager, CacheStats, Entity, UnknownCacheKind};
