//! # harmony-gateway
//!
//! Gateway sessions over WebSocket.
//!
//! ## Features
//!
//! - **Shard State Machine**: Pure transition function for handshake, resume and reconnect
//! - **zlib-stream**: Pooled streaming inflaters for transport compression
//! - **Admission Control**: Handshakes spaced per concurrency bucket
//! - **Heartbeats**: Jittered timer with zombie detection after two missed acks
//! - **Commands**: Presence, voice state and member requests under a per-shard quota
//!
//! ## Example
//!
//! ```ignore
//! use harmony_gateway::{ShardContext, ShardManager};
//!
//! let manager = ShardManager::start(&gateway.url, 0..gateway.shards, gateway.shards, &ctx, &cancel)?;
//! for status in manager.status() {
//!     println!("shard {} is {}", status.id, status.state);
//! }
//! manager.shutdown().await;
//! ```

pub mod admission;
pub mod compression;
pub mod error;
pub mod handler;
pub mod manager;
pub mod protocol;
pub mod shard;

pub use admission::{AdmissionController, AdmissionError, AdmissionPermit, DEFAULT_SPACING};
pub use compression::{DecompressError, DecompressorPool, Inflater, PooledInflater};
pub use error::{GatewayError, GatewayResult, ShardError};
pub use handler::{DispatchEvent, EventHandler, NoopHandler};
pub use manager::{shard_for_guild, ShardManager};
pub use protocol::{CloseCode, CloseDisposition, GatewayMessage, OpCode};
pub use shard::{
    ReconnectPolicy, ShardConfig, ShardContext, ShardHandle, ShardMachine, ShardRunner,
    ShardState, ShardStatus,
};
