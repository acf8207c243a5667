//! # harmony-client
//!
//! Client facade over the REST requester, gateway shards and entity cache.
//!
//! ## Features
//!
//! - **One Lifetime**: A single cancellation token stops REST waits, shards and admission
//! - **Gateway Discovery**: Shard count and concurrency taken from `GET /gateway/bot`
//! - **Cache First**: Dispatches reach the cache before the event handler
//! - **Idempotent Shutdown**: Sockets and HTTP connections close exactly once
//!
//! ## Example
//!
//! ```ignore
//! use harmony_client::Client;
//! use harmony_common::ClientConfig;
//!
//! let client = Client::builder(ClientConfig::from_env()?)
//!     .handler(MyHandler)
//!     .build()?;
//!
//! client.start().await?;
//! let guild = client.guild(guild_id).await?;
//! client.shutdown().await;
//! ```

mod builder;
mod client;
mod error;
mod fetch;

pub use builder::ClientBuilder;
pub use client::Client;
pub use error::{ClientError, ClientResult};

// Re-export the layers so applications need only this crate
pub use harmony_cache as cache;
pub use harmony_common as common;
pub use harmony_gateway as gateway;
pub use harmony_rest as rest;
pub use harmony_core::{Intents, Snowflake};
