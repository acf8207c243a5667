//! Client error types

use harmony_cache::UnknownCacheKind;
use harmony_common::ConfigError;
use harmony_gateway::{GatewayError, ShardError};
use harmony_rest::RestError;
use thiserror::Error;

/// Errors surfaced by [`crate::Client`]
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    CacheKind(#[from] UnknownCacheKind),

    #[error(transparent)]
    Rest(#[from] RestError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Shard(#[from] ShardError),

    #[error("client already started")]
    AlreadyStarted,

    #[error("client not started")]
    NotStarted,

    #[error("client shut down")]
    ShutDown,
}

pub type ClientResult<T> = Result<T, ClientError>;
