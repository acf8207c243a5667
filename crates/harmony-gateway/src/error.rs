//! Gateway error types

use crate::protocol::CloseCode;
use thiserror::Error;

/// Terminal outcome of a shard
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShardError {
    /// The server closed with a code that retrying cannot fix
    #[error("shard {shard_id} closed with fatal code {code}: {}", describe(*.code))]
    Fatal { shard_id: u32, code: u16 },

    /// The shard task ended abnormally
    #[error("shard {shard_id} task failed: {reason}")]
    Crashed { shard_id: u32, reason: String },
}

impl ShardError {
    pub fn shard_id(&self) -> u32 {
        match self {
            Self::Fatal { shard_id, .. } | Self::Crashed { shard_id, .. } => *shard_id,
        }
    }

    /// Close code of a fatal close
    pub fn close_code(&self) -> Option<CloseCode> {
        match self {
            Self::Fatal { code, .. } => CloseCode::from_u16(*code),
            Self::Crashed { .. } => None,
        }
    }
}

fn describe(code: u16) -> &'static str {
    CloseCode::from_u16(code).map_or("unknown close code", CloseCode::description)
}

/// Errors surfaced by the gateway API
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("unknown shard {0}")]
    UnknownShard(u32),

    #[error("shard {0} is no longer running")]
    ShardStopped(u32),

    #[error("invalid command: {0}")]
    InvalidCommand(String),

    #[error("invalid shard count {0}")]
    InvalidShardCount(u32),

    #[error("failed to encode command: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Shard(#[from] ShardError),
}

pub type GatewayResult<T> = Result<T, GatewayError>;
