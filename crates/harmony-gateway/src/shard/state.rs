//! Shard state and status snapshots

use serde::Serialize;
use std::time::Duration;

/// Connection state of one shard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ShardState {
    /// Not started
    #[default]
    Disconnected,
    /// Opening the socket
    Connecting,
    /// Socket open, waiting for Hello
    AwaitingHello,
    /// Waiting for READY after a fresh handshake
    Identifying,
    /// Waiting for RESUMED
    Resuming,
    /// Session established
    Connected,
    /// Socket gone, waiting out the backoff
    Reconnecting,
    /// Terminal
    Closed,
}

impl ShardState {
    /// Whether a socket is (or is about to be) open in this state
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(
            self,
            Self::Connecting
                | Self::AwaitingHello
                | Self::Identifying
                | Self::Resuming
                | Self::Connected
        )
    }

    /// Whether the server has acknowledged a session handshake
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    #[must_use]
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::AwaitingHello => "awaiting_hello",
            Self::Identifying => "identifying",
            Self::Resuming => "resuming",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Closed => "closed",
        }
    }
}

impl std::fmt::Display for ShardState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Point-in-time view of one shard
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShardStatus {
    pub id: u32,
    pub total: u32,
    pub state: ShardState,
    /// Round trip of the last acknowledged heartbeat
    pub latency: Option<Duration>,
    /// Last dispatch sequence seen in the current session
    pub sequence: Option<u64>,
    pub session_id: Option<String>,
}

impl ShardStatus {
    #[must_use]
    pub fn new(id: u32, total: u32) -> Self {
        Self {
            id,
            total,
            state: ShardState::Disconnected,
            latency: None,
            sequence: None,
            session_id: None,
        }
    }
}
