//! Per-shard connection settings

use super::machine::ReconnectPolicy;
use crate::protocol::PresenceUpdatePayload;
use harmony_common::ClientConfig;
use harmony_core::Intents;
use std::time::Duration;

/// Gateway API version requested on connect
pub const GATEWAY_VERSION: u8 = 10;

/// Settings shared by every shard of a client
#[derive(Debug, Clone)]
pub struct ShardConfig {
    pub token: String,
    pub intents: Intents,
    pub large_threshold: u32,
    /// Request zlib-stream transport compression
    pub compress: bool,
    /// Presence sent with Identify
    pub presence: Option<PresenceUpdatePayload>,
    pub reconnect: ReconnectPolicy,
    /// Upper bound on opening the WebSocket
    pub connect_timeout: Duration,
    /// Outbound commands allowed per minute, leaving headroom for heartbeats
    pub commands_per_minute: u32,
}

impl ShardConfig {
    #[must_use]
    pub fn new(token: impl Into<String>, intents: Intents) -> Self {
        Self {
            token: token.into(),
            intents,
            ..Self::default()
        }
    }

    /// Connection URL for a gateway host
    #[must_use]
    pub fn connect_url(&self, base: &str) -> String {
        let base = base.trim_end_matches('/');
        let mut url = format!("{base}/?v={GATEWAY_VERSION}&encoding=json");
        if self.compress {
            url.push_str("&compress=zlib-stream");
        }
        url
    }
}

impl Default for ShardConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            intents: Intents::default(),
            large_threshold: 250,
            compress: true,
            presence: None,
            reconnect: ReconnectPolicy::default(),
            connect_timeout: Duration::from_secs(30),
            commands_per_minute: 110,
        }
    }
}

impl From<&ClientConfig> for ShardConfig {
    fn from(config: &ClientConfig) -> Self {
        Self {
            token: config.token.clone(),
            intents: config.intents,
            large_threshold: config.gateway.large_threshold,
            compress: config.gateway.compress,
            ..Self::default()
        }
    }
}
