//! Gateway discovery endpoints

use crate::error::RestResult;
use crate::request::Request;
use crate::requester::Requester;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Response of `GET /gateway`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayInfo {
    pub url: String,
}

/// Response of `GET /gateway/bot`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayBot {
    pub url: String,
    /// Recommended shard count
    pub shards: u32,
    pub session_start_limit: SessionStartLimit,
}

/// Handshake budget of the token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStartLimit {
    pub total: u32,
    pub remaining: u32,
    /// Milliseconds until `remaining` resets
    pub reset_after: u64,
    /// Handshakes allowed in parallel, one per concurrency bucket
    pub max_concurrency: u32,
}

impl SessionStartLimit {
    /// How long to hold off before starting `shards` new sessions, if at all
    #[must_use]
    pub fn wait_for(&self, shards: u32) -> Option<Duration> {
        (self.remaining < shards).then(|| Duration::from_millis(self.reset_after))
    }
}

impl Requester {
    /// `GET /gateway`; needs no authorization
    pub async fn gateway(&self) -> RestResult<GatewayInfo> {
        self.request(Request::get("/gateway").without_auth()).await
    }

    /// `GET /gateway/bot`
    pub async fn gateway_bot(&self) -> RestResult<GatewayBot> {
        self.request(Request::get("/gateway/bot")).await
    }
}
