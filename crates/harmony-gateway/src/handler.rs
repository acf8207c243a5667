//! Event sink
//!
//! Dispatch events reach the handler after the cache has applied them, in arrival order
//! per shard. Each shard delivers from its own task so a slow handler delays only that
//! shard's events, never its heartbeats.

use crate::shard::ShardState;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

/// One dispatch (op 0) frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchEvent {
    pub shard_id: u32,
    pub sequence: u64,
    /// Event name, e.g. `MESSAGE_CREATE`
    pub name: String,
    pub data: Value,
}

/// User callbacks for gateway activity
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn on_event(&self, shard_id: u32, event: &DispatchEvent);

    /// Called on every shard state transition
    async fn on_shard_state(&self, shard_id: u32, state: ShardState) {
        let _ = (shard_id, state);
    }
}

/// Handler that ignores everything; useful when only the cache matters
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHandler;

#[async_trait]
impl EventHandler for NoopHandler {
    async fn on_event(&self, _shard_id: u32, _event: &DispatchEvent) {}
}
