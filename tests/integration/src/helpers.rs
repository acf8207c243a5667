//! Test helpers
//!
//! Provides polling, event recording and ready-made configuration for the fakes.

use anyhow::Result;
use async_trait::async_trait;
use harmony_cache::CacheManager;
use harmony_common::ClientConfig;
use harmony_core::Snowflake;
use harmony_gateway::{DispatchEvent, EventHandler, ShardState};
use parking_lot::Mutex;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Default upper bound for a condition to become true
pub const WAIT: Duration = Duration::from_secs(5);

/// Serve `app` on an ephemeral local port
pub async fn serve(app: axum::Router) -> Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    Ok(addr)
}

/// Poll `condition` every 10ms until it holds or `WAIT` elapses
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> Result<()> {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !condition() {
        if tokio::time::Instant::now() >= deadline {
            anyhow::bail!("condition not met within {WAIT:?}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    Ok(())
}

/// Await `future`, failing the test after `WAIT`
pub async fn within<T>(future: impl Future<Output = T>) -> Result<T> {
    Ok(tokio::time::timeout(WAIT, future).await?)
}

/// Client configuration pointed at the fakes, with fast retries
pub fn test_config(api_base_url: &str) -> ClientConfig {
    let mut config = ClientConfig::new("test-token");
    config.rest.api_base_url = api_base_url.to_string();
    config.rest.max_retries = 2;
    config.rest.retry_backoff_ms = 20;
    config.rest.ratelimit_margin_ms = 0;
    config.gateway.identify_spacing_ms = 10;
    config
}

/// What a [`RecordingHandler`] saw
#[derive(Debug, Clone, PartialEq)]
pub enum Seen {
    Event {
        name: String,
        sequence: u64,
        /// Whether the guild named by the payload was cached when the handler ran
        cached: bool,
    },
    State(ShardState),
}

/// Handler that records every callback in order
#[derive(Debug, Clone, Default)]
pub struct RecordingHandler {
    seen: Arc<Mutex<Vec<Seen>>>,
    cache: Arc<Mutex<Option<Arc<CacheManager>>>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check the cache for the event's guild on every delivery
    pub fn watch_cache(&self, cache: Arc<CacheManager>) {
        *self.cache.lock() = Some(cache);
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().clone()
    }

    pub fn events(&self) -> Vec<String> {
        self.seen
            .lock()
            .iter()
            .filter_map(|seen| match seen {
                Seen::Event { name, .. } => Some(name.clone()),
                Seen::State(_) => None,
            })
            .collect()
    }

    pub fn states(&self) -> Vec<ShardState> {
        self.seen
            .lock()
            .iter()
            .filter_map(|seen| match seen {
                Seen::State(state) => Some(*state),
                Seen::Event { .. } => None,
            })
            .collect()
    }
}

#[async_trait]
impl EventHandler for RecordingHandler {
    async fn on_event(&self, _shard_id: u32, event: &DispatchEvent) {
        let guild_id = event
            .data
            .get("guild_id")
            .or_else(|| event.data.get("id"))
            .and_then(|id| id.as_str())
            .and_then(|id| id.parse::<Snowflake>().ok());
        let cached = match (self.cache.lock().as_ref(), guild_id) {
            (Some(cache), Some(guild_id)) => cache.guild(guild_id).is_some(),
            _ => false,
        };

        self.seen.lock().push(Seen::Event {
            name: event.name.clone(),
            sequence: event.sequence,
            cached,
        });
    }

    async fn on_shard_state(&self, _shard_id: u32, state: ShardState) {
        self.seen.lock().push(Seen::State(state));
    }
}
