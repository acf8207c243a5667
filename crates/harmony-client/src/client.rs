//! Client facade
//!
//! One [`Client`] owns the requester, the cache and the shards. A single cancellation token
//! drives all of them: cancelling it (or calling [`Client::shutdown`]) stops rate-limit
//! waits, retry loops, reconnect backoffs and admission waits alike.

use crate::builder::ClientBuilder;
use crate::error::{ClientError, ClientResult};
use harmony_cache::CacheManager;
use harmony_common::ClientConfig;
use harmony_core::Snowflake;
use harmony_gateway::{
    shard_for_guild, AdmissionController, DecompressorPool, EventHandler, ShardConfig,
    ShardContext, ShardHandle, ShardManager, ShardStatus,
};
use harmony_rest::Requester;
use parking_lot::RwLock;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Everything a client is assembled from
pub(crate) struct ClientParts {
    pub(crate) config: ClientConfig,
    pub(crate) requester: Arc<Requester>,
    pub(crate) cache: Arc<CacheManager>,
    pub(crate) handler: Arc<dyn EventHandler>,
    pub(crate) pool: Arc<DecompressorPool>,
    pub(crate) shard_config: Arc<ShardConfig>,
    pub(crate) shard_range: Option<Range<u32>>,
    pub(crate) cancel: CancellationToken,
}

/// Chat platform client
pub struct Client {
    config: ClientConfig,
    requester: Arc<Requester>,
    cache: Arc<CacheManager>,
    handler: Arc<dyn EventHandler>,
    pool: Arc<DecompressorPool>,
    shard_config: Arc<ShardConfig>,
    shard_range: Option<Range<u32>>,
    shards: RwLock<Option<Arc<ShardManager>>>,
    started: AtomicBool,
    shut_down: AtomicBool,
    cancel: CancellationToken,
}

impl Client {
    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    pub(crate) fn from_parts(parts: ClientParts) -> Self {
        Self {
            config: parts.config,
            requester: parts.requester,
            cache: parts.cache,
            handler: parts.handler,
            pool: parts.pool,
            shard_config: parts.shard_config,
            shard_range: parts.shard_range,
            shards: RwLock::new(None),
            started: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
            cancel: parts.cancel,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn requester(&self) -> &Arc<Requester> {
        &self.requester
    }

    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    /// Token that shuts the whole client down when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Discover the gateway and start the shards.
    ///
    /// Waits out an exhausted session start budget first. Fails if called twice.
    pub async fn start(&self) -> ClientResult<()> {
        if self.cancel.is_cancelled() {
            return Err(ClientError::ShutDown);
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ClientError::AlreadyStarted);
        }

        let result = self.start_shards().await;
        if result.is_err() {
            self.started.store(false, Ordering::SeqCst);
        }
        result
    }

    async fn start_shards(&self) -> ClientResult<()> {
        let bot = self.requester.gateway_bot().await?;
        let total = self.config.gateway.shard_count.unwrap_or(bot.shards).max(1);
        let ids = self.shard_range.clone().unwrap_or(0..total);
        let limit = bot.session_start_limit;

        tracing::info!(
            total,
            first = ids.start,
            last = ids.end.saturating_sub(1),
            remaining = limit.remaining,
            max_concurrency = limit.max_concurrency,
            "Gateway discovered"
        );

        if let Some(wait) = limit.wait_for(ids.len() as u32) {
            tracing::warn!(
                wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                remaining = limit.remaining,
                "Session start budget exhausted, waiting for reset"
            );
            tokio::select! {
                () = self.cancel.cancelled() => return Err(ClientError::ShutDown),
                () = tokio::time::sleep(wait) => {}
            }
        }

        let url = self.config.gateway.url.clone().unwrap_or(bot.url);
        let ctx = ShardContext {
            config: Arc::clone(&self.shard_config),
            admission: Arc::new(AdmissionController::new(
                limit.max_concurrency,
                Duration::from_millis(self.config.gateway.identify_spacing_ms),
            )),
            pool: Arc::clone(&self.pool),
            cache: Arc::clone(&self.cache),
            handler: Arc::clone(&self.handler),
        };

        let manager = ShardManager::start(&url, ids, total, &ctx, &self.cancel)?;
        *self.shards.write() = Some(Arc::new(manager));
        Ok(())
    }

    /// Start, then wait until every shard stops.
    ///
    /// Returns the first fatal shard error; returns `Ok` after a shutdown.
    pub async fn run(&self) -> ClientResult<()> {
        self.start().await?;
        match self.manager() {
            Some(manager) => manager.wait().await.map_err(ClientError::from),
            None => Err(ClientError::NotStarted),
        }
    }

    /// Close every shard socket and the HTTP client; safe to call any number of times
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!("Client shutting down");
        self.cancel.cancel();

        if let Some(manager) = self.manager() {
            for error in manager.shutdown().await {
                tracing::warn!(error = %error, "Shard had failed before shutdown");
            }
        }
        self.requester.close();
        tracing::info!("Client shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    fn manager(&self) -> Option<Arc<ShardManager>> {
        self.shards.read().clone()
    }

    /// Status of every shard run by this client; empty before start
    pub fn status(&self) -> Vec<ShardStatus> {
        self.manager().map(|m| m.status()).unwrap_or_default()
    }

    pub fn shard(&self, id: u32) -> Option<ShardHandle> {
        self.manager().and_then(|m| m.shard(id))
    }

    /// Total shard count; the configured count (or one) before start
    pub fn shard_count(&self) -> u32 {
        self.manager()
            .map(|m| m.total())
            .or(self.config.gateway.shard_count)
            .unwrap_or(1)
            .max(1)
    }

    /// Shard receiving `guild_id`'s events
    pub fn shard_for_guild(&self, guild_id: Snowflake) -> u32 {
        shard_for_guild(guild_id, self.shard_count())
    }

    /// Handle of the shard receiving `guild_id`'s events
    pub fn guild_shard(&self, guild_id: Snowflake) -> Option<ShardHandle> {
        self.shard(self.shard_for_guild(guild_id))
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("started", &self.started.load(Ordering::Relaxed))
            .field("shut_down", &self.is_shut_down())
            .field("shards", &self.manager())
            .finish()
    }
}
