//! Client builder

use crate::client::{Client, ClientParts};
use crate::error::ClientResult;
use harmony_cache::{CacheFlags, CacheManager};
use harmony_common::ClientConfig;
use harmony_gateway::protocol::PresenceUpdatePayload;
use harmony_gateway::{DecompressorPool, EventHandler, NoopHandler, ReconnectPolicy, ShardConfig};
use harmony_rest::{Requester, RestConfig};
use std::ops::Range;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Builder for [`Client`]
pub struct ClientBuilder {
    config: ClientConfig,
    handler: Option<Arc<dyn EventHandler>>,
    cache_flags: Option<CacheFlags>,
    presence: Option<PresenceUpdatePayload>,
    shard_range: Option<Range<u32>>,
    reconnect: Option<ReconnectPolicy>,
    cancel: Option<CancellationToken>,
}

impl ClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            handler: None,
            cache_flags: None,
            presence: None,
            shard_range: None,
            reconnect: None,
            cancel: None,
        }
    }

    pub fn handler(mut self, handler: impl EventHandler) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Override the cache kinds from configuration
    pub fn cache_flags(mut self, flags: CacheFlags) -> Self {
        self.cache_flags = Some(flags);
        self
    }

    /// Presence sent with every Identify
    pub fn presence(mut self, presence: PresenceUpdatePayload) -> Self {
        self.presence = Some(presence);
        self
    }

    /// Run only these shard ids in this process
    pub fn shard_range(mut self, ids: Range<u32>) -> Self {
        self.shard_range = Some(ids);
        self
    }

    pub fn reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = Some(policy);
        self
    }

    /// Tie the client's lifetime to an existing token
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn build(self) -> ClientResult<Client> {
        let flags = match self.cache_flags {
            Some(flags) => flags,
            None => CacheFlags::from_settings(&self.config.cache)?,
        };
        let cancel = self.cancel.unwrap_or_default();
        let requester = Requester::with_cancellation(RestConfig::from(&self.config), cancel.clone())?;

        let mut shard_config = ShardConfig::from(&self.config);
        shard_config.presence = self.presence;
        if let Some(policy) = self.reconnect {
            shard_config.reconnect = policy;
        }

        Ok(Client::from_parts(ClientParts {
            config: self.config,
            requester: Arc::new(requester),
            cache: Arc::new(CacheManager::new(flags)),
            handler: self.handler.unwrap_or_else(|| Arc::new(NoopHandler)),
            pool: DecompressorPool::new(harmony_gateway::compression::DEFAULT_MAX_IDLE),
            shard_config: Arc::new(shard_config),
            shard_range: self.shard_range,
            cancel,
        }))
    }
}
