//! Shard manager
//!
//! Spawns one [`ShardRunner`] task per shard and keeps the handles in a `DashMap` for
//! concurrent lookup by shard id.

use crate::error::{GatewayError, GatewayResult, ShardError};
use crate::protocol::GatewayMessage;
use crate::shard::{
    ShardContext, ShardHandle, ShardMachine, ShardRunner, ShardStatus, COMMAND_BUFFER,
};
use dashmap::DashMap;
use harmony_core::Snowflake;
use std::collections::HashMap;
use std::ops::Range;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::{Id, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

/// Running shard tasks with the shard id of each task
#[derive(Default)]
struct Tasks {
    set: JoinSet<Result<(), ShardError>>,
    ids: HashMap<Id, u32>,
}

/// Owns every shard of a client
pub struct ShardManager {
    total: u32,
    shards: DashMap<u32, ShardHandle>,
    tasks: Mutex<Tasks>,
    cancel: CancellationToken,
}

impl ShardManager {
    /// Start shards `ids` out of `total`, all connecting to `gateway_url`.
    ///
    /// Shards stop when `cancel` fires or [`ShardManager::shutdown`] is called.
    pub fn start(
        gateway_url: &str,
        ids: Range<u32>,
        total: u32,
        ctx: &ShardContext,
        cancel: &CancellationToken,
    ) -> GatewayResult<Self> {
        if total == 0 || ids.end > total || ids.is_empty() {
            return Err(GatewayError::InvalidShardCount(total));
        }

        let cancel = cancel.child_token();
        let shards = DashMap::new();
        let mut tasks = Tasks::default();

        for id in ids {
            let (status_tx, status_rx) = watch::channel(ShardStatus::new(id, total));
            let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);

            let machine = ShardMachine::new(id, total, gateway_url, ctx.config.reconnect);
            let runner = ShardRunner::new(
                machine,
                ctx.clone(),
                command_rx,
                status_tx,
                cancel.clone(),
            );
            let abort = tasks.set.spawn(runner.run());
            tasks.ids.insert(abort.id(), id);

            shards.insert(
                id,
                ShardHandle::new(id, status_rx, command_tx, ctx.config.commands_per_minute),
            );
        }

        tracing::info!(shards = shards.len(), total, "Shards started");

        Ok(Self {
            total,
            shards,
            tasks: Mutex::new(tasks),
            cancel,
        })
    }

    /// Total shard count of the application
    pub fn total(&self) -> u32 {
        self.total
    }

    /// Shards run by this manager
    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    pub fn shard(&self, id: u32) -> Option<ShardHandle> {
        self.shards.get(&id).map(|r| r.clone())
    }

    /// Shard receiving a guild's events
    #[must_use]
    pub fn shard_for_guild(&self, guild_id: Snowflake) -> u32 {
        shard_for_guild(guild_id, self.total)
    }

    /// Status of every shard, ordered by id
    pub fn status(&self) -> Vec<ShardStatus> {
        let mut status: Vec<ShardStatus> = self.shards.iter().map(|r| r.status()).collect();
        status.sort_by_key(|s| s.id);
        status
    }

    /// Send a raw command through one shard
    pub async fn command(&self, shard_id: u32, message: GatewayMessage) -> GatewayResult<()> {
        let shard = self
            .shard(shard_id)
            .ok_or(GatewayError::UnknownShard(shard_id))?;
        shard.command(message).await
    }

    /// Wait until every shard has stopped.
    ///
    /// Returns the first fatal shard error as soon as it happens; other shards keep running.
    pub async fn wait(&self) -> Result<(), ShardError> {
        let mut tasks = self.tasks.lock().await;
        while let Some(joined) = tasks.set.join_next_with_id().await {
            tasks.outcome(joined)?;
        }
        Ok(())
    }

    /// Stop every shard and wait for them; safe to call more than once.
    ///
    /// Returns the errors of shards that had already failed.
    pub async fn shutdown(&self) -> Vec<ShardError> {
        self.cancel.cancel();
        let mut tasks = self.tasks.lock().await;
        let mut errors = Vec::new();
        while let Some(joined) = tasks.set.join_next_with_id().await {
            if let Err(e) = tasks.outcome(joined) {
                errors.push(e);
            }
        }
        tracing::info!(failed = errors.len(), "Shards shut down");
        errors
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Tasks {
    fn outcome(&mut self, joined: Result<(Id, Result<(), ShardError>), JoinError>) -> Result<(), ShardError> {
        match joined {
            Ok((id, result)) => {
                self.ids.remove(&id);
                result
            }
            Err(e) => {
                let shard_id = self.ids.remove(&e.id()).unwrap_or(u32::MAX);
                Err(ShardError::Crashed {
                    shard_id,
                    reason: e.to_string(),
                })
            }
        }
    }
}

impl std::fmt::Debug for ShardManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardManager")
            .field("total", &self.total)
            .field("shards", &self.shards.len())
            .field("shut_down", &self.cancel.is_cancelled())
            .finish()
    }
}

/// `(guild_id >> 22) % total`; zero shards map everything to shard 0
#[must_use]
pub fn shard_for_guild(guild_id: Snowflake, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    ((guild_id.get() >> 22) % u64::from(total)) as u32
}
