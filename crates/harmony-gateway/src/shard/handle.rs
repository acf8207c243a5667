//! Caller-side handle of a running shard

use super::state::{ShardState, ShardStatus};
use crate::error::{GatewayError, GatewayResult};
use crate::protocol::{
    GatewayMessage, OpCode, PresenceUpdatePayload, RequestGuildMembersPayload,
    RequestSoundboardSoundsPayload, VoiceStateUpdatePayload,
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::Serialize;
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Commands buffered per shard while it is not connected
pub const COMMAND_BUFFER: usize = 32;

/// Sends commands to one shard and observes its status
#[derive(Clone)]
pub struct ShardHandle {
    id: u32,
    status: watch::Receiver<ShardStatus>,
    commands: mpsc::Sender<GatewayMessage>,
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl ShardHandle {
    pub(crate) fn new(
        id: u32,
        status: watch::Receiver<ShardStatus>,
        commands: mpsc::Sender<GatewayMessage>,
        commands_per_minute: u32,
    ) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(commands_per_minute).unwrap_or(NonZeroU32::MIN));
        Self {
            id,
            status,
            commands,
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Current status snapshot
    pub fn status(&self) -> ShardStatus {
        self.status.borrow().clone()
    }

    pub fn state(&self) -> ShardState {
        self.status.borrow().state
    }

    /// Wait until the shard reaches `state`.
    ///
    /// Fails once the shard task is gone without reaching it.
    pub async fn wait_for(&self, state: ShardState) -> GatewayResult<ShardStatus> {
        let mut status = self.status.clone();
        status
            .wait_for(|s| s.state == state)
            .await
            .map(|s| s.clone())
            .map_err(|_| GatewayError::ShardStopped(self.id))
    }

    /// Queue a raw command.
    ///
    /// Waits for the command quota, then for room in the queue. Commands are written once
    /// the shard is connected. Heartbeat, handshake and server-only ops are rejected.
    pub async fn command(&self, message: GatewayMessage) -> GatewayResult<()> {
        if !message.op.is_user_command() {
            return Err(GatewayError::InvalidCommand(format!("op {} is not sendable", message.op)));
        }
        self.limiter.until_ready().await;
        self.commands
            .send(message)
            .await
            .map_err(|_| GatewayError::ShardStopped(self.id))
    }

    /// Op 3
    pub async fn update_presence(&self, presence: &PresenceUpdatePayload) -> GatewayResult<()> {
        if !presence.is_valid_status() {
            return Err(GatewayError::InvalidCommand(format!(
                "unknown status {:?}",
                presence.status
            )));
        }
        self.command(encode(OpCode::PresenceUpdate, presence)?).await
    }

    /// Op 4
    pub async fn update_voice_state(&self, voice: &VoiceStateUpdatePayload) -> GatewayResult<()> {
        self.command(encode(OpCode::VoiceStateUpdate, voice)?).await
    }

    /// Op 8; members arrive as GUILD_MEMBERS_CHUNK dispatches
    pub async fn request_guild_members(&self, request: &RequestGuildMembersPayload) -> GatewayResult<()> {
        if request.query.is_none() && request.user_ids.is_none() {
            return Err(GatewayError::InvalidCommand(
                "member request needs a query or user ids".to_string(),
            ));
        }
        self.command(encode(OpCode::RequestGuildMembers, request)?).await
    }

    /// Op 31
    pub async fn request_soundboard_sounds(
        &self,
        request: &RequestSoundboardSoundsPayload,
    ) -> GatewayResult<()> {
        self.command(encode(OpCode::RequestSoundboardSounds, request)?).await
    }
}

impl std::fmt::Debug for ShardHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardHandle")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

fn encode(op: OpCode, payload: &impl Serialize) -> GatewayResult<GatewayMessage> {
    Ok(GatewayMessage::new(op, Some(serde_json::to_value(payload)?)))
}
