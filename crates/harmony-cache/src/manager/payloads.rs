//! Minimal views of dispatch payloads
//!
//! The cache treats entities as opaque JSON. These structs pull out only the ids it needs
//! to key and index them; every other field is left untouched in the stored value.

use harmony_core::Snowflake;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub(crate) struct IdRef {
    pub id: Snowflake,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Ready {
    pub user: Value,
    #[serde(default)]
    pub guilds: Vec<GuildAvailability>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GuildAvailability {
    pub id: Snowflake,
    #[serde(default)]
    pub unavailable: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChannelRef {
    pub id: Snowflake,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MemberRef {
    pub guild_id: Snowflake,
    pub user: IdRef,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MembersChunk {
    pub guild_id: Snowflake,
    #[serde(default)]
    pub members: Vec<Value>,
    #[serde(default)]
    pub presences: Vec<Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RoleUpsert {
    pub guild_id: Snowflake,
    pub role: Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RoleDelete {
    pub guild_id: Snowflake,
    pub role_id: Snowflake,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessageRef {
    pub id: Snowflake,
    pub channel_id: Snowflake,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessageBulkDelete {
    pub ids: Vec<Snowflake>,
    pub channel_id: Snowflake,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PresenceRef {
    pub user: IdRef,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VoiceStateRef {
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    pub user_id: Snowflake,
    #[serde(default)]
    pub channel_id: Option<Snowflake>,
}

/// Deserialize a view from a borrowed payload
pub(crate) fn view<'a, T: Deserialize<'a>>(data: &'a Value) -> Option<T> {
    T::deserialize(data).ok()
}
