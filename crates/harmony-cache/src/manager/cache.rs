//! Cache manager
//!
//! One [`ShardedMap`] per entity kind plus guild-scoped secondary indexes. Entities are
//! stored as shared JSON values; dispatch events overwrite them with a shallow field merge
//! so partial update payloads never erase fields they omit.

use super::flags::CacheFlags;
use super::payloads::{
    view, ChannelRef, GuildAvailability, IdRef, MemberRef, MembersChunk, MessageBulkDelete,
    MessageRef, PresenceRef, Ready, RoleDelete, RoleUpsert, VoiceStateRef,
};
use crate::sharded::ShardedMap;
use harmony_core::Snowflake;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// A cached entity payload
pub type Entity = Arc<Value>;

type IdSet = HashSet<Snowflake>;

/// Entity counts at one moment; each figure is an independent snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub guilds: usize,
    pub unavailable_guilds: usize,
    pub channels: usize,
    pub users: usize,
    pub members: usize,
    pub roles: usize,
    pub messages: usize,
    pub presences: usize,
    pub voice_states: usize,
}

/// In-memory cache of remote state, populated from dispatch events and REST responses
pub struct CacheManager {
    flags: CacheFlags,
    current_user: RwLock<Option<Entity>>,

    guilds: ShardedMap<Snowflake, Entity>,
    unavailable_guilds: ShardedMap<Snowflake, ()>,
    channels: ShardedMap<Snowflake, Entity>,
    users: ShardedMap<Snowflake, Entity>,
    members: ShardedMap<(Snowflake, Snowflake), Entity>,
    roles: ShardedMap<(Snowflake, Snowflake), Entity>,
    messages: ShardedMap<(Snowflake, Snowflake), Entity>,
    presences: ShardedMap<(Snowflake, Snowflake), Entity>,
    voice_states: ShardedMap<(Snowflake, Snowflake), Entity>,

    guild_channels: ShardedMap<Snowflake, IdSet>,
    guild_members: ShardedMap<Snowflake, IdSet>,
    guild_roles: ShardedMap<Snowflake, IdSet>,
}

impl CacheManager {
    #[must_use]
    pub fn new(flags: CacheFlags) -> Self {
        Self {
            flags,
            current_user: RwLock::new(None),
            guilds: ShardedMap::new(),
            unavailable_guilds: ShardedMap::new(),
            channels: ShardedMap::new(),
            users: ShardedMap::new(),
            members: ShardedMap::new(),
            roles: ShardedMap::new(),
            messages: ShardedMap::new(),
            presences: ShardedMap::new(),
            voice_states: ShardedMap::new(),
            guild_channels: ShardedMap::new(),
            guild_members: ShardedMap::new(),
            guild_roles: ShardedMap::new(),
        }
    }

    #[must_use]
    pub fn flags(&self) -> CacheFlags {
        self.flags
    }

    fn wants(&self, kind: CacheFlags) -> bool {
        self.flags.contains(kind)
    }

    /// Apply one dispatch event. Unknown events and malformed payloads are ignored.
    pub fn apply(&self, event: &str, data: &Value) {
        let applied = match event {
            "READY" => self.on_ready(data),
            "GUILD_CREATE" => self.insert_guild(data),
            "GUILD_UPDATE" => self.update_guild(data),
            "GUILD_DELETE" => self.on_guild_delete(data),
            "CHANNEL_CREATE" | "CHANNEL_UPDATE" | "THREAD_CREATE" | "THREAD_UPDATE" => {
                self.insert_channel(data)
            }
            "CHANNEL_DELETE" | "THREAD_DELETE" => self.on_channel_delete(data),
            "GUILD_MEMBER_ADD" | "GUILD_MEMBER_UPDATE" => self.on_member_upsert(data),
            "GUILD_MEMBER_REMOVE" => self.on_member_remove(data),
            "GUILD_MEMBERS_CHUNK" => self.on_members_chunk(data),
            "GUILD_ROLE_CREATE" | "GUILD_ROLE_UPDATE" => self.on_role_upsert(data),
            "GUILD_ROLE_DELETE" => self.on_role_delete(data),
            "MESSAGE_CREATE" => self.insert_message(data),
            "MESSAGE_UPDATE" => self.update_message(data),
            "MESSAGE_DELETE" => self.on_message_delete(data),
            "MESSAGE_DELETE_BULK" => self.on_message_delete_bulk(data),
            "PRESENCE_UPDATE" => self.on_presence(data),
            "VOICE_STATE_UPDATE" => self.on_voice_state(data),
            "USER_UPDATE" => self.on_user_update(data),
            _ => return,
        };

        if !applied {
            tracing::trace!(event, "Dispatch not applied to cache");
        }
    }

    // ---- population (also used by REST fetches) ----

    /// Store a full guild object along with its embedded channels, threads, roles and members
    pub fn insert_guild(&self, data: &Value) -> bool {
        let Some(IdRef { id }) = view::<IdRef>(data) else {
            return false;
        };

        if data.get("unavailable").and_then(Value::as_bool) == Some(true) {
            self.unavailable_guilds.set(id, ());
            return true;
        }
        self.unavailable_guilds.delete(&id);

        for channel in array(data, "channels").chain(array(data, "threads")) {
            self.store_channel(Some(id), channel);
        }
        for role in array(data, "roles") {
            self.store_role(id, role);
        }
        for member in array(data, "members") {
            self.store_member(id, member);
        }
        for presence in array(data, "presences") {
            self.store_presence(Some(id), presence);
        }
        for state in array(data, "voice_states") {
            self.store_voice_state(Some(id), state);
        }

        if self.wants(CacheFlags::GUILDS) {
            self.guilds.set(id, Arc::new(strip_collections(data)));
        }
        true
    }

    /// Store or merge a channel or thread
    pub fn insert_channel(&self, data: &Value) -> bool {
        self.store_channel(None, data)
    }

    /// Store or merge a guild member
    pub fn insert_member(&self, guild_id: Snowflake, data: &Value) -> bool {
        self.store_member(guild_id, data)
    }

    /// Store or merge a role
    pub fn insert_role(&self, guild_id: Snowflake, data: &Value) -> bool {
        self.store_role(guild_id, data)
    }

    /// Store or merge a user
    pub fn insert_user(&self, data: &Value) -> bool {
        if !self.wants(CacheFlags::USERS) {
            return false;
        }
        let Some(IdRef { id }) = view::<IdRef>(data) else {
            return false;
        };
        merge_into(&self.users, id, data);
        true
    }

    /// Store a message
    pub fn insert_message(&self, data: &Value) -> bool {
        if let Some(author) = data.get("author") {
            self.insert_user(author);
        }
        if !self.wants(CacheFlags::MESSAGES) {
            return false;
        }
        let Some(MessageRef { id, channel_id }) = view::<MessageRef>(data) else {
            return false;
        };
        self.messages.set((channel_id, id), Arc::new(data.clone()));
        true
    }

    fn store_channel(&self, guild_id: Option<Snowflake>, data: &Value) -> bool {
        if !self.wants(CacheFlags::CHANNELS) {
            return false;
        }
        let Some(channel) = view::<ChannelRef>(data) else {
            return false;
        };
        // Channels embedded in GUILD_CREATE carry no guild_id of their own
        let guild_id = channel.guild_id.or(guild_id);

        merge_into(&self.channels, channel.id, data);
        if let Some(guild_id) = guild_id {
            index_add(&self.guild_channels, guild_id, channel.id);
        }
        true
    }

    fn store_role(&self, guild_id: Snowflake, data: &Value) -> bool {
        if !self.wants(CacheFlags::ROLES) {
            return false;
        }
        let Some(IdRef { id }) = view::<IdRef>(data) else {
            return false;
        };
        merge_into(&self.roles, (guild_id, id), data);
        index_add(&self.guild_roles, guild_id, id);
        true
    }

    fn store_member(&self, guild_id: Snowflake, data: &Value) -> bool {
        let Some(user) = data.get("user") else {
            return false;
        };
        let Some(IdRef { id: user_id }) = view::<IdRef>(user) else {
            return false;
        };
        self.insert_user(user);

        if !self.wants(CacheFlags::MEMBERS) {
            return false;
        }
        merge_into(&self.members, (guild_id, user_id), data);
        index_add(&self.guild_members, guild_id, user_id);
        true
    }

    fn store_presence(&self, guild_id: Option<Snowflake>, data: &Value) -> bool {
        if !self.wants(CacheFlags::PRESENCES) {
            return false;
        }
        let Some(presence) = view::<PresenceRef>(data) else {
            return false;
        };
        let Some(guild_id) = presence.guild_id.or(guild_id) else {
            return false;
        };
        self.presences
            .set((guild_id, presence.user.id), Arc::new(data.clone()));
        true
    }

    fn store_voice_state(&self, guild_id: Option<Snowflake>, data: &Value) -> bool {
        if !self.wants(CacheFlags::VOICE_STATES) {
            return false;
        }
        let Some(state) = view::<VoiceStateRef>(data) else {
            return false;
        };
        let Some(guild_id) = state.guild_id.or(guild_id) else {
            return false;
        };

        let key = (guild_id, state.user_id);
        // A null channel means the user left voice
        if state.channel_id.is_none() {
            self.voice_states.delete(&key);
        } else {
            self.voice_states.set(key, Arc::new(data.clone()));
        }
        true
    }

    // ---- event handlers ----

    fn on_ready(&self, data: &Value) -> bool {
        let Some(Ready { user, guilds }) = view::<Ready>(data) else {
            return false;
        };
        self.insert_user(&user);
        *self.current_user.write() = Some(Arc::new(user));

        for GuildAvailability { id, .. } in guilds {
            self.unavailable_guilds.set(id, ());
        }
        true
    }

    fn update_guild(&self, data: &Value) -> bool {
        if !self.wants(CacheFlags::GUILDS) {
            return false;
        }
        let Some(IdRef { id }) = view::<IdRef>(data) else {
            return false;
        };
        for role in array(data, "roles") {
            self.store_role(id, role);
        }
        merge_into(&self.guilds, id, &strip_collections(data));
        true
    }

    fn on_guild_delete(&self, data: &Value) -> bool {
        let Some(guild) = view::<GuildAvailability>(data) else {
            return false;
        };

        if guild.unavailable {
            // Outage: keep what we know, but mark it stale until the next GUILD_CREATE
            self.unavailable_guilds.set(guild.id, ());
            return true;
        }
        self.remove_guild(guild.id);
        true
    }

    fn on_channel_delete(&self, data: &Value) -> bool {
        let Some(channel) = view::<ChannelRef>(data) else {
            return false;
        };
        self.channels.delete(&channel.id);
        if let Some(guild_id) = channel.guild_id {
            index_remove(&self.guild_channels, guild_id, channel.id);
        }
        self.messages.retain(|(channel_id, _), _| *channel_id != channel.id);
        true
    }

    fn on_member_upsert(&self, data: &Value) -> bool {
        let Some(MemberRef { guild_id, .. }) = view::<MemberRef>(data) else {
            return false;
        };
        self.store_member(guild_id, data)
    }

    fn on_member_remove(&self, data: &Value) -> bool {
        let Some(MemberRef { guild_id, user }) = view::<MemberRef>(data) else {
            return false;
        };
        self.members.delete(&(guild_id, user.id));
        self.presences.delete(&(guild_id, user.id));
        index_remove(&self.guild_members, guild_id, user.id);
        true
    }

    fn on_members_chunk(&self, data: &Value) -> bool {
        let Some(chunk) = view::<MembersChunk>(data) else {
            return false;
        };
        for member in &chunk.members {
            self.store_member(chunk.guild_id, member);
        }
        for presence in &chunk.presences {
            self.store_presence(Some(chunk.guild_id), presence);
        }
        true
    }

    fn on_role_upsert(&self, data: &Value) -> bool {
        let Some(RoleUpsert { guild_id, role }) = view::<RoleUpsert>(data) else {
            return false;
        };
        self.store_role(guild_id, &role)
    }

    fn on_role_delete(&self, data: &Value) -> bool {
        let Some(RoleDelete { guild_id, role_id }) = view::<RoleDelete>(data) else {
            return false;
        };
        self.roles.delete(&(guild_id, role_id));
        index_remove(&self.guild_roles, guild_id, role_id);
        true
    }

    fn update_message(&self, data: &Value) -> bool {
        if !self.wants(CacheFlags::MESSAGES) {
            return false;
        }
        let Some(MessageRef { id, channel_id }) = view::<MessageRef>(data) else {
            return false;
        };
        // Updates for messages we never saw are partial; don't create them
        self.messages
            .update((channel_id, id), |current| {
                current.map(|existing| Arc::new(merge(existing, data)))
            })
            .is_some()
    }

    fn on_message_delete(&self, data: &Value) -> bool {
        let Some(MessageRef { id, channel_id }) = view::<MessageRef>(data) else {
            return false;
        };
        self.messages.delete(&(channel_id, id)).is_some()
    }

    fn on_message_delete_bulk(&self, data: &Value) -> bool {
        let Some(MessageBulkDelete { ids, channel_id }) = view::<MessageBulkDelete>(data) else {
            return false;
        };
        for id in ids {
            self.messages.delete(&(channel_id, id));
        }
        true
    }

    fn on_presence(&self, data: &Value) -> bool {
        self.store_presence(None, data)
    }

    fn on_voice_state(&self, data: &Value) -> bool {
        self.store_voice_state(None, data)
    }

    fn on_user_update(&self, data: &Value) -> bool {
        let mut current = self.current_user.write();
        let next = Arc::new(match current.as_ref() {
            Some(existing) => merge(existing, data),
            None => data.clone(),
        });
        *current = Some(next);
        drop(current);

        self.insert_user(data);
        true
    }

    // ---- invalidation ----

    /// Drop a guild and everything scoped to it
    pub fn remove_guild(&self, guild_id: Snowflake) {
        self.guilds.delete(&guild_id);
        self.unavailable_guilds.delete(&guild_id);

        if let Some(channel_ids) = self.guild_channels.delete(&guild_id) {
            for channel_id in &channel_ids {
                self.channels.delete(channel_id);
            }
            self.messages
                .retain(|(channel_id, _), _| !channel_ids.contains(channel_id));
        }
        if let Some(user_ids) = self.guild_members.delete(&guild_id) {
            for user_id in user_ids {
                self.members.delete(&(guild_id, user_id));
            }
        }
        if let Some(role_ids) = self.guild_roles.delete(&guild_id) {
            for role_id in role_ids {
                self.roles.delete(&(guild_id, role_id));
            }
        }
        self.presences.retain(|(gid, _), _| *gid != guild_id);
        self.voice_states.retain(|(gid, _), _| *gid != guild_id);

        tracing::debug!(guild_id = %guild_id, "Guild removed from cache");
    }

    /// Drop every cached entity
    pub fn clear(&self) {
        *self.current_user.write() = None;
        self.guilds.clear();
        self.unavailable_guilds.clear();
        self.channels.clear();
        self.users.clear();
        self.members.clear();
        self.roles.clear();
        self.messages.clear();
        self.presences.clear();
        self.voice_states.clear();
        self.guild_channels.clear();
        self.guild_members.clear();
        self.guild_roles.clear();
    }

    // ---- reads ----

    /// The bot's own user, from READY and USER_UPDATE
    pub fn current_user(&self) -> Option<Entity> {
        self.current_user.read().clone()
    }

    pub fn guild(&self, id: Snowflake) -> Option<Entity> {
        self.guilds.get(&id)
    }

    pub fn is_guild_unavailable(&self, id: Snowflake) -> bool {
        self.unavailable_guilds.has(&id)
    }

    pub fn channel(&self, id: Snowflake) -> Option<Entity> {
        self.channels.get(&id)
    }

    pub fn user(&self, id: Snowflake) -> Option<Entity> {
        self.users.get(&id)
    }

    pub fn member(&self, guild_id: Snowflake, user_id: Snowflake) -> Option<Entity> {
        self.members.get(&(guild_id, user_id))
    }

    pub fn role(&self, guild_id: Snowflake, role_id: Snowflake) -> Option<Entity> {
        self.roles.get(&(guild_id, role_id))
    }

    pub fn message(&self, channel_id: Snowflake, message_id: Snowflake) -> Option<Entity> {
        self.messages.get(&(channel_id, message_id))
    }

    pub fn presence(&self, guild_id: Snowflake, user_id: Snowflake) -> Option<Entity> {
        self.presences.get(&(guild_id, user_id))
    }

    pub fn voice_state(&self, guild_id: Snowflake, user_id: Snowflake) -> Option<Entity> {
        self.voice_states.get(&(guild_id, user_id))
    }

    /// Ids of the guild's cached channels
    pub fn guild_channel_ids(&self, guild_id: Snowflake) -> Vec<Snowflake> {
        index_snapshot(&self.guild_channels, guild_id)
    }

    /// Ids of the guild's cached members
    pub fn guild_member_ids(&self, guild_id: Snowflake) -> Vec<Snowflake> {
        index_snapshot(&self.guild_members, guild_id)
    }

    /// Ids of the guild's cached roles
    pub fn guild_role_ids(&self, guild_id: Snowflake) -> Vec<Snowflake> {
        index_snapshot(&self.guild_roles, guild_id)
    }

    /// Ids of every available cached guild
    pub fn guild_ids(&self) -> Vec<Snowflake> {
        self.guilds.keys()
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            guilds: self.guilds.len(),
            unavailable_guilds: self.unavailable_guilds.len(),
            channels: self.channels.len(),
            users: self.users.len(),
            members: self.members.len(),
            roles: self.roles.len(),
            messages: self.messages.len(),
            presences: self.presences.len(),
            voice_states: self.voice_states.len(),
        }
    }
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new(CacheFlags::default())
    }
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("flags", &self.flags)
            .field("stats", &self.stats())
            .finish()
    }
}

fn array<'a>(data: &'a Value, field: &str) -> impl Iterator<Item = &'a Value> {
    data.get(field)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

/// Guild objects without the collections that live in their own maps
fn strip_collections(data: &Value) -> Value {
    let mut guild = data.clone();
    if let Some(object) = guild.as_object_mut() {
        for field in [
            "channels",
            "threads",
            "roles",
            "members",
            "presences",
            "voice_states",
        ] {
            object.remove(field);
        }
    }
    guild
}

/// Shallow merge: top-level fields of `incoming` replace those of `existing`
fn merge(existing: &Value, incoming: &Value) -> Value {
    match (existing, incoming) {
        (Value::Object(base), Value::Object(patch)) => {
            let mut merged = base.clone();
            for (key, value) in patch {
                merged.insert(key.clone(), value.clone());
            }
            Value::Object(merged)
        }
        _ => incoming.clone(),
    }
}

fn merge_into<K>(map: &ShardedMap<K, Entity>, key: K, data: &Value)
where
    K: crate::sharded::PartitionKey,
{
    map.update(key, |current| {
        Some(Arc::new(match current {
            Some(existing) => merge(existing, data),
            None => data.clone(),
        }))
    });
}

fn index_add(index: &ShardedMap<Snowflake, IdSet>, owner: Snowflake, id: Snowflake) {
    index.update(owner, |current| {
        let mut ids = current.cloned().unwrap_or_default();
        ids.insert(id);
        Some(ids)
    });
}

fn index_remove(index: &ShardedMap<Snowflake, IdSet>, owner: Snowflake, id: Snowflake) {
    index.modify(&owner, |ids| {
        ids.remove(&id);
    });
}

fn index_snapshot(index: &ShardedMap<Snowflake, IdSet>, owner: Snowflake) -> Vec<Snowflake> {
    index
        .with(&owner, |ids| ids.iter().copied().collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sf(id: u64) -> Snowflake {
        Snowflake::new(id)
    }

    fn guild_create() -> Value {
        json!({
            "id": "100",
            "name": "harmony",
            "channels": [
                {"id": "200", "type": 0, "name": "general"},
                {"id": "201", "type": 2, "name": "voice"}
            ],
            "roles": [{"id": "100", "name": "@everyone"}],
            "members": [
                {"user": {"id": "300", "username": "alice"}, "nick": "al"}
            ],
            "voice_states": [
                {"user_id": "300", "channel_id": "201"}
            ]
        })
    }

    #[test]
    fn test_guild_create_populates_maps_and_indexes() {
        let cache = CacheManager::default();
        cache.apply("GUILD_CREATE", &guild_create());

        let guild = cache.guild(sf(100)).unwrap();
        assert_eq!(guild["name"], "harmony");
        assert!(guild.get("channels").is_none());

        let mut channels = cache.guild_channel_ids(sf(100));
        channels.sort();
        assert_eq!(channels, vec![sf(200), sf(201)]);
        assert_eq!(cache.guild_member_ids(sf(100)), vec![sf(300)]);
        assert_eq!(cache.guild_role_ids(sf(100)), vec![sf(100)]);

        assert_eq!(cache.user(sf(300)).unwrap()["username"], "alice");
        assert_eq!(cache.member(sf(100), sf(300)).unwrap()["nick"], "al");
        assert!(cache.voice_state(sf(100), sf(300)).is_some());
    }

    #[test]
    fn test_update_merges_fields() {
        let cache = CacheManager::default();
        cache.apply("GUILD_CREATE", &guild_create());
        cache.apply(
            "CHANNEL_UPDATE",
            &json!({"id": "200", "guild_id": "100", "topic": "hello"}),
        );

        let channel = cache.channel(sf(200)).unwrap();
        assert_eq!(channel["name"], "general");
        assert_eq!(channel["topic"], "hello");
    }

    #[test]
    fn test_guild_delete_removes_enclosing_state() {
        let cache = CacheManager::default();
        cache.apply("GUILD_CREATE", &guild_create());
        cache.apply("GUILD_DELETE", &json!({"id": "100"}));

        assert!(cache.guild(sf(100)).is_none());
        assert!(cache.channel(sf(200)).is_none());
        assert!(cache.member(sf(100), sf(300)).is_none());
        assert!(cache.role(sf(100), sf(100)).is_none());
        assert!(cache.voice_state(sf(100), sf(300)).is_none());
        assert!(cache.guild_member_ids(sf(100)).is_empty());
        // Users are global and outlive guild membership
        assert!(cache.user(sf(300)).is_some());
    }

    #[test]
    fn test_unavailable_guild_is_kept() {
        let cache = CacheManager::default();
        cache.apply("GUILD_CREATE", &guild_create());
        cache.apply("GUILD_DELETE", &json!({"id": "100", "unavailable": true}));

        assert!(cache.guild(sf(100)).is_some());
        assert!(cache.is_guild_unavailable(sf(100)));

        cache.apply("GUILD_CREATE", &guild_create());
        assert!(!cache.is_guild_unavailable(sf(100)));
    }

    #[test]
    fn test_ready_marks_guilds_unavailable() {
        let cache = CacheManager::default();
        cache.apply(
            "READY",
            &json!({
                "user": {"id": "1", "username": "bot"},
                "guilds": [{"id": "100", "unavailable": true}],
                "session_id": "abc"
            }),
        );

        assert_eq!(cache.current_user().unwrap()["username"], "bot");
        assert!(cache.is_guild_unavailable(sf(100)));

        cache.apply("USER_UPDATE", &json!({"id": "1", "avatar": "x"}));
        let me = cache.current_user().unwrap();
        assert_eq!(me["username"], "bot");
        assert_eq!(me["avatar"], "x");
    }

    #[test]
    fn test_member_remove_updates_index() {
        let cache = CacheManager::default();
        cache.apply("GUILD_CREATE", &guild_create());
        cache.apply(
            "GUILD_MEMBER_ADD",
            &json!({"guild_id": "100", "user": {"id": "301", "username": "bob"}}),
        );
        assert_eq!(cache.guild_member_ids(sf(100)).len(), 2);

        cache.apply(
            "GUILD_MEMBER_REMOVE",
            &json!({"guild_id": "100", "user": {"id": "300"}}),
        );
        assert_eq!(cache.guild_member_ids(sf(100)), vec![sf(301)]);
        assert!(cache.member(sf(100), sf(300)).is_none());
    }

    #[test]
    fn test_messages_respect_flags() {
        let message = json!({"id": "500", "channel_id": "200", "content": "hi",
                             "author": {"id": "300", "username": "alice"}});

        let default = CacheManager::default();
        default.apply("MESSAGE_CREATE", &message);
        assert!(default.message(sf(200), sf(500)).is_none());
        assert!(default.user(sf(300)).is_some());

        let cache = CacheManager::new(CacheFlags::all());
        cache.apply("MESSAGE_CREATE", &message);
        cache.apply(
            "MESSAGE_UPDATE",
            &json!({"id": "500", "channel_id": "200", "content": "edited"}),
        );
        assert_eq!(cache.message(sf(200), sf(500)).unwrap()["content"], "edited");

        // Unknown message updates are not materialised
        cache.apply(
            "MESSAGE_UPDATE",
            &json!({"id": "501", "channel_id": "200", "content": "?"}),
        );
        assert!(cache.message(sf(200), sf(501)).is_none());

        cache.apply(
            "MESSAGE_DELETE_BULK",
            &json!({"ids": ["500"], "channel_id": "200"}),
        );
        assert!(cache.message(sf(200), sf(500)).is_none());
    }

    #[test]
    fn test_voice_leave_removes_state() {
        let cache = CacheManager::default();
        cache.apply("GUILD_CREATE", &guild_create());
        cache.apply(
            "VOICE_STATE_UPDATE",
            &json!({"guild_id": "100", "user_id": "300", "channel_id": null}),
        );
        assert!(cache.voice_state(sf(100), sf(300)).is_none());
    }

    #[test]
    fn test_role_events() {
        let cache = CacheManager::default();
        cache.apply(
            "GUILD_ROLE_CREATE",
            &json!({"guild_id": "100", "role": {"id": "7", "name": "mod"}}),
        );
        assert_eq!(cache.role(sf(100), sf(7)).unwrap()["name"], "mod");

        cache.apply(
            "GUILD_ROLE_DELETE",
            &json!({"guild_id": "100", "role_id": "7"}),
        );
        assert!(cache.role(sf(100), sf(7)).is_none());
        assert!(cache.guild_role_ids(sf(100)).is_empty());
    }

    #[test]
    fn test_disabled_kinds_are_never_populated() {
        let cache = CacheManager::new(CacheFlags::GUILDS);
        cache.apply("GUILD_CREATE", &guild_create());

        let stats = cache.stats();
        assert_eq!(stats.guilds, 1);
        assert_eq!(stats.channels, 0);
        assert_eq!(stats.members, 0);
        assert_eq!(stats.users, 0);
        assert_eq!(stats.voice_states, 0);
    }

    #[test]
    fn test_malformed_payload_is_ignored() {
        let cache = CacheManager::default();
        cache.apply("GUILD_CREATE", &json!({"name": "no id"}));
        cache.apply("CHANNEL_CREATE", &json!({"id": "not-a-number"}));
        cache.apply("TYPING_START", &json!({}));
        assert_eq!(cache.stats(), CacheStats::default());
    }
}
