//! REST lookups that populate the cache
//!
//! `fetch_*` always hits the API and stores the result; the unprefixed getters answer from
//! the cache and fall back to a fetch on a miss.

use crate::client::Client;
use crate::error::ClientResult;
use harmony_cache::Entity;
use harmony_core::Snowflake;
use harmony_rest::Request;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

impl Client {
    async fn get(&self, path: String) -> ClientResult<Value> {
        Ok(self.requester().request(Request::get(path)).await?)
    }

    /// `GET /users/@me`
    pub async fn fetch_current_user(&self) -> ClientResult<Entity> {
        let user = self.get("/users/@me".to_string()).await?;
        self.cache().insert_user(&user);
        Ok(Arc::new(user))
    }

    pub async fn fetch_user(&self, user_id: Snowflake) -> ClientResult<Entity> {
        let user = self.get(format!("/users/{user_id}")).await?;
        self.cache().insert_user(&user);
        Ok(Arc::new(user))
    }

    pub async fn fetch_guild(&self, guild_id: Snowflake) -> ClientResult<Entity> {
        let guild = self.get(format!("/guilds/{guild_id}")).await?;
        self.cache().insert_guild(&guild);
        Ok(Arc::new(guild))
    }

    pub async fn fetch_channel(&self, channel_id: Snowflake) -> ClientResult<Entity> {
        let channel = self.get(format!("/channels/{channel_id}")).await?;
        self.cache().insert_channel(&channel);
        Ok(Arc::new(channel))
    }

    pub async fn fetch_guild_channels(&self, guild_id: Snowflake) -> ClientResult<Vec<Entity>> {
        let channels = self.get(format!("/guilds/{guild_id}/channels")).await?;
        Ok(entities(channels, |channel| {
            self.cache().insert_channel(channel);
        }))
    }

    pub async fn fetch_guild_roles(&self, guild_id: Snowflake) -> ClientResult<Vec<Entity>> {
        let roles = self.get(format!("/guilds/{guild_id}/roles")).await?;
        Ok(entities(roles, |role| {
            self.cache().insert_role(guild_id, role);
        }))
    }

    pub async fn fetch_member(&self, guild_id: Snowflake, user_id: Snowflake) -> ClientResult<Entity> {
        let member = self
            .get(format!("/guilds/{guild_id}/members/{user_id}"))
            .await?;
        self.cache().insert_member(guild_id, &member);
        Ok(Arc::new(member))
    }

    pub async fn fetch_message(
        &self,
        channel_id: Snowflake,
        message_id: Snowflake,
    ) -> ClientResult<Entity> {
        let message = self
            .get(format!("/channels/{channel_id}/messages/{message_id}"))
            .await?;
        self.cache().insert_message(&message);
        Ok(Arc::new(message))
    }

    pub async fn user(&self, user_id: Snowflake) -> ClientResult<Entity> {
        match self.cache().user(user_id) {
            Some(user) => Ok(user),
            None => self.fetch_user(user_id).await,
        }
    }

    pub async fn guild(&self, guild_id: Snowflake) -> ClientResult<Entity> {
        match self.cache().guild(guild_id) {
            Some(guild) => Ok(guild),
            None => self.fetch_guild(guild_id).await,
        }
    }

    pub async fn channel(&self, channel_id: Snowflake) -> ClientResult<Entity> {
        match self.cache().channel(channel_id) {
            Some(channel) => Ok(channel),
            None => self.fetch_channel(channel_id).await,
        }
    }

    pub async fn member(&self, guild_id: Snowflake, user_id: Snowflake) -> ClientResult<Entity> {
        match self.cache().member(guild_id, user_id) {
            Some(member) => Ok(member),
            None => self.fetch_member(guild_id, user_id).await,
        }
    }

    /// `POST /channels/{id}/messages`; the created message is cached
    pub async fn create_message(
        &self,
        channel_id: Snowflake,
        body: &impl Serialize,
    ) -> ClientResult<Entity> {
        let request = Request::post(format!("/channels/{channel_id}/messages")).json(body)?;
        let message: Value = self.requester().request(request).await?;
        self.cache().insert_message(&message);
        Ok(Arc::new(message))
    }
}

/// Split an array response into entities, passing each to `store`
fn entities(list: Value, mut store: impl FnMut(&Value)) -> Vec<Entity> {
    match list {
        Value::Array(items) => items
            .into_iter()
            .map(|item| {
                store(&item);
                Arc::new(item)
            })
            .collect(),
        _ => Vec::new(),
    }
}
