//! Gateway intents
//!
//! Selects which groups of dispatch events a shard subscribes to.

use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

bitflags! {
    /// Gateway intent flags sent with Identify
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Intents: u64 {
        /// Guild, channel, role and thread lifecycle events
        const GUILDS                        = 1 << 0;
        /// Member add/update/remove (privileged)
        const GUILD_MEMBERS                 = 1 << 1;
        /// Bans and audit log entries
        const GUILD_MODERATION              = 1 << 2;
        /// Emoji, sticker and soundboard updates
        const GUILD_EXPRESSIONS             = 1 << 3;
        /// Integration updates
        const GUILD_INTEGRATIONS            = 1 << 4;
        /// Webhook updates
        const GUILD_WEBHOOKS                = 1 << 5;
        /// Invite create/delete
        const GUILD_INVITES                 = 1 << 6;
        /// Voice state updates
        const GUILD_VOICE_STATES            = 1 << 7;
        /// Presence updates (privileged)
        const GUILD_PRESENCES               = 1 << 8;
        /// Guild message create/update/delete
        const GUILD_MESSAGES                = 1 << 9;
        /// Guild message reactions
        const GUILD_MESSAGE_REACTIONS       = 1 << 10;
        /// Guild typing indicators
        const GUILD_MESSAGE_TYPING          = 1 << 11;
        /// Direct message create/update/delete
        const DIRECT_MESSAGES               = 1 << 12;
        /// Direct message reactions
        const DIRECT_MESSAGE_REACTIONS      = 1 << 13;
        /// Direct message typing indicators
        const DIRECT_MESSAGE_TYPING         = 1 << 14;
        /// Message content in payloads (privileged)
        const MESSAGE_CONTENT               = 1 << 15;
        /// Scheduled event lifecycle
        const GUILD_SCHEDULED_EVENTS        = 1 << 16;
        /// Auto-moderation rule changes
        const AUTO_MODERATION_CONFIGURATION = 1 << 20;
        /// Auto-moderation actions
        const AUTO_MODERATION_EXECUTION     = 1 << 21;
        /// Poll votes in guilds
        const GUILD_MESSAGE_POLLS           = 1 << 24;
        /// Poll votes in direct messages
        const DIRECT_MESSAGE_POLLS          = 1 << 25;

        /// Intents that must be enabled for the application before use
        const PRIVILEGED = Self::GUILD_MEMBERS.bits()
            | Self::GUILD_PRESENCES.bits()
            | Self::MESSAGE_CONTENT.bits();
    }
}

impl Intents {
    /// Every intent that does not require approval
    #[must_use]
    pub fn non_privileged() -> Self {
        Self::all().difference(Self::PRIVILEGED)
    }

    /// Whether any privileged intent is requested
    #[inline]
    pub fn is_privileged(&self) -> bool {
        self.intersects(Self::PRIVILEGED)
    }
}

impl Default for Intents {
    fn default() -> Self {
        Self::non_privileged()
    }
}

impl Serialize for Intents {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(self.bits())
    }
}

impl<'de> Deserialize<'de> for Intents {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Self::from_bits_truncate)
    }
}
