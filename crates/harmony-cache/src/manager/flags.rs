//! Cache selection flags

use bitflags::bitflags;
use harmony_common::CacheSettings;

bitflags! {
    /// Entity kinds the [`CacheManager`](super::CacheManager) populates
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CacheFlags: u32 {
        const GUILDS       = 1 << 0;
        const CHANNELS     = 1 << 1;
        const ROLES        = 1 << 2;
        const MEMBERS      = 1 << 3;
        const USERS        = 1 << 4;
        const MESSAGES     = 1 << 5;
        const PRESENCES    = 1 << 6;
        const VOICE_STATES = 1 << 7;
    }
}

impl Default for CacheFlags {
    /// Everything except messages, which grow without bound on busy bots
    fn default() -> Self {
        Self::all().difference(Self::MESSAGES)
    }
}

/// Unknown cache kind name in configuration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown cache kind: {0}")]
pub struct UnknownCacheKind(pub String);

impl CacheFlags {
    /// Parse a single kind name (`guilds`, `channels`, `voice_states`, ...)
    pub fn parse_kind(name: &str) -> Result<Self, UnknownCacheKind> {
        match name.to_ascii_lowercase().as_str() {
            "guilds" => Ok(Self::GUILDS),
            "channels" => Ok(Self::CHANNELS),
            "roles" => Ok(Self::ROLES),
            "members" => Ok(Self::MEMBERS),
            "users" => Ok(Self::USERS),
            "messages" => Ok(Self::MESSAGES),
            "presences" => Ok(Self::PRESENCES),
            "voice_states" | "voice-states" => Ok(Self::VOICE_STATES),
            "all" => Ok(Self::all()),
            "none" => Ok(Self::empty()),
            _ => Err(UnknownCacheKind(name.to_string())),
        }
    }

    /// Build flags from configuration; an unset list means the default selection
    pub fn from_settings(settings: &CacheSettings) -> Result<Self, UnknownCacheKind> {
        match &settings.kinds {
            None => Ok(Self::default()),
            Some(kinds) => kinds
                .iter()
                .try_fold(Self::empty(), |acc, kind| Ok(acc | Self::parse_kind(kind)?)),
        }
    }
}
