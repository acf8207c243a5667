//! Gateway close codes and the recovery each one calls for

/// How a shard proceeds after its socket closes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseDisposition {
    /// Reconnect and resume the existing session
    Resume,
    /// Reconnect with a fresh Identify; the session is gone
    Reidentify,
    /// Stop the shard; retrying cannot succeed
    Fatal,
}

/// Close codes the gateway sends in the 4000 range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum CloseCode {
    UnknownError = 4000,
    UnknownOpcode = 4001,
    DecodeError = 4002,
    NotAuthenticated = 4003,
    AuthenticationFailed = 4004,
    AlreadyAuthenticated = 4005,
    InvalidSequence = 4007,
    RateLimited = 4008,
    SessionTimedOut = 4009,
    InvalidShard = 4010,
    ShardingRequired = 4011,
    InvalidApiVersion = 4012,
    InvalidIntents = 4013,
    DisallowedIntents = 4014,
}

impl CloseCode {
    const ALL: [Self; 14] = [
        Self::UnknownError,
        Self::UnknownOpcode,
        Self::DecodeError,
        Self::NotAuthenticated,
        Self::AuthenticationFailed,
        Self::AlreadyAuthenticated,
        Self::InvalidSequence,
        Self::RateLimited,
        Self::SessionTimedOut,
        Self::InvalidShard,
        Self::ShardingRequired,
        Self::InvalidApiVersion,
        Self::InvalidIntents,
        Self::DisallowedIntents,
    ];

    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|code| code.as_u16() == value)
    }

    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Recovery for this code.
    ///
    /// Invalid sequence and session timeout lose the session; bad credentials, shard
    /// layout, API version and intents never succeed on retry.
    #[must_use]
    pub const fn disposition(self) -> CloseDisposition {
        match self {
            Self::InvalidSequence | Self::SessionTimedOut => CloseDisposition::Reidentify,
            Self::AuthenticationFailed
            | Self::InvalidShard
            | Self::ShardingRequired
            | Self::InvalidApiVersion
            | Self::InvalidIntents
            | Self::DisallowedIntents => CloseDisposition::Fatal,
            Self::UnknownError
            | Self::UnknownOpcode
            | Self::DecodeError
            | Self::NotAuthenticated
            | Self::AlreadyAuthenticated
            | Self::RateLimited => CloseDisposition::Resume,
        }
    }

    /// Recovery for any raw close code; codes outside the gateway's set resume
    #[must_use]
    pub fn classify(raw: u16) -> CloseDisposition {
        Self::from_u16(raw).map_or(CloseDisposition::Resume, Self::disposition)
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::UnknownError => "Unknown error",
            Self::UnknownOpcode => "Unknown opcode sent",
            Self::DecodeError => "Undecodable payload sent",
            Self::NotAuthenticated => "Payload sent before identifying",
            Self::AuthenticationFailed => "Authentication failed, check the token",
            Self::AlreadyAuthenticated => "Identify sent twice",
            Self::InvalidSequence => "Resume sequence rejected",
            Self::RateLimited => "Commands sent too fast",
            Self::SessionTimedOut => "Session timed out",
            Self::InvalidShard => "Shard id or count rejected",
            Self::ShardingRequired => "Too many guilds for the shard count",
            Self::InvalidApiVersion => "Gateway version rejected",
            Self::InvalidIntents => "Intents bitfield rejected",
            Self::DisallowedIntents => "Privileged intents not enabled for the application",
        }
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({self:?}): {}", self.as_u16(), self.description())
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        code.as_u16()
    }
}
