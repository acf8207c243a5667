//! Rate-limit response headers

use reqwest::header::HeaderMap;
use std::time::Duration;

pub const LIMIT: &str = "x-ratelimit-limit";
pub const REMAINING: &str = "x-ratelimit-remaining";
pub const RESET_AFTER: &str = "x-ratelimit-reset-after";
pub const BUCKET: &str = "x-ratelimit-bucket";
pub const SCOPE: &str = "x-ratelimit-scope";
pub const GLOBAL: &str = "x-ratelimit-global";
pub const RETRY_AFTER: &str = "retry-after";

/// Scope of a 429 response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitScope {
    /// Per-route limit of this token
    User,
    /// Process-wide limit of this token
    Global,
    /// Per-resource limit shared with other tokens
    Shared,
}

impl RateLimitScope {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "global" => Some(Self::Global),
            "shared" => Some(Self::Shared),
            _ => None,
        }
    }
}

/// Parsed rate-limit headers of one response; absent or unparsable headers are `None`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateLimitHeaders {
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
    pub reset_after: Option<Duration>,
    pub bucket: Option<String>,
    pub scope: Option<RateLimitScope>,
    pub global: bool,
    pub retry_after: Option<Duration>,
}

impl RateLimitHeaders {
    #[must_use]
    pub fn parse(headers: &HeaderMap) -> Self {
        let text = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

        Self {
            limit: text(LIMIT).and_then(|v| v.parse().ok()),
            remaining: text(REMAINING).and_then(|v| v.parse().ok()),
            reset_after: text(RESET_AFTER).and_then(parse_seconds),
            bucket: text(BUCKET).map(str::to_string),
            scope: text(SCOPE).and_then(RateLimitScope::parse),
            global: text(GLOBAL).is_some_and(|v| v.eq_ignore_ascii_case("true")),
            retry_after: text(RETRY_AFTER).and_then(parse_seconds),
        }
    }

    /// Whether a 429 with these headers should stall every route
    #[must_use]
    pub fn is_global(&self) -> bool {
        self.global || matches!(self.scope, Some(RateLimitScope::Global | RateLimitScope::Shared))
    }
}

/// Parse fractional seconds (`"0.250"`); negative and non-finite values are rejected
#[must_use]
pub fn parse_seconds(value: &str) -> Option<Duration> {
    let seconds: f64 = value.trim().parse().ok()?;
    Duration::try_from_secs_f64(seconds).ok()
}
