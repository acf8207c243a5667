//! Requester configuration

use harmony_common::ClientConfig;
use std::time::Duration;

/// Library version sent in the user agent
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Project URL sent in the user agent
pub const PROJECT_URL: &str = "https://github.com/harmony-rs/harmony";

/// Settings for a [`Requester`](crate::Requester)
#[derive(Debug, Clone)]
pub struct RestConfig {
    /// Versioned base URL, without a trailing slash
    pub api_base_url: String,
    /// Bot token; requests needing auth fail fast when absent
    pub token: Option<String>,
    pub user_agent: String,
    /// Client-side timeout of one HTTP call, separate from rate-limit waits
    pub timeout: Duration,
    /// Retries after the first attempt for network errors and 5xx responses
    pub max_retries: u32,
    /// Fixed delay between those retries
    pub retry_backoff: Duration,
    /// Extra wait past every rate-limit reset
    pub ratelimit_margin: Duration,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://discord.com/api/v10".to_string(),
            token: None,
            user_agent: default_user_agent(),
            timeout: Duration::from_secs(15),
            max_retries: 3,
            retry_backoff: Duration::from_secs(1),
            ratelimit_margin: Duration::from_millis(50),
        }
    }
}

impl From<&ClientConfig> for RestConfig {
    fn from(config: &ClientConfig) -> Self {
        let rest = &config.rest;
        Self {
            api_base_url: rest.api_base_url.trim_end_matches('/').to_string(),
            token: Some(config.token.clone()),
            user_agent: default_user_agent(),
            timeout: Duration::from_secs(rest.http_timeout_secs),
            max_retries: rest.max_retries,
            retry_backoff: Duration::from_millis(rest.retry_backoff_ms),
            ratelimit_margin: Duration::from_millis(rest.ratelimit_margin_ms),
        }
    }
}

fn default_user_agent() -> String {
    format!("DiscordBot ({PROJECT_URL}, {VERSION})")
}
