//! Client configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file when present).

use harmony_core::Intents;
use serde::Deserialize;
use std::env;
use std::str::FromStr;

/// Main client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub app: AppSettings,
    /// Bot token, sent as `Authorization: Bot <token>` and in Identify
    pub token: String,
    pub intents: Intents,
    pub rest: RestSettings,
    pub gateway: GatewaySettings,
    pub cache: CacheSettings,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
    /// Emit JSON-formatted logs
    #[serde(default)]
    pub log_json: bool,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" => Ok(Self::Production),
            "staging" => Ok(Self::Staging),
            "development" => Ok(Self::Development),
            other => Err(format!("unknown environment: {other}")),
        }
    }
}

/// REST transport settings
#[derive(Debug, Clone, Deserialize)]
pub struct RestSettings {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Client-side timeout of a single HTTP call, in seconds
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// Attempts after the first for network errors and retryable 5xx responses
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Extra wait added past every rate-limit reset
    #[serde(default = "default_ratelimit_margin_ms")]
    pub ratelimit_margin_ms: u64,
}

impl Default for RestSettings {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            http_timeout_secs: default_http_timeout_secs(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            ratelimit_margin_ms: default_ratelimit_margin_ms(),
        }
    }
}

/// Gateway and sharding settings
#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySettings {
    /// Overrides the URL returned by gateway discovery
    #[serde(default)]
    pub url: Option<String>,
    /// Overrides the recommended shard count
    #[serde(default)]
    pub shard_count: Option<u32>,
    /// Minimum spacing between handshakes in one concurrency bucket
    #[serde(default = "default_identify_spacing_ms")]
    pub identify_spacing_ms: u64,
    /// Member count above which the server stops sending offline members
    #[serde(default = "default_large_threshold")]
    pub large_threshold: u32,
    /// Request zlib-stream transport compression
    #[serde(default = "default_compress")]
    pub compress: bool,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            url: None,
            shard_count: None,
            identify_spacing_ms: default_identify_spacing_ms(),
            large_threshold: default_large_threshold(),
            compress: default_compress(),
        }
    }
}

/// Cache selection settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheSettings {
    /// Entity kinds to cache by name; `None` caches everything except messages
    #[serde(default)]
    pub kinds: Option<Vec<String>>,
}

// Default value functions
fn default_app_name() -> String {
    "harmony".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_api_base_url() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_http_timeout_secs() -> u64 {
    15
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1_000
}

fn default_ratelimit_margin_ms() -> u64 {
    50
}

fn default_identify_spacing_ms() -> u64 {
    5_000
}

fn default_large_threshold() -> u32 {
    250
}

fn default_compress() -> bool {
    true
}

impl ClientConfig {
    /// Configuration with every default filled in
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            app: AppSettings {
                name: default_app_name(),
                env: default_env(),
                log_json: false,
            },
            token: token.into(),
            intents: Intents::default(),
            rest: RestSettings::default(),
            gateway: GatewaySettings::default(),
            cache: CacheSettings::default(),
        }
    }

    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if `HARMONY_TOKEN` is missing or a variable cannot be parsed
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup("HARMONY_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingVar("HARMONY_TOKEN"))?;

        let intents = match lookup("HARMONY_INTENTS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Intents::from_bits_truncate)
                .map_err(|_| ConfigError::InvalidValue("HARMONY_INTENTS", raw))?,
            None => Intents::default(),
        };

        Ok(Self {
            app: AppSettings {
                name: lookup("APP_NAME").unwrap_or_else(default_app_name),
                env: parse_or(&lookup, "APP_ENV", default_env)?,
                log_json: parse_or(&lookup, "HARMONY_LOG_JSON", || false)?,
            },
            token,
            intents,
            rest: RestSettings {
                api_base_url: lookup("HARMONY_API_BASE_URL")
                    .map(|url| url.trim_end_matches('/').to_string())
                    .unwrap_or_else(default_api_base_url),
                http_timeout_secs: parse_or(
                    &lookup,
                    "HARMONY_HTTP_TIMEOUT_SECS",
                    default_http_timeout_secs,
                )?,
                max_retries: parse_or(&lookup, "HARMONY_REST_MAX_RETRIES", default_max_retries)?,
                retry_backoff_ms: parse_or(
                    &lookup,
                    "HARMONY_REST_RETRY_BACKOFF_MS",
                    default_retry_backoff_ms,
                )?,
                ratelimit_margin_ms: parse_or(
                    &lookup,
                    "HARMONY_RATELIMIT_MARGIN_MS",
                    default_ratelimit_margin_ms,
                )?,
            },
            gateway: GatewaySettings {
                url: lookup("HARMONY_GATEWAY_URL"),
                shard_count: lookup("HARMONY_SHARD_COUNT")
                    .map(|raw| {
                        raw.trim()
                            .parse::<u32>()
                            .ok()
                            .filter(|n| *n > 0)
                            .ok_or(ConfigError::InvalidValue("HARMONY_SHARD_COUNT", raw))
                    })
                    .transpose()?,
                identify_spacing_ms: parse_or(
                    &lookup,
                    "HARMONY_IDENTIFY_SPACING_MS",
                    default_identify_spacing_ms,
                )?,
                large_threshold: parse_or(
                    &lookup,
                    "HARMONY_LARGE_THRESHOLD",
                    default_large_threshold,
                )?,
                compress: parse_or(&lookup, "HARMONY_COMPRESS", default_compress)?,
            },
            cache: CacheSettings {
                kinds: lookup("HARMONY_CACHE").map(|s| {
                    s.split(',')
                        .map(str::trim)
                        .filter(|k| !k.is_empty())
                        .map(String::from)
                        .collect()
                }),
            },
        })
    }
}

/// Parse an optional variable, falling back to a default when unset
fn parse_or<F, T, D>(lookup: &F, key: &'static str, default: D) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    D: FnOnce() -> T,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key, raw)),
        None => Ok(default()),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
