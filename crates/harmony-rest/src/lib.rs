//! # harmony-rest
//!
//! Rate-limited REST transport.
//!
//! ## Features
//!
//! - **Route Buckets**: Per-route accounting keyed by normalized path and major parameter
//! - **Global Limiter**: One never-regressing resume point shared by every route
//! - **Retries**: Bounded fixed-backoff retries for network errors and 5xx responses
//! - **Cancellation**: Every wait stops when the client lifetime token fires
//!
//! ## Example
//!
//! ```ignore
//! use harmony_rest::{Request, Requester, RestConfig};
//!
//! let requester = Requester::new(RestConfig::from(&config))?;
//!
//! let gateway = requester.gateway_bot().await?;
//! let message: serde_json::Value = requester
//!     .request(Request::post(format!("/channels/{channel_id}/messages")).json(&body)?)
//!     .await?;
//! ```

pub mod config;
pub mod error;
pub mod gateway;
pub mod ratelimit;
pub mod request;
pub mod requester;

pub use config::RestConfig;
pub use error::{ApiError, RestError, RestResult};
pub use gateway::{GatewayBot, GatewayInfo, SessionStartLimit};
pub use ratelimit::{GlobalLimiter, RateLimitHeaders, Route};
pub use request::{Request, RestResponse};
pub use requester::Requester;

// Re-exported so callers can name methods without depending on reqwest
pub use reqwest::Method;
