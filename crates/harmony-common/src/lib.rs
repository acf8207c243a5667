//! # harmony-common
//!
//! Shared utilities: environment-driven configuration and tracing setup.
//! Library crates only emit `tracing` events; installing a subscriber is left to binaries.

pub mod config;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use config::{
    AppSettings, CacheSettings, ClientConfig, ConfigError, Environment, GatewaySettings,
    RestSettings,
};
pub use telemetry::{try_init_tracing, try_init_tracing_with_config, TracingConfig, TracingError};
