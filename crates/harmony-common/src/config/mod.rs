//! Configuration structs

mod client_config;

pub use client_config::{
    AppSettings, CacheSettings, ClientConfig, ConfigError, Environment, GatewaySettings,
    RestSettings,
};
