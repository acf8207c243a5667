//! Subscriber installation for binaries
//!
//! Library crates only emit events. A binary calls [`try_init_tracing_with_config`] once with a [`TracingConfig`];
//! `RUST_LOG` overrides the preset filter when set.

use crate::config::{AppSettings, Environment};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Transport crates that are chatty at debug level
const QUIET_DEPENDENCIES: &str = "hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn,tungstenite=warn,tokio_tungstenite=warn";

/// Subscriber settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    /// Filter directives used when `RUST_LOG` is unset
    pub directives: String,
    /// One JSON object per line instead of human-readable output
    pub json: bool,
    /// Include the event target (module path)
    pub target: bool,
    pub file_line: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            directives: format!("info,{QUIET_DEPENDENCIES}"),
            json: false,
            target: true,
            file_line: false,
        }
    }
}

impl TracingConfig {
    /// Debug output for the client crates, with source locations
    #[must_use]
    pub fn development() -> Self {
        Self {
            directives: format!("debug,{QUIET_DEPENDENCIES}"),
            file_line: true,
            ..Self::default()
        }
    }

    /// JSON at info level
    #[must_use]
    pub fn production() -> Self {
        Self {
            json: true,
            ..Self::default()
        }
    }

    /// Preset for the application environment; `log_json` forces JSON output
    #[must_use]
    pub fn for_app(app: &AppSettings) -> Self {
        let mut config = match app.env {
            Environment::Production => Self::production(),
            Environment::Staging => Self::default(),
            Environment::Development => Self::development(),
        };
        config.json |= app.log_json;
        config
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.directives))
    }
}

/// Install the global subscriber with the default preset
pub fn try_init_tracing() -> Result<(), TracingError> {
    try_init_tracing_with_config(TracingConfig::default())
}

/// Install the global subscriber; fails if one is already installed
pub fn try_init_tracing_with_config(config: TracingConfig) -> Result<(), TracingError> {
    let layer = fmt::layer()
        .with_target(config.target)
        .with_file(config.file_line)
        .with_line_number(config.file_line);
    let registry = tracing_subscriber::registry().with(config.filter());

    let installed = if config.json {
        registry.with(layer.json()).try_init()
    } else {
        registry.with(layer).try_init()
    };
    installed.map_err(|_| TracingError::AlreadyInitialized)
}

/// Subscriber installation errors
#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("Tracing subscriber already initialized")]
    AlreadyInitialized,
}
