//! Harmony client entry point
//!
//! Run with:
//! ```bash
//! HARMONY_TOKEN=... cargo run -p harmony-client
//! ```
//!
//! Connects every shard, logs dispatches and shard transitions, and shuts down on Ctrl-C.

use async_trait::async_trait;
use harmony_client::gateway::{DispatchEvent, EventHandler, ShardState};
use harmony_client::Client;
use harmony_common::{try_init_tracing_with_config, ClientConfig, TracingConfig};
use tracing::{error, info};

/// Logs everything it sees
struct LogHandler;

#[async_trait]
impl EventHandler for LogHandler {
    async fn on_event(&self, shard_id: u32, event: &DispatchEvent) {
        info!(shard_id, event = %event.name, sequence = event.sequence, "Dispatch");
    }

    async fn on_shard_state(&self, shard_id: u32, state: ShardState) {
        info!(shard_id, state = %state, "Shard state");
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!(error = %e, "Client failed");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = ClientConfig::from_env()?;

    if let Err(e) = try_init_tracing_with_config(TracingConfig::for_app(&config.app)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    info!(env = ?config.app.env, intents = config.intents.bits(), "Configuration loaded");

    let client = Client::builder(config).handler(LogHandler).build()?;

    let outcome = tokio::select! {
        result = client.run() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupt received");
            Ok(())
        }
    };

    client.shutdown().await;
    for status in client.status() {
        info!(shard_id = status.id, state = %status.state, "Final shard state");
    }
    outcome.map_err(Into::into)
}
