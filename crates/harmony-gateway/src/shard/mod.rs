//! Shard sessions
//!
//! A shard is one gateway session. [`ShardMachine`] holds its state and decides every
//! transition; [`ShardRunner`] carries the decisions out on a real socket; [`ShardHandle`]
//! is what callers keep to send commands and watch status.

mod config;
mod connection;
mod handle;
mod heartbeat;
mod machine;
mod runner;
mod state;

pub use config::{ShardConfig, GATEWAY_VERSION};
pub use handle::{ShardHandle, COMMAND_BUFFER};
pub use heartbeat::{Beat, HeartbeatMonitor, MAX_MISSED_ACKS};
pub use machine::{
    ReconnectPolicy, Session, ShardAction, ShardEvent, ShardMachine, NORMAL_CLOSE, RESUMABLE_CLOSE,
};
pub use runner::{ShardContext, ShardRunner};
pub use state::{ShardState, ShardStatus};
