//! # harmony-core
//!
//! Value types shared by every layer of the client: snowflake identifiers, gateway
//! intents and the process-wide monotonic clock. This crate performs no I/O.

pub mod clock;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use clock::MonotonicClock;
pub use value_objects::{Intents, Snowflake, SnowflakeParseError, SnowflakeParts};
