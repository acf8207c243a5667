//! Value objects - immutable types that represent platform concepts

mod intents;
mod snowflake;

pub use intents::Intents;
pub use snowflake::{Snowflake, SnowflakeParseError, SnowflakeParts};
