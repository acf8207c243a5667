//! Snowflake ID - the platform's 64-bit time-ordered identifier
//!
//! Structure:
//! - Bits 63-22: Timestamp (milliseconds since [`Snowflake::EPOCH`])
//! - Bits 21-17: Worker ID (0-31)
//! - Bits 16-12: Process ID (0-31)
//! - Bits 11-0:  Sequence number (0-4095)

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

const TIMESTAMP_SHIFT: u32 = 22;
const WORKER_SHIFT: u32 = 17;
const PROCESS_SHIFT: u32 = 12;
const WORKER_MASK: u64 = 0x1F;
const PROCESS_MASK: u64 = 0x1F;
const SEQUENCE_MASK: u64 = 0xFFF;

/// Platform Snowflake ID (64-bit, unsigned)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Snowflake(u64);

/// Decoded components of a [`Snowflake`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SnowflakeParts {
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
    /// Internal worker that generated the id (0-31)
    pub worker_id: u8,
    /// Internal process that generated the id (0-31)
    pub process_id: u8,
    /// Per-process increment (0-4095)
    pub sequence: u16,
}

impl Snowflake {
    /// Platform epoch: 2015-01-01 00:00:00 UTC (milliseconds)
    pub const EPOCH: u64 = 1_420_070_400_000;

    /// Create a new Snowflake from a raw u64 value
    #[inline]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the inner u64 value
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Check if the Snowflake is zero (uninitialized)
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Build an id from its components.
    ///
    /// Out-of-range worker, process and sequence values are masked to their field width.
    /// Timestamps earlier than [`Snowflake::EPOCH`] saturate to the epoch.
    #[must_use]
    pub const fn from_parts(parts: SnowflakeParts) -> Self {
        let ms = parts.timestamp.saturating_sub(Self::EPOCH);
        Self(
            (ms << TIMESTAMP_SHIFT)
                | ((parts.worker_id as u64 & WORKER_MASK) << WORKER_SHIFT)
                | ((parts.process_id as u64 & PROCESS_MASK) << PROCESS_SHIFT)
                | (parts.sequence as u64 & SEQUENCE_MASK),
        )
    }

    /// Smallest id that could have been generated at `unix_millis`.
    ///
    /// Comparing an id against this bound tells whether it was created before that moment.
    #[must_use]
    pub const fn from_timestamp(unix_millis: u64) -> Self {
        Self::from_parts(SnowflakeParts {
            timestamp: unix_millis,
            worker_id: 0,
            process_id: 0,
            sequence: 0,
        })
    }

    /// Decode all components in one pass
    #[inline]
    #[must_use]
    pub const fn decode(self) -> SnowflakeParts {
        SnowflakeParts {
            timestamp: self.timestamp(),
            worker_id: self.worker_id(),
            process_id: self.process_id(),
            sequence: self.sequence(),
        }
    }

    /// Extract timestamp (milliseconds since Unix epoch)
    #[inline]
    pub const fn timestamp(self) -> u64 {
        (self.0 >> TIMESTAMP_SHIFT) + Self::EPOCH
    }

    /// Extract worker ID (0-31)
    #[inline]
    pub const fn worker_id(self) -> u8 {
        ((self.0 >> WORKER_SHIFT) & WORKER_MASK) as u8
    }

    /// Extract process ID (0-31)
    #[inline]
    pub const fn process_id(self) -> u8 {
        ((self.0 >> PROCESS_SHIFT) & PROCESS_MASK) as u8
    }

    /// Extract sequence number (0-4095)
    #[inline]
    pub const fn sequence(self) -> u16 {
        (self.0 & SEQUENCE_MASK) as u16
    }

    /// Convert timestamp to DateTime<Utc>
    pub fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
        chrono::DateTime::from_timestamp_millis(self.timestamp() as i64).unwrap_or_default()
    }

    /// Parse from a decimal string.
    ///
    /// Anything other than one or more ASCII digits fitting in 64 bits is rejected.
    pub fn parse(s: &str) -> Result<Self, SnowflakeParseError> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(SnowflakeParseError::InvalidFormat);
        }
        s.parse::<u64>()
            .map(Snowflake)
            .map_err(|_| SnowflakeParseError::InvalidFormat)
    }

    /// Parse a decimal string that is already known to be well formed.
    ///
    /// Skips validation. Malformed input produces an unspecified id but never panics:
    /// every byte is folded in with wrapping arithmetic.
    #[inline]
    #[must_use]
    pub fn parse_trusted(s: &str) -> Self {
        let id = s.bytes().fold(0u64, |acc, b| {
            acc.wrapping_mul(10)
                .wrapping_add(u64::from(b.wrapping_sub(b'0')))
        });
        Self(id)
    }
}

/// Error when parsing a Snowflake from string
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SnowflakeParseError {
    #[error("invalid snowflake format")]
    InvalidFormat,
}

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Snowflake {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<Snowflake> for u64 {
    fn from(id: Snowflake) -> Self {
        id.0
    }
}

impl std::str::FromStr for Snowflake {
    type Err = SnowflakeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Snowflake::parse(s)
    }
}

// Serialize as string for JSON (JavaScript BigInt safety)
impl Serialize for Snowflake {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&self.0)
    }
}

// Deserialize from string or number
impl<'de> Deserialize<'de> for Snowflake {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::{self, Visitor};

        struct SnowflakeVisitor;

        impl Visitor<'_> for SnowflakeVisitor {
            type Value = Snowflake;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a string or integer representing a snowflake ID")
            }

            fn visit_i64<E>(self, value: i64) -> Result<Snowflake, E>
            where
                E: de::Error,
            {
                u64::try_from(value)
                    .map(Snowflake)
                    .map_err(|_| de::Error::custom("negative snowflake"))
            }

            fn visit_u64<E>(self, value: u64) -> Result<Snowflake, E>
            where
                E: de::Error,
            {
                Ok(Snowflake(value))
            }

            fn visit_str<E>(self, value: &str) -> Result<Snowflake, E>
            where
                E: de::Error,
            {
                Snowflake::parse(value).map_err(|_| de::Error::custom("invalid snowflake string"))
            }
        }

        deserializer.deserialize_any(SnowflakeVisitor)
    }
}
