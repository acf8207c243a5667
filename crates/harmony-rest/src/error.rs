//! REST error types

use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Structured error returned by the API for non-retryable 4xx responses
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiError {
    /// HTTP status code
    #[serde(skip)]
    pub status: u16,
    /// Numeric API error code (0 when the body carried none)
    #[serde(default)]
    pub code: u64,
    #[serde(default)]
    pub message: String,
    /// Nested per-field validation errors
    #[serde(default)]
    pub errors: Option<Value>,
}

impl ApiError {
    /// Build from a response status and raw body; falls back to the body text as message
    #[must_use]
    pub fn from_body(status: u16, body: &[u8]) -> Self {
        match serde_json::from_slice::<Self>(body) {
            Ok(mut error) => {
                error.status = status;
                error
            }
            Err(_) => Self {
                status,
                code: 0,
                message: String::from_utf8_lossy(body).into_owned(),
                errors: None,
            },
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (status {}, code {})", self.message, self.status, self.code)
    }
}

/// REST transport errors
#[derive(Debug, Error)]
pub enum RestError {
    /// The API rejected the request
    #[error("API error: {0}")]
    Api(ApiError),

    /// Network failures or 5xx responses outlasted the retry budget
    #[error("Retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    /// The client lifetime was cancelled while waiting or retrying
    #[error("Request cancelled")]
    Cancelled,

    /// The requester has been closed
    #[error("Requester closed")]
    Closed,

    /// The request could not be built (bad header value, unserializable body)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// HTTP client construction failed
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    /// Response body did not match the expected shape
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl RestError {
    /// Status of an API error, if this is one
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api(error) => Some(error.status),
            _ => None,
        }
    }
}

/// REST result type
pub type RestResult<T> = Result<T, RestError>;
