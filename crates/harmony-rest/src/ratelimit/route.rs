//! Route normalization into rate-limit bucket keys
//!
//! Identifier-shaped path segments collapse to `:id` except the first id following a
//! major resource (`guilds`, `channels`, `webhooks`), which stays verbatim because the
//! server tracks those limits per resource. Reaction emoji and webhook/interaction tokens
//! collapse to fixed placeholders. Deleting a message older than [`OLD_MESSAGE_CUTOFF_MS`]
//! lands in its own bucket.

use harmony_core::Snowflake;
use reqwest::Method;

/// Age past which message deletes are rate limited separately (14 days)
pub const OLD_MESSAGE_CUTOFF_MS: u64 = 14 * 24 * 60 * 60 * 1000;

const MAJOR_RESOURCES: [&str; 3] = ["guilds", "channels", "webhooks"];

/// A normalized route
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route {
    /// `METHOD /normalized/path`, the bucket key used until the server names the bucket
    pub key: String,
    /// The major parameter kept verbatim in the key, if any
    pub major: Option<String>,
}

impl Route {
    /// Normalize `path` for `method`. `now_unix_ms` decides the old-message cutoff.
    #[must_use]
    pub fn new(method: &Method, path: &str, now_unix_ms: u64) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        let mut normalized = Vec::with_capacity(segments.len());
        let mut major = None;

        for (index, segment) in segments.iter().enumerate() {
            let previous = index.checked_sub(1).map(|i| segments[i]);
            let two_back = index.checked_sub(2).map(|i| segments[i]);

            let replaced = if previous == Some("reactions") {
                ":reaction".to_string()
            } else if is_id(segment) {
                match previous {
                    Some(resource) if major.is_none() && MAJOR_RESOURCES.contains(&resource) => {
                        major = Some((*segment).to_string());
                        (*segment).to_string()
                    }
                    _ => ":id".to_string(),
                }
            } else if matches!(two_back, Some("webhooks" | "interactions")) {
                ":token".to_string()
            } else {
                (*segment).to_string()
            };
            normalized.push(replaced);
        }

        let mut key = format!("{method} /{}", normalized.join("/"));
        if *method == Method::DELETE && is_old_message(&segments, now_unix_ms) {
            key.push_str("/old");
        }

        Self { key, major }
    }

    /// Key for a bucket the server identified by hash
    #[must_use]
    pub fn hashed_key(&self, hash: &str) -> String {
        match &self.major {
            Some(major) => format!("{hash}:{major}"),
            None => hash.to_string(),
        }
    }
}

fn is_id(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

/// `channels/{id}/messages/{id}` whose message id predates the cutoff
fn is_old_message(segments: &[&str], now_unix_ms: u64) -> bool {
    let [.., "channels", _, "messages", message_id] = segments else {
        return false;
    };
    let Ok(id) = Snowflake::parse(message_id) else {
        return false;
    };
    let cutoff = Snowflake::from_timestamp(now_unix_ms.saturating_sub(OLD_MESSAGE_CUTOFF_MS));
    id < cutoff
}
