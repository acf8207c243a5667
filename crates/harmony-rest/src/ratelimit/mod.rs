//! Rate-limit accounting: route normalization, buckets and the global limiter

pub mod bucket;
pub mod global;
pub mod headers;
pub mod route;

pub use bucket::{Bucket, BucketRegistry, BucketState};
pub use global::GlobalLimiter;
pub use headers::{RateLimitHeaders, RateLimitScope};
pub use route::{Route, OLD_MESSAGE_CUTOFF_MS};
