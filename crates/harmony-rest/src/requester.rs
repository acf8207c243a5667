//! Rate-limited HTTP transport
//!
//! Every call goes through the bucket of its normalized route. The bucket lock is held
//! from the admission check until the response headers have been folded back in, so no
//! two calls on one bucket race past an exhausted limit.

use crate::config::RestConfig;
use crate::error::{ApiError, RestError, RestResult};
use crate::ratelimit::{Bucket, BucketRegistry, BucketState, GlobalLimiter, RateLimitHeaders, Route};
use crate::request::{Request, RestResponse};
use harmony_core::MonotonicClock;
use parking_lot::RwLock;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::MutexGuard;
use tokio_util::sync::CancellationToken;

/// Header carrying the audit-log reason of a moderation action
pub const AUDIT_LOG_REASON: &str = "x-audit-log-reason";

/// Fallback wait for a 429 that names no retry time
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Body of a 429 response
#[derive(Debug, Default, Deserialize)]
struct RateLimitedBody {
    #[serde(default)]
    retry_after: Option<f64>,
    #[serde(default)]
    global: bool,
}

/// Shared REST transport.
///
/// Owns the rate-limit state of one client instance. Cheap to share behind an `Arc`.
pub struct Requester {
    config: RestConfig,
    http: RwLock<Option<reqwest::Client>>,
    buckets: BucketRegistry,
    global: GlobalLimiter,
    cancel: CancellationToken,
    closed: AtomicBool,
}

impl Requester {
    /// Create a requester with its own lifetime token
    pub fn new(config: RestConfig) -> RestResult<Self> {
        Self::with_cancellation(config, CancellationToken::new())
    }

    /// Create a requester whose waits and retries stop when `cancel` fires
    pub fn with_cancellation(config: RestConfig, cancel: CancellationToken) -> RestResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            config,
            http: RwLock::new(Some(http)),
            buckets: BucketRegistry::new(),
            global: GlobalLimiter::new(),
            cancel,
            closed: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &RestConfig {
        &self.config
    }

    pub fn buckets(&self) -> &BucketRegistry {
        &self.buckets
    }

    pub fn global(&self) -> &GlobalLimiter {
        &self.global
    }

    /// Send a request, waiting out rate limits and retrying transient failures.
    ///
    /// 429 responses are absorbed. Network errors and 5xx responses are retried up to
    /// `max_retries` times before [`RestError::RetriesExhausted`]. Other non-success
    /// statuses return [`RestError::Api`] immediately.
    pub async fn send(&self, request: Request) -> RestResult<RestResponse> {
        let route = Route::new(&request.method, &request.path, MonotonicClock::unix_millis());
        let mut failures = 0_u32;

        loop {
            let bucket = self.buckets.bucket(&route);
            let mut state = self.admit(&route, &bucket).await?;

            let http = self.http()?;
            let outgoing = self.build(&http, &request)?;
            tracing::trace!(route = %route.key, "Sending request");

            let response = match self.cancellable(http.execute(outgoing)).await? {
                Ok(response) => response,
                Err(e) => {
                    drop(state);
                    failures += 1;
                    self.retry_after_failure(&route, failures, e.to_string()).await?;
                    continue;
                }
            };

            let now = MonotonicClock::now_millis();
            let status = response.status();
            let headers = RateLimitHeaders::parse(response.headers());
            state.update(&headers, now);
            if let Some(hash) = &headers.bucket {
                self.buckets.learn(&route, hash, &bucket);
            }

            let response_headers = response.headers().clone();
            let body = match self.cancellable(response.bytes()).await? {
                Ok(body) => body.to_vec(),
                Err(e) => {
                    drop(state);
                    failures += 1;
                    self.retry_after_failure(&route, failures, e.to_string()).await?;
                    continue;
                }
            };

            if status == StatusCode::TOO_MANY_REQUESTS {
                self.absorb_rate_limit(&route, &mut state, &headers, &body, now);
                continue;
            }
            drop(state);

            if is_retryable_status(status) {
                failures += 1;
                self.retry_after_failure(&route, failures, format!("HTTP {status}"))
                    .await?;
                continue;
            }

            if status.is_success() {
                return Ok(RestResponse {
                    status,
                    headers: response_headers,
                    body,
                });
            }

            let error = ApiError::from_body(status.as_u16(), &body);
            tracing::debug!(route = %route.key, status = status.as_u16(), code = error.code, "API error");
            return Err(RestError::Api(error));
        }
    }

    /// Send a request and decode its JSON body
    pub async fn request<T: DeserializeOwned>(&self, request: Request) -> RestResult<T> {
        self.send(request).await?.json()
    }

    /// Drop the HTTP client and its idle connections. Returns `false` if already closed.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        drop(self.http.write().take());
        tracing::info!("REST requester closed");
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Lock the bucket once neither it nor the global limiter is blocking
    async fn admit<'b>(
        &self,
        route: &Route,
        bucket: &'b Bucket,
    ) -> RestResult<MutexGuard<'b, BucketState>> {
        loop {
            let state = self.cancellable(bucket.lock()).await?;
            let now = MonotonicClock::now_millis();

            let blocked = state
                .blocked_until(now)
                .map(|until| (until, "bucket"))
                .or_else(|| self.global.blocked_until(now).map(|until| (until, "global")));

            let Some((until, limit)) = blocked else {
                return Ok(state);
            };
            drop(state);

            tracing::debug!(
                route = %route.key,
                limit,
                wait_ms = until.saturating_sub(now),
                "Rate limited, waiting for reset"
            );
            let resume = MonotonicClock::instant_at(until) + self.config.ratelimit_margin;
            self.sleep_until(resume).await?;
        }
    }

    fn absorb_rate_limit(
        &self,
        route: &Route,
        state: &mut BucketState,
        headers: &RateLimitHeaders,
        body: &[u8],
        now: u64,
    ) {
        let parsed: RateLimitedBody = serde_json::from_slice(body).unwrap_or_default();
        let retry_after = parsed
            .retry_after
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .or(headers.retry_after)
            .or(headers.reset_after)
            .unwrap_or(DEFAULT_RETRY_AFTER);
        let until = now.saturating_add(u64::try_from(retry_after.as_millis()).unwrap_or(u64::MAX));

        if parsed.global || headers.is_global() {
            let resume_at = self.global.raise(until);
            tracing::warn!(
                route = %route.key,
                retry_after_ms = retry_after.as_millis(),
                resume_in_ms = resume_at.saturating_sub(now),
                "Global rate limit hit"
            );
        } else {
            state.exhaust(until);
            tracing::warn!(
                route = %route.key,
                retry_after_ms = retry_after.as_millis(),
                "Route rate limit hit"
            );
        }
    }

    async fn retry_after_failure(&self, route: &Route, failures: u32, last: String) -> RestResult<()> {
        if failures > self.config.max_retries {
            tracing::error!(route = %route.key, attempts = failures, error = %last, "Retries exhausted");
            return Err(RestError::RetriesExhausted {
                attempts: failures,
                last,
            });
        }

        tracing::warn!(
            route = %route.key,
            attempt = failures,
            max_retries = self.config.max_retries,
            error = %last,
            "Request failed, retrying"
        );
        self.sleep_until(std::time::Instant::now() + self.config.retry_backoff)
            .await
    }

    fn http(&self) -> RestResult<reqwest::Client> {
        self.http.read().clone().ok_or(RestError::Closed)
    }

    fn build(&self, http: &reqwest::Client, request: &Request) -> RestResult<reqwest::Request> {
        let url = format!("{}{}", self.config.api_base_url, request.path);
        let mut builder = http.request(request.method.clone(), url);

        if request.needs_auth {
            let token = self
                .config
                .token
                .as_deref()
                .ok_or_else(|| RestError::InvalidRequest("bot token not configured".to_string()))?;
            builder = builder.header(AUTHORIZATION, header_value(&format!("Bot {token}"))?);
        }
        if let Some(reason) = &request.audit_reason {
            builder = builder.header(AUDIT_LOG_REASON, header_value(reason)?);
        }
        if request.is_write() {
            builder = builder.header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        if let Some(body) = &request.body {
            builder = builder.body(serde_json::to_vec(body)?);
        }

        Ok(builder.build()?)
    }

    async fn sleep_until(&self, deadline: std::time::Instant) -> RestResult<()> {
        self.cancellable(tokio::time::sleep_until(deadline.into()))
            .await
    }

    async fn cancellable<T>(&self, future: impl Future<Output = T>) -> RestResult<T> {
        tokio::select! {
            () = self.cancel.cancelled() => Err(RestError::Cancelled),
            output = future => Ok(output),
        }
    }
}

impl std::fmt::Debug for Requester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Requester")
            .field("api_base_url", &self.config.api_base_url)
            .field("buckets", &self.buckets.len())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

fn header_value(value: &str) -> RestResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| RestError::InvalidRequest(e.to_string()))
}

fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}
