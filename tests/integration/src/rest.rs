//! Fake REST API
//!
//! Every request is recorded and answered by a scripted responder that sees the request
//! and its zero-based index.

use crate::helpers::serve;
use anyhow::Result;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

/// One request as the server received it
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Option<Value>,
    pub at: Instant,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Scripted reply
#[derive(Debug, Clone)]
pub struct FakeResponse {
    pub status: StatusCode,
    pub headers: Vec<(&'static str, String)>,
    pub body: Value,
}

impl FakeResponse {
    pub fn ok(body: Value) -> Self {
        Self::status(StatusCode::OK, body)
    }

    pub fn status(status: StatusCode, body: Value) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body,
        }
    }

    pub fn header(mut self, name: &'static str, value: impl ToString) -> Self {
        self.headers.push((name, value.to_string()));
        self
    }

    /// Bucket headers for `remaining` calls left, resetting after `reset_after` seconds
    pub fn bucket(self, hash: &str, remaining: u32, reset_after: f64) -> Self {
        self.header("x-ratelimit-bucket", hash)
            .header("x-ratelimit-limit", 5)
            .header("x-ratelimit-remaining", remaining)
            .header("x-ratelimit-reset-after", format!("{reset_after:.3}"))
    }
}

type Responder = dyn Fn(&RecordedRequest, usize) -> FakeResponse + Send + Sync;

struct Shared {
    responder: Box<Responder>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// In-process REST API answering every path through one responder
pub struct FakeRestServer {
    base_url: String,
    shared: Arc<Shared>,
}

impl FakeRestServer {
    pub async fn start(
        responder: impl Fn(&RecordedRequest, usize) -> FakeResponse + Send + Sync + 'static,
    ) -> Result<Self> {
        let shared = Arc::new(Shared {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        });
        let app = Router::new()
            .fallback(handle)
            .with_state(Arc::clone(&shared));
        let addr = serve(app).await?;

        Ok(Self {
            base_url: format!("http://{addr}/api/v10"),
            shared,
        })
    }

    /// Versioned base URL to configure the requester with
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.shared.requests.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.shared.requests.lock().len()
    }
}

async fn handle(
    State(shared): State<Arc<Shared>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri
        .path_and_query()
        .map_or_else(|| uri.path().to_string(), ToString::to_string);
    let request = RecordedRequest {
        method,
        path: path.trim_start_matches("/api/v10").to_string(),
        headers,
        body: serde_json::from_slice(&body).ok(),
        at: Instant::now(),
    };

    let index = {
        let mut requests = shared.requests.lock();
        requests.push(request.clone());
        requests.len() - 1
    };
    let reply = (shared.responder)(&request, index);

    let mut response = (reply.status, Json(reply.body)).into_response();
    for (name, value) in reply.headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            response.headers_mut().insert(name, value);
        }
    }
    response
}
