//! REST transport tests against the fake API
//!
//! Run with: cargo test -p integration-tests --test rest_tests

use harmony_rest::{Request, RestConfig, RestError, Requester};
use integration_tests::{within, FakeResponse, FakeRestServer};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn requester(server: &FakeRestServer) -> Requester {
    Requester::new(RestConfig {
        api_base_url: server.base_url().to_string(),
        token: Some("test-token".to_string()),
        max_retries: 2,
        retry_backoff: Duration::from_millis(20),
        ratelimit_margin: Duration::ZERO,
        ..RestConfig::default()
    })
    .unwrap()
}

// ============================================================================
// Buckets
// ============================================================================

#[tokio::test]
async fn test_exhausted_bucket_delays_next_call() {
    let server = FakeRestServer::start(|_, _| {
        FakeResponse::ok(json!({"id": "1"})).bucket("abc123", 0, 0.2)
    })
    .await
    .unwrap();
    let requester = requester(&server);

    for n in 1..=3 {
        requester
            .send(Request::get("/channels/1").reason(format!("call {n}")))
            .await
            .unwrap();
    }

    let requests = server.requests();
    assert_eq!(requests.len(), 3);
    for (n, request) in requests.iter().enumerate() {
        assert_eq!(request.path, "/channels/1");
        let expected = format!("call {}", n + 1);
        assert_eq!(request.header("x-audit-log-reason"), Some(expected.as_str()));
    }
    for pair in requests.windows(2) {
        let gap = pair[1].at.duration_since(pair[0].at);
        assert!(gap >= Duration::from_millis(190), "call went out after {gap:?}");
    }
}

#[tokio::test]
async fn test_other_major_parameter_is_not_delayed() {
    let server = FakeRestServer::start(|_, _| {
        FakeResponse::ok(json!({})).bucket("abc123", 0, 1.0)
    })
    .await
    .unwrap();
    let requester = requester(&server);

    requester.send(Request::get("/channels/1")).await.unwrap();
    let started = std::time::Instant::now();
    requester.send(Request::get("/channels/2")).await.unwrap();
    assert!(started.elapsed() < Duration::from_millis(500));
}

#[tokio::test]
async fn test_concurrent_calls_on_one_bucket_serialize() {
    let server = FakeRestServer::start(|_, index| {
        // One call per window
        FakeResponse::ok(json!({ "n": index })).bucket("msg", 0, 0.15)
    })
    .await
    .unwrap();
    let requester = Arc::new(requester(&server));

    let calls: Vec<_> = (0..3)
        .map(|_| {
            let requester = Arc::clone(&requester);
            tokio::spawn(async move {
                requester
                    .send(Request::post("/channels/7/messages").json(&json!({"content": "x"})).unwrap())
                    .await
            })
        })
        .collect();
    for call in calls {
        within(call).await.unwrap().unwrap().unwrap();
    }

    let mut times: Vec<_> = server.requests().iter().map(|r| r.at).collect();
    times.sort();
    for pair in times.windows(2) {
        assert!(pair[1].duration_since(pair[0]) >= Duration::from_millis(140));
    }
}

// ============================================================================
// 429 handling
// ============================================================================

#[tokio::test]
async fn test_route_429_is_absorbed() {
    let server = FakeRestServer::start(|_, index| {
        if index == 0 {
            FakeResponse::status(
                axum::http::StatusCode::TOO_MANY_REQUESTS,
                json!({"message": "You are being rate limited.", "retry_after": 0.1, "global": false}),
            )
            .header("x-ratelimit-scope", "user")
        } else {
            FakeResponse::ok(json!({"id": "42"}))
        }
    })
    .await
    .unwrap();
    let requester = requester(&server);

    let user: Value = requester.request(Request::get("/users/42")).await.unwrap();
    assert_eq!(user["id"], "42");

    let requests = server.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[1].at.duration_since(requests[0].at) >= Duration::from_millis(90));
}

#[tokio::test]
async fn test_global_429_stalls_every_route() {
    let server = FakeRestServer::start(|request, index| {
        if index == 0 {
            FakeResponse::status(
                axum::http::StatusCode::TOO_MANY_REQUESTS,
                json!({"message": "You are being rate limited.", "retry_after": 0.3, "global": true}),
            )
            .header("x-ratelimit-global", "true")
        } else {
            FakeResponse::ok(json!({ "path": request.path }))
        }
    })
    .await
    .unwrap();
    let requester = Arc::new(requester(&server));

    let first = {
        let requester = Arc::clone(&requester);
        tokio::spawn(async move { requester.send(Request::get("/users/1")).await })
    };
    // Give the first call time to hit the global limit
    tokio::time::sleep(Duration::from_millis(50)).await;
    requester.send(Request::get("/guilds/9")).await.unwrap();
    within(first).await.unwrap().unwrap().unwrap();

    let requests = server.requests();
    assert_eq!(requests.len(), 3);
    for later in &requests[1..] {
        assert!(later.at.duration_since(requests[0].at) >= Duration::from_millis(290));
    }
}

// ============================================================================
// Retries and errors
// ============================================================================

#[tokio::test]
async fn test_5xx_is_retried() {
    let server = FakeRestServer::start(|_, index| {
        if index < 2 {
            FakeResponse::status(axum::http::StatusCode::BAD_GATEWAY, json!({}))
        } else {
            FakeResponse::ok(json!({"ok": true}))
        }
    })
    .await
    .unwrap();
    let requester = requester(&server);

    let body: Value = requester.request(Request::get("/gateway/bot")).await.unwrap();
    assert_eq!(body["ok"], true);
    assert_eq!(server.count(), 3);
}

#[tokio::test]
async fn test_5xx_retries_exhaust() {
    let server = FakeRestServer::start(|_, _| {
        FakeResponse::status(axum::http::StatusCode::SERVICE_UNAVAILABLE, json!({}))
    })
    .await
    .unwrap();
    let requester = requester(&server);

    let result = requester.send(Request::get("/users/@me")).await;
    match result {
        Err(RestError::RetriesExhausted { attempts, .. }) => assert_eq!(attempts, 3),
        other => panic!("expected exhausted retries, got {other:?}"),
    }
    assert_eq!(server.count(), 3);
}

#[tokio::test]
async fn test_4xx_returns_api_error() {
    let server = FakeRestServer::start(|_, _| {
        FakeResponse::status(
            axum::http::StatusCode::NOT_FOUND,
            json!({"code": 10003, "message": "Unknown Channel"}),
        )
    })
    .await
    .unwrap();
    let requester = requester(&server);

    match requester.send(Request::get("/channels/5")).await {
        Err(RestError::Api(error)) => {
            assert_eq!(error.status, 404);
            assert_eq!(error.code, 10003);
            assert_eq!(error.message, "Unknown Channel");
        }
        other => panic!("expected API error, got {other:?}"),
    }
    assert_eq!(server.count(), 1);
}

#[tokio::test]
async fn test_request_headers() {
    let server = FakeRestServer::start(|_, _| FakeResponse::ok(json!({}))).await.unwrap();
    let requester = requester(&server);

    requester
        .send(
            Request::patch("/guilds/3/members/4")
                .json(&json!({"nick": "n"}))
                .unwrap()
                .reason("rename"),
        )
        .await
        .unwrap();
    requester
        .send(Request::get("/gateway").without_auth())
        .await
        .unwrap();

    let requests = server.requests();
    assert_eq!(requests[0].path, "/guilds/3/members/4");
    assert_eq!(requests[0].header("authorization"), Some("Bot test-token"));
    assert_eq!(requests[0].header("x-audit-log-reason"), Some("rename"));
    assert_eq!(requests[0].header("content-type"), Some("application/json"));
    assert!(requests[0]
        .header("user-agent")
        .is_some_and(|ua| ua.starts_with("DiscordBot (")));
    assert_eq!(requests[0].body, Some(json!({"nick": "n"})));
    assert_eq!(requests[1].header("authorization"), None);
}

#[tokio::test]
async fn test_cancel_stops_rate_limit_wait() {
    let server = FakeRestServer::start(|_, _| {
        FakeResponse::ok(json!({})).bucket("slow", 0, 30.0)
    })
    .await
    .unwrap();
    let cancel = CancellationToken::new();
    let requester = Arc::new(
        Requester::with_cancellation(
            RestConfig {
                api_base_url: server.base_url().to_string(),
                token: Some("test-token".to_string()),
                ..RestConfig::default()
            },
            cancel.clone(),
        )
        .unwrap(),
    );

    requester.send(Request::get("/channels/1")).await.unwrap();
    let waiting = {
        let requester = Arc::clone(&requester);
        tokio::spawn(async move { requester.send(Request::get("/channels/1")).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    assert!(matches!(
        within(waiting).await.unwrap().unwrap(),
        Err(RestError::Cancelled)
    ));
    assert_eq!(server.count(), 1);
}

#[tokio::test]
async fn test_gateway_bot_discovery() {
    let server = FakeRestServer::start(|_, _| {
        FakeResponse::ok(json!({
            "url": "wss://gateway.example",
            "shards": 4,
            "session_start_limit": {
                "total": 1000, "remaining": 990, "reset_after": 60_000, "max_concurrency": 2
            }
        }))
    })
    .await
    .unwrap();
    let requester = requester(&server);

    let bot = requester.gateway_bot().await.unwrap();
    assert_eq!(bot.url, "wss://gateway.example");
    assert_eq!(bot.shards, 4);
    assert_eq!(bot.session_start_limit.max_concurrency, 2);
    assert_eq!(server.requests()[0].path, "/gateway/bot");
}
