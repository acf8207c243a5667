//! Client facade tests against both fakes
//!
//! Run with: cargo test -p integration-tests --test client_tests

use harmony_client::gateway::{ShardError, ShardState};
use harmony_client::{Client, ClientError, Snowflake};
use integration_tests::{
    test_config, wait_until, within, ConnectionPlan, FakeGateway, FakeResponse, FakeRestServer,
    RecordingHandler,
};
use serde_json::json;
use std::time::{Duration, Instant};

async fn api(gateway_url: String, remaining: u32, reset_after: u64) -> FakeRestServer {
    FakeRestServer::start(move |request, _| match request.path.as_str() {
        "/gateway/bot" => FakeResponse::ok(json!({
            "url": gateway_url,
            "shards": 2,
            "session_start_limit": {
                "total": 1000,
                "remaining": remaining,
                "reset_after": reset_after,
                "max_concurrency": 1
            }
        })),
        "/users/42" => FakeResponse::ok(json!({"id": "42", "username": "someone"})),
        _ => FakeResponse::status(
            axum::http::StatusCode::NOT_FOUND,
            json!({"code": 0, "message": "404: Not Found"}),
        ),
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn test_client_connects_every_shard() {
    let gateway = FakeGateway::start(vec![ConnectionPlan::default()]).await.unwrap();
    let rest = api(gateway.url().to_string(), 1000, 0).await;
    let handler = RecordingHandler::new();
    let client = Client::builder(test_config(rest.base_url()))
        .handler(handler.clone())
        .build()
        .unwrap();

    within(client.start()).await.unwrap().unwrap();
    assert_eq!(client.shard_count(), 2);
    wait_until(|| {
        let status = client.status();
        status.len() == 2 && status.iter().all(|s| s.state == ShardState::Connected)
    })
    .await
    .unwrap();

    // Both shards identified, compressed, with their own shard pair
    let identifies = gateway.received_op(harmony_client::gateway::OpCode::Identify);
    assert_eq!(identifies.len(), 2);
    assert!(identifies.iter().all(|r| r.compressed));
    let mut pairs: Vec<_> = identifies
        .iter()
        .map(|r| r.message.d.as_ref().unwrap()["shard"].clone())
        .collect();
    pairs.sort_by_key(ToString::to_string);
    assert_eq!(pairs, [json!([0, 2]), json!([1, 2])]);

    let guild = Snowflake::new(81_384_788_765_712_384);
    assert_eq!(client.guild_shard(guild).unwrap().id(), client.shard_for_guild(guild));
    assert!(matches!(client.start().await, Err(ClientError::AlreadyStarted)));

    within(client.shutdown()).await.unwrap();
    within(client.shutdown()).await.unwrap();
    assert!(client.requester().is_closed());
    assert!(client.status().iter().all(|s| s.state == ShardState::Closed));
    assert_eq!(handler.events(), ["READY", "READY"]);
}

#[tokio::test]
async fn test_run_returns_fatal_close() {
    let gateway = FakeGateway::start(vec![ConnectionPlan::default().close(4014)])
        .await
        .unwrap();
    let rest = api(gateway.url().to_string(), 1000, 0).await;
    let mut config = test_config(rest.base_url());
    config.gateway.shard_count = Some(1);
    let client = Client::builder(config).build().unwrap();

    let result = within(client.run()).await.unwrap();
    match result {
        Err(ClientError::Shard(ShardError::Fatal { shard_id, code })) => {
            assert_eq!(shard_id, 0);
            assert_eq!(code, 4014);
        }
        other => panic!("expected a fatal close, got {other:?}"),
    }
    client.shutdown().await;
}

#[tokio::test]
async fn test_exhausted_session_budget_delays_start() {
    let gateway = FakeGateway::start(vec![ConnectionPlan::default()]).await.unwrap();
    let rest = api(gateway.url().to_string(), 0, 300).await;
    let client = Client::builder(test_config(rest.base_url())).build().unwrap();

    let started = Instant::now();
    within(client.start()).await.unwrap().unwrap();
    assert!(started.elapsed() >= Duration::from_millis(300));

    client.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_interrupts_budget_wait() {
    let rest = api("ws://127.0.0.1:1".to_string(), 0, 60_000).await;
    let client = std::sync::Arc::new(Client::builder(test_config(rest.base_url())).build().unwrap());

    let starting = {
        let client = std::sync::Arc::clone(&client);
        tokio::spawn(async move { client.start().await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    client.shutdown().await;

    assert!(matches!(
        within(starting).await.unwrap().unwrap(),
        Err(ClientError::ShutDown)
    ));
}

#[tokio::test]
async fn test_lookups_go_through_cache() {
    let rest = api("ws://127.0.0.1:1".to_string(), 1000, 0).await;
    let client = Client::builder(test_config(rest.base_url())).build().unwrap();
    let user_id = Snowflake::new(42);

    let fetched = client.user(user_id).await.unwrap();
    assert_eq!(fetched["username"], "someone");
    let cached = client.user(user_id).await.unwrap();
    assert_eq!(cached, fetched);
    assert_eq!(rest.count(), 1);

    match client.fetch_channel(Snowflake::new(7)).await {
        Err(ClientError::Rest(error)) => assert_eq!(error.status(), Some(404)),
        other => panic!("expected a 404, got {other:?}"),
    }

    client.shutdown().await;
}
