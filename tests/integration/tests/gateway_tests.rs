//! Shard tests against the fake gateway
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use harmony_cache::{CacheFlags, CacheManager};
use harmony_core::{Intents, Snowflake};
use harmony_gateway::protocol::PresenceUpdatePayload;
use harmony_gateway::{
    AdmissionController, DecompressorPool, OpCode, ReconnectPolicy, ShardConfig, ShardContext,
    ShardError, ShardManager, ShardState,
};
use integration_tests::{wait_until, within, ConnectionPlan, FakeGateway, RecordingHandler, Seen};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

struct Harness {
    manager: ShardManager,
    cache: Arc<CacheManager>,
    handler: RecordingHandler,
}

fn start(gateway: &FakeGateway, compress: bool) -> Harness {
    let mut config = ShardConfig::new("test-token", Intents::default());
    config.compress = compress;
    config.reconnect = ReconnectPolicy {
        base: Duration::from_millis(50),
        max: Duration::from_millis(200),
    };

    let cache = Arc::new(CacheManager::new(CacheFlags::all()));
    let handler = RecordingHandler::new();
    handler.watch_cache(Arc::clone(&cache));

    let ctx = ShardContext {
        config: Arc::new(config),
        admission: Arc::new(AdmissionController::new(1, Duration::from_millis(10))),
        pool: DecompressorPool::new(4),
        cache: Arc::clone(&cache),
        handler: Arc::new(handler.clone()),
    };
    let manager =
        ShardManager::start(gateway.url(), 0..1, 1, &ctx, &CancellationToken::new()).unwrap();

    Harness {
        manager,
        cache,
        handler,
    }
}

fn guild(id: &str) -> Value {
    json!({
        "id": id,
        "name": "test guild",
        "channels": [{"id": "300", "type": 0, "name": "general"}],
        "roles": [{"id": id, "name": "@everyone"}],
        "members": [],
    })
}

// ============================================================================
// Handshake
// ============================================================================

#[tokio::test]
async fn test_identify_and_ready() {
    let gateway = FakeGateway::start(vec![ConnectionPlan::default()]).await.unwrap();
    let harness = start(&gateway, false);
    let shard = harness.manager.shard(0).unwrap();

    let status = within(shard.wait_for(ShardState::Connected)).await.unwrap().unwrap();
    assert_eq!(status.session_id.as_deref(), Some("session-0"));
    assert_eq!(status.sequence, Some(1));

    let identify = gateway.received_op(OpCode::Identify);
    assert_eq!(identify.len(), 1);
    let payload = identify[0].message.d.clone().unwrap();
    assert_eq!(payload["token"], "test-token");
    assert_eq!(payload["shard"], json!([0, 1]));
    assert_eq!(payload["large_threshold"], 250);
    assert!(gateway.received_op(OpCode::Resume).is_empty());

    assert!(harness.manager.shutdown().await.is_empty());
    assert_eq!(shard.state(), ShardState::Closed);
    let states = harness.handler.states();
    assert!(states.contains(&ShardState::Connected));
    assert_eq!(states.last(), Some(&ShardState::Closed));
}

#[tokio::test]
async fn test_cache_is_applied_before_handler() {
    let plan = ConnectionPlan::default()
        .event("GUILD_CREATE", guild("81384788765712384"))
        .event(
            "MESSAGE_CREATE",
            json!({
                "id": "500",
                "channel_id": "300",
                "guild_id": "81384788765712384",
                "content": "hello",
                "author": {"id": "42", "username": "someone"},
            }),
        );
    let gateway = FakeGateway::start(vec![plan]).await.unwrap();
    let harness = start(&gateway, false);

    wait_until(|| harness.handler.events().len() == 3).await.unwrap();
    assert_eq!(harness.handler.events(), ["READY", "GUILD_CREATE", "MESSAGE_CREATE"]);

    let guild_id = Snowflake::new(81_384_788_765_712_384);
    for seen in harness.handler.seen() {
        if let Seen::Event { name, cached, .. } = seen {
            if name != "READY" {
                assert!(cached, "{name} reached the handler before the cache");
            }
        }
    }
    assert!(harness.cache.guild(guild_id).is_some());
    assert!(harness.cache.channel(Snowflake::new(300)).is_some());
    assert!(harness
        .cache
        .message(Snowflake::new(300), Snowflake::new(500))
        .is_some());
    assert!(harness.cache.user(Snowflake::new(42)).is_some());

    harness.manager.shutdown().await;
}

#[tokio::test]
async fn test_events_arrive_in_sequence_order() {
    let mut plan = ConnectionPlan::default();
    for n in 0..20 {
        plan = plan.event("TYPING_START", json!({ "n": n }));
    }
    let gateway = FakeGateway::start(vec![plan]).await.unwrap();
    let harness = start(&gateway, false);

    wait_until(|| harness.handler.events().len() == 21).await.unwrap();
    let sequences: Vec<u64> = harness
        .handler
        .seen()
        .into_iter()
        .filter_map(|seen| match seen {
            Seen::Event { sequence, .. } => Some(sequence),
            Seen::State(_) => None,
        })
        .collect();
    assert_eq!(sequences, (1..=21).collect::<Vec<u64>>());

    harness.manager.shutdown().await;
}

// ============================================================================
// Compression
// ============================================================================

#[tokio::test]
async fn test_zlib_stream_with_split_frames() {
    let plan = ConnectionPlan {
        fragment: true,
        ..ConnectionPlan::default()
    }
    .event("GUILD_CREATE", guild("81384788765712384"));
    let gateway = FakeGateway::start(vec![plan]).await.unwrap();
    let harness = start(&gateway, true);

    wait_until(|| harness.handler.events().len() == 2).await.unwrap();
    assert!(gateway.received_op(OpCode::Identify)[0].compressed);
    assert!(harness
        .cache
        .guild(Snowflake::new(81_384_788_765_712_384))
        .is_some());

    harness.manager.shutdown().await;
}

// ============================================================================
// Reconnects
// ============================================================================

#[tokio::test]
async fn test_resume_after_resumable_close() {
    let first = ConnectionPlan::default()
        .event("TYPING_START", json!({"channel_id": "300"}))
        .close(4000);
    let gateway = FakeGateway::start(vec![first, ConnectionPlan::default()])
        .await
        .unwrap();
    let harness = start(&gateway, false);
    let shard = harness.manager.shard(0).unwrap();

    wait_until(|| gateway.received_op(OpCode::Resume).len() == 1)
        .await
        .unwrap();
    let resume = &gateway.received_op(OpCode::Resume)[0];
    assert_eq!(resume.connection, 1);
    let payload = resume.message.d.clone().unwrap();
    assert_eq!(payload["session_id"], "session-0");
    assert_eq!(payload["seq"], 2);
    assert_eq!(payload["token"], "test-token");

    wait_until(|| shard.status().sequence == Some(3)).await.unwrap();
    assert_eq!(shard.state(), ShardState::Connected);
    assert_eq!(gateway.received_op(OpCode::Identify).len(), 1);
    assert!(harness.handler.events().contains(&"RESUMED".to_string()));

    harness.manager.shutdown().await;
}

#[tokio::test]
async fn test_session_invalidating_close_reidentifies() {
    let gateway = FakeGateway::start(vec![
        ConnectionPlan::default().close(4009),
        ConnectionPlan::default(),
    ])
    .await
    .unwrap();
    let harness = start(&gateway, false);

    wait_until(|| gateway.received_op(OpCode::Identify).len() == 2)
        .await
        .unwrap();
    assert!(gateway.received_op(OpCode::Resume).is_empty());

    let shard = harness.manager.shard(0).unwrap();
    wait_until(|| shard.status().session_id.as_deref() == Some("session-1"))
        .await
        .unwrap();

    harness.manager.shutdown().await;
}

#[tokio::test]
async fn test_fatal_close_stops_shard() {
    let gateway = FakeGateway::start(vec![ConnectionPlan::default().close(4004)])
        .await
        .unwrap();
    let harness = start(&gateway, false);

    let result = within(harness.manager.wait()).await.unwrap();
    assert_eq!(
        result,
        Err(ShardError::Fatal {
            shard_id: 0,
            code: 4004
        })
    );
    assert_eq!(harness.manager.shard(0).unwrap().state(), ShardState::Closed);
    assert_eq!(gateway.connections(), 1);
}

#[tokio::test]
async fn test_missed_acks_reconnect_and_resume() {
    let silent = ConnectionPlan {
        heartbeat_interval: 100,
        ack_heartbeats: false,
        ..ConnectionPlan::default()
    };
    let gateway = FakeGateway::start(vec![silent, ConnectionPlan::default()])
        .await
        .unwrap();
    let harness = start(&gateway, false);

    wait_until(|| gateway.received_op(OpCode::Resume).len() == 1)
        .await
        .unwrap();
    let heartbeats = gateway
        .received_op(OpCode::Heartbeat)
        .into_iter()
        .filter(|r| r.connection == 0)
        .count();
    assert!(heartbeats >= 2, "only {heartbeats} heartbeats before giving up");
    assert_eq!(gateway.received_op(OpCode::Resume)[0].connection, 1);

    harness.manager.shutdown().await;
}

// ============================================================================
// Commands
// ============================================================================

#[tokio::test]
async fn test_presence_update_reaches_gateway() {
    let gateway = FakeGateway::start(vec![ConnectionPlan::default()]).await.unwrap();
    let harness = start(&gateway, false);
    let shard = harness.manager.shard(0).unwrap();

    within(shard.update_presence(&PresenceUpdatePayload::status("idle")))
        .await
        .unwrap()
        .unwrap();

    wait_until(|| gateway.received_op(OpCode::PresenceUpdate).len() == 1)
        .await
        .unwrap();
    let presence = gateway.received_op(OpCode::PresenceUpdate)[0]
        .message
        .d
        .clone()
        .unwrap();
    assert_eq!(presence["status"], "idle");

    harness.manager.shutdown().await;
}
