//! Fake WebSocket gateway
//!
//! Each accepted socket follows the [`ConnectionPlan`] at its index (the last plan
//! repeats): Hello, then READY or RESUMED once the client identifies or resumes, then the
//! planned dispatches, then an optional close. Frames go out zlib-stream compressed
//! whenever the client asked for it in the query string.

use crate::helpers::serve;
use anyhow::Result;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use flate2::{Compress, Compression, FlushCompress};
use harmony_gateway::protocol::HelloPayload;
use harmony_gateway::{GatewayMessage, OpCode};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Behaviour of one accepted socket
#[derive(Debug, Clone)]
pub struct ConnectionPlan {
    pub heartbeat_interval: u64,
    /// Answer heartbeats with acks
    pub ack_heartbeats: bool,
    /// Dispatches sent after READY or RESUMED, as `(name, data)`
    pub events: Vec<(String, Value)>,
    /// Close code sent once the events are out
    pub close_with: Option<u16>,
    /// Split every compressed message across two frames
    pub fragment: bool,
}

impl Default for ConnectionPlan {
    fn default() -> Self {
        Self {
            heartbeat_interval: 45_000,
            ack_heartbeats: true,
            events: Vec::new(),
            close_with: None,
            fragment: false,
        }
    }
}

impl ConnectionPlan {
    pub fn event(mut self, name: &str, data: Value) -> Self {
        self.events.push((name.to_string(), data));
        self
    }

    pub fn close(mut self, code: u16) -> Self {
        self.close_with = Some(code);
        self
    }
}

/// A client frame with the index of the socket it arrived on
#[derive(Debug, Clone)]
pub struct Received {
    pub connection: usize,
    pub compressed: bool,
    pub message: GatewayMessage,
}

struct Shared {
    plans: Vec<ConnectionPlan>,
    url: Mutex<String>,
    connections: Mutex<usize>,
    received: Mutex<Vec<Received>>,
}

/// In-process gateway
pub struct FakeGateway {
    url: String,
    shared: Arc<Shared>,
}

impl FakeGateway {
    pub async fn start(plans: Vec<ConnectionPlan>) -> Result<Self> {
        let shared = Arc::new(Shared {
            plans,
            url: Mutex::new(String::new()),
            connections: Mutex::new(0),
            received: Mutex::new(Vec::new()),
        });
        let app = Router::new()
            .route("/", get(upgrade))
            .with_state(Arc::clone(&shared));
        let addr = serve(app).await?;
        let url = format!("ws://{addr}");
        shared.url.lock().clone_from(&url);

        Ok(Self { url, shared })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Sockets accepted so far
    pub fn connections(&self) -> usize {
        *self.shared.connections.lock()
    }

    pub fn received(&self) -> Vec<Received> {
        self.shared.received.lock().clone()
    }

    /// Client frames with op `op`, in arrival order
    pub fn received_op(&self, op: OpCode) -> Vec<Received> {
        self.received()
            .into_iter()
            .filter(|r| r.message.op == op)
            .collect()
    }
}

async fn upgrade(
    ws: WebSocketUpgrade,
    Query(query): Query<HashMap<String, String>>,
    State(shared): State<Arc<Shared>>,
) -> Response {
    let compressed = query.get("compress").is_some_and(|v| v == "zlib-stream");
    let index = {
        let mut connections = shared.connections.lock();
        *connections += 1;
        *connections - 1
    };
    let plan = shared
        .plans
        .get(index)
        .or(shared.plans.last())
        .cloned()
        .unwrap_or_default();

    ws.on_upgrade(move |socket| async move {
        let mut session = Session {
            socket,
            index,
            plan,
            shared,
            sequence: 0,
            compressor: compressed.then(|| Compress::new(Compression::default(), true)),
        };
        session.run().await;
    })
}

struct Session {
    socket: WebSocket,
    index: usize,
    plan: ConnectionPlan,
    shared: Arc<Shared>,
    sequence: u64,
    compressor: Option<Compress>,
}

impl Session {
    async fn run(&mut self) {
        let hello = GatewayMessage::hello(&HelloPayload::with_interval(self.plan.heartbeat_interval));
        if !self.send(&hello).await {
            return;
        }

        while let Some(Ok(frame)) = self.socket.recv().await {
            let Message::Text(text) = frame else {
                if matches!(frame, Message::Close(_)) {
                    return;
                }
                continue;
            };
            let Ok(message) = GatewayMessage::from_json(&text) else {
                continue;
            };
            let op = message.op;
            let data = message.d.clone();
            self.shared.received.lock().push(Received {
                connection: self.index,
                compressed: self.compressor.is_some(),
                message,
            });

            match op {
                OpCode::Heartbeat if self.plan.ack_heartbeats => {
                    if !self.send(&GatewayMessage::heartbeat_ack()).await {
                        return;
                    }
                }
                OpCode::Identify => {
                    let ready = json!({
                        "v": 10,
                        "session_id": format!("session-{}", self.index),
                        "resume_gateway_url": self.shared.url.lock().clone(),
                        "user": {"id": "80351110224678912", "username": "bot"},
                        "guilds": [],
                        "shard": data.as_ref().and_then(|d| d.get("shard")).cloned(),
                    });
                    if !self.dispatch("READY", ready).await || !self.play().await {
                        return;
                    }
                }
                OpCode::Resume => {
                    self.sequence = data
                        .as_ref()
                        .and_then(|d| d.get("seq"))
                        .and_then(Value::as_u64)
                        .unwrap_or(0);
                    if !self.dispatch("RESUMED", Value::Null).await || !self.play().await {
                        return;
                    }
                }
                _ => {}
            }
        }
    }

    /// Send the planned events and the planned close; `false` once the socket is done
    async fn play(&mut self) -> bool {
        for (name, data) in self.plan.events.clone() {
            if !self.dispatch(&name, data).await {
                return false;
            }
        }
        match self.plan.close_with {
            Some(code) => {
                // Let the client read the events before the close frame
                tokio::time::sleep(Duration::from_millis(20)).await;
                let frame = CloseFrame {
                    code,
                    reason: "planned close".into(),
                };
                self.socket.send(Message::Close(Some(frame))).await.ok();
                false
            }
            None => true,
        }
    }

    async fn dispatch(&mut self, name: &str, data: Value) -> bool {
        self.sequence += 1;
        let message = GatewayMessage::dispatch(name, self.sequence, data);
        self.send(&message).await
    }

    async fn send(&mut self, message: &GatewayMessage) -> bool {
        let Ok(json) = message.to_json() else {
            return false;
        };
        let Some(compressor) = self.compressor.as_mut() else {
            return self.socket.send(Message::Text(json)).await.is_ok();
        };

        let bytes = deflate(compressor, json.as_bytes());
        if self.plan.fragment && bytes.len() > 1 {
            let (head, tail) = bytes.split_at(bytes.len() / 2);
            if self.socket.send(Message::Binary(head.to_vec())).await.is_err() {
                return false;
            }
            return self.socket.send(Message::Binary(tail.to_vec())).await.is_ok();
        }
        self.socket.send(Message::Binary(bytes)).await.is_ok()
    }
}

/// Compress one message onto the connection stream, ending in a sync flush
pub fn deflate(compressor: &mut Compress, input: &[u8]) -> Vec<u8> {
    let start = compressor.total_in();
    let mut output = Vec::with_capacity(input.len() + 64);
    loop {
        let consumed = (compressor.total_in() - start) as usize;
        if compressor
            .compress_vec(&input[consumed..], &mut output, FlushCompress::Sync)
            .is_err()
        {
            return output;
        }
        let consumed = (compressor.total_in() - start) as usize;
        if consumed == input.len() && output.len() < output.capacity() {
            return output;
        }
        output.reserve(256);
    }
}
