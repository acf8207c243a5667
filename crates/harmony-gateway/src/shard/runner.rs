//! Shard driver
//!
//! Performs the actions of a [`ShardMachine`] against a real socket, heartbeat timer and
//! admission controller, and feeds everything it observes back in as [`ShardEvent`]s. All
//! waits happen in one `select!`, so heartbeats keep flowing while the shard queues for an
//! admission slot and cancellation interrupts every wait.

use super::config::ShardConfig;
use super::connection::{Connection, Frame};
use super::machine::{ShardAction, ShardEvent, ShardMachine, NORMAL_CLOSE};
use super::state::{ShardState, ShardStatus};
use crate::admission::{AdmissionController, AdmissionError, AdmissionPermit};
use crate::compression::DecompressorPool;
use crate::error::ShardError;
use crate::handler::{DispatchEvent, EventHandler};
use crate::protocol::{
    GatewayMessage, IdentifyPayload, IdentifyProperties, OpCode, ReadyPayload, ResumePayload,
};
use futures::future::BoxFuture;
use harmony_cache::CacheManager;
use harmony_core::MonotonicClock;
use serde::Deserialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior, Sleep};
use tokio_util::sync::CancellationToken;

/// How long queued handler deliveries may drain after the shard stops
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Components shared by every shard of a client
#[derive(Clone)]
pub struct ShardContext {
    pub config: Arc<ShardConfig>,
    pub admission: Arc<AdmissionController>,
    pub pool: Arc<DecompressorPool>,
    pub cache: Arc<CacheManager>,
    pub handler: Arc<dyn EventHandler>,
}

impl std::fmt::Debug for ShardContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardContext")
            .field("config", &self.config)
            .field("admission", &self.admission)
            .finish()
    }
}

/// Work handed to the per-shard delivery task
enum Delivery {
    Event(DispatchEvent),
    State(ShardState),
}

/// Runs one shard until shutdown or a fatal close
pub struct ShardRunner {
    id: u32,
    ctx: ShardContext,
    machine: ShardMachine,
    status: watch::Sender<ShardStatus>,
    commands: mpsc::Receiver<GatewayMessage>,
    cancel: CancellationToken,

    connection: Option<Connection>,
    heartbeat: Option<Interval>,
    admission_wait: Option<BoxFuture<'static, Result<AdmissionPermit, AdmissionError>>>,
    permit: Option<AdmissionPermit>,
    backoff: Option<Pin<Box<Sleep>>>,
}

impl ShardRunner {
    #[must_use]
    pub fn new(
        machine: ShardMachine,
        ctx: ShardContext,
        commands: mpsc::Receiver<GatewayMessage>,
        status: watch::Sender<ShardStatus>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id: machine.id(),
            ctx,
            machine,
            status,
            commands,
            cancel,
            connection: None,
            heartbeat: None,
            admission_wait: None,
            permit: None,
            backoff: None,
        }
    }

    /// Drive the shard; returns `Ok` after shutdown and `Err` on a fatal close code
    pub async fn run(mut self) -> Result<(), ShardError> {
        let (deliveries, mut queue) = mpsc::unbounded_channel::<Delivery>();
        let handler = Arc::clone(&self.ctx.handler);
        let shard_id = self.id;
        let delivery_task = tokio::spawn(async move {
            while let Some(delivery) = queue.recv().await {
                match delivery {
                    Delivery::Event(event) => handler.on_event(shard_id, &event).await,
                    Delivery::State(state) => handler.on_shard_state(shard_id, state).await,
                }
            }
        });

        tracing::info!(shard_id, total = self.machine.total(), "Shard starting");
        let result = self.drive(&deliveries).await;
        self.release().await;

        drop(deliveries);
        let abort = delivery_task.abort_handle();
        if tokio::time::timeout(DRAIN_TIMEOUT, delivery_task).await.is_err() {
            tracing::warn!(shard_id, "Event handler still busy at shutdown, aborting");
            abort.abort();
        }

        match &result {
            Ok(()) => tracing::info!(shard_id, "Shard stopped"),
            Err(e) => tracing::error!(shard_id, error = %e, "Shard terminated"),
        }
        result
    }

    async fn drive(&mut self, deliveries: &mpsc::UnboundedSender<Delivery>) -> Result<(), ShardError> {
        let mut events = VecDeque::from([ShardEvent::Start]);

        loop {
            while let Some(event) = events.pop_front() {
                let before = self.machine.state();
                let actions = self.machine.handle(event);
                self.publish(before, deliveries);
                for action in actions {
                    self.perform(action, &mut events).await?;
                }
            }

            if self.machine.state().is_closed() {
                return Ok(());
            }

            let connected = self.machine.state().is_connected();
            let event = tokio::select! {
                () = self.cancel.cancelled() => Some(ShardEvent::Shutdown),
                frame = next_frame(&mut self.connection) => self.on_frame(frame, deliveries).await,
                () = next_tick(&mut self.heartbeat) => Some(ShardEvent::HeartbeatTick {
                    now: MonotonicClock::now_millis(),
                }),
                granted = wait_on(&mut self.admission_wait) => {
                    self.admission_wait = None;
                    match granted {
                        Ok(permit) => {
                            self.permit = Some(permit);
                            Some(ShardEvent::Admitted)
                        }
                        Err(AdmissionError::Cancelled) => Some(ShardEvent::Shutdown),
                    }
                }
                () = wait_on(&mut self.backoff) => {
                    self.backoff = None;
                    Some(ShardEvent::BackoffElapsed)
                }
                Some(command) = self.commands.recv(), if connected => {
                    self.send(&command, &mut events);
                    None
                }
            };
            events.extend(event);
        }
    }

    async fn perform(
        &mut self,
        action: ShardAction,
        events: &mut VecDeque<ShardEvent>,
    ) -> Result<(), ShardError> {
        match action {
            ShardAction::Connect { url } => {
                let url = self.ctx.config.connect_url(&url);
                let pool = self.ctx.config.compress.then_some(&self.ctx.pool);
                let timeout = self.ctx.config.connect_timeout;
                tokio::select! {
                    () = self.cancel.cancelled() => events.push_back(ShardEvent::Shutdown),
                    opened = Connection::open(self.id, &url, timeout, pool) => match opened {
                        Ok(connection) => {
                            self.connection = Some(connection);
                            events.push_back(ShardEvent::SocketOpened);
                        }
                        Err(e) => {
                            tracing::warn!(shard_id = self.id, url = %url, error = %e, "Gateway connect failed");
                            events.push_back(ShardEvent::ConnectFailed);
                        }
                    },
                }
            }
            ShardAction::StartHeartbeat { interval } => {
                self.heartbeat = Some(heartbeat_timer(interval));
                tracing::debug!(
                    shard_id = self.id,
                    interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
                    "Heartbeat scheduled"
                );
            }
            ShardAction::StopHeartbeat => self.heartbeat = None,
            ShardAction::RequestAdmission => {
                let admission = Arc::clone(&self.ctx.admission);
                let cancel = self.cancel.clone();
                let shard_id = self.id;
                self.admission_wait =
                    Some(Box::pin(async move { admission.acquire(shard_id, &cancel).await }));
            }
            ShardAction::SendIdentify => {
                let config = &self.ctx.config;
                let payload = IdentifyPayload {
                    token: config.token.clone(),
                    properties: IdentifyProperties::new(),
                    compress: false,
                    large_threshold: config.large_threshold,
                    shard: [self.id, self.machine.total()],
                    presence: config.presence.clone(),
                    intents: config.intents,
                };
                self.handshake(GatewayMessage::identify(&payload), events);
            }
            ShardAction::SendResume {
                session_id,
                sequence,
            } => {
                let payload = ResumePayload {
                    token: self.ctx.config.token.clone(),
                    session_id,
                    seq: sequence,
                };
                self.handshake(GatewayMessage::resume(&payload), events);
            }
            ShardAction::SendHeartbeat { sequence } => {
                self.send(&GatewayMessage::heartbeat(sequence), events);
            }
            ShardAction::CloseSocket { code } => {
                if let Some(connection) = self.connection.take() {
                    connection.close(code).await;
                }
            }
            ShardAction::ScheduleReconnect { delay } => {
                if let Some(connection) = self.connection.take() {
                    connection.finish().await;
                }
                self.admission_wait = None;
                self.permit = None;
                self.backoff = Some(Box::pin(tokio::time::sleep(delay)));
            }
            ShardAction::Terminate { code } => {
                return Err(ShardError::Fatal {
                    shard_id: self.id,
                    code,
                });
            }
        }
        Ok(())
    }

    /// Send Identify or Resume, then give the admission slot back
    fn handshake(
        &mut self,
        message: Result<GatewayMessage, serde_json::Error>,
        events: &mut VecDeque<ShardEvent>,
    ) {
        match message {
            Ok(message) => self.send(&message, events),
            Err(e) => {
                tracing::error!(shard_id = self.id, error = %e, "Failed to encode handshake");
                events.push_back(ShardEvent::TransportError);
            }
        }
        self.permit = None;
    }

    fn send(&mut self, message: &GatewayMessage, events: &mut VecDeque<ShardEvent>) {
        let sent = match &self.connection {
            Some(connection) => connection.send(message),
            None => false,
        };
        if !sent {
            tracing::debug!(shard_id = self.id, op = %message.op, "Socket gone, message dropped");
            events.push_back(ShardEvent::SocketClosed { code: None });
        }
    }

    async fn on_frame(
        &mut self,
        frame: Frame,
        deliveries: &mpsc::UnboundedSender<Delivery>,
    ) -> Option<ShardEvent> {
        match frame {
            Frame::Message(message) => self.on_message(message, deliveries),
            Frame::Skip => None,
            Frame::Closed(code) => {
                tracing::info!(shard_id = self.id, ?code, "Gateway socket closed");
                if let Some(connection) = self.connection.take() {
                    connection.finish().await;
                }
                Some(ShardEvent::SocketClosed { code })
            }
            Frame::Corrupt(e) => {
                tracing::warn!(shard_id = self.id, error = %e, "Compressed stream corrupt, reconnecting");
                Some(ShardEvent::TransportError)
            }
        }
    }

    fn on_message(
        &mut self,
        message: GatewayMessage,
        deliveries: &mpsc::UnboundedSender<Delivery>,
    ) -> Option<ShardEvent> {
        let now = MonotonicClock::now_millis();
        match message.op {
            OpCode::Dispatch => self.on_dispatch(message, deliveries),
            OpCode::Hello => match message.as_hello() {
                Some(hello) => Some(ShardEvent::Hello {
                    interval: Duration::from_millis(hello.heartbeat_interval),
                }),
                None => {
                    tracing::warn!(shard_id = self.id, "Hello without heartbeat interval");
                    Some(ShardEvent::TransportError)
                }
            },
            OpCode::HeartbeatAck => Some(ShardEvent::HeartbeatAck { now }),
            OpCode::Heartbeat => Some(ShardEvent::HeartbeatRequested { now }),
            OpCode::Reconnect => Some(ShardEvent::ReconnectRequested),
            OpCode::InvalidSession => Some(ShardEvent::InvalidSession {
                resumable: message.as_invalid_session().unwrap_or(false),
            }),
            op => {
                tracing::debug!(shard_id = self.id, op = %op, "Unexpected op from server");
                None
            }
        }
    }

    /// Cache first, then the handler, in arrival order
    fn on_dispatch(
        &mut self,
        message: GatewayMessage,
        deliveries: &mpsc::UnboundedSender<Delivery>,
    ) -> Option<ShardEvent> {
        let (Some(name), Some(sequence)) = (message.t, message.s) else {
            tracing::warn!(shard_id = self.id, "Dispatch without name or sequence");
            return None;
        };
        let data = message.d.unwrap_or(Value::Null);

        let event = match name.as_str() {
            "READY" => match ReadyPayload::deserialize(&data) {
                Ok(ready) => ShardEvent::Ready {
                    session_id: ready.session_id,
                    resume_url: ready.resume_gateway_url,
                    sequence,
                },
                Err(e) => {
                    tracing::warn!(shard_id = self.id, error = %e, "Malformed READY");
                    ShardEvent::Dispatch { sequence }
                }
            },
            "RESUMED" => ShardEvent::Resumed { sequence },
            _ => ShardEvent::Dispatch { sequence },
        };

        self.ctx.cache.apply(&name, &data);
        tracing::trace!(shard_id = self.id, event = %name, sequence, "Dispatch");
        let _ = deliveries.send(Delivery::Event(DispatchEvent {
            shard_id: self.id,
            sequence,
            name,
            data,
        }));

        Some(event)
    }

    fn publish(&self, before: ShardState, deliveries: &mpsc::UnboundedSender<Delivery>) {
        let status = self.machine.status();
        let state = status.state;
        self.status.send_replace(status);

        if state != before {
            tracing::debug!(shard_id = self.id, from = %before, to = %state, "Shard state changed");
            let _ = deliveries.send(Delivery::State(state));
        }
    }

    /// Drop every per-connection resource
    async fn release(&mut self) {
        self.heartbeat = None;
        self.admission_wait = None;
        self.permit = None;
        self.backoff = None;
        if let Some(connection) = self.connection.take() {
            connection.close(NORMAL_CLOSE).await;
        }
    }
}

impl std::fmt::Debug for ShardRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardRunner")
            .field("id", &self.id)
            .field("state", &self.machine.state())
            .field("connection", &self.connection)
            .finish()
    }
}

/// Heartbeat interval whose first tick lands at a random point of the first period
fn heartbeat_timer(period: Duration) -> Interval {
    let jitter = period.mul_f64(rand::random::<f64>());
    let mut timer = tokio::time::interval_at(Instant::now() + jitter, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    timer
}

async fn next_frame(connection: &mut Option<Connection>) -> Frame {
    match connection {
        Some(connection) => connection.next().await,
        None => std::future::pending().await,
    }
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn wait_on<F: Future + Unpin>(slot: &mut Option<F>) -> F::Output {
    match slot {
        Some(future) => future.await,
        None => std::future::pending().await,
    }
}
