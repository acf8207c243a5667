//! Shard transition function
//!
//! [`ShardMachine::handle`] takes one [`ShardEvent`] and returns the [`ShardAction`]s the
//! driver must perform. It never touches a socket or a timer, so every transition can be
//! exercised directly.

use super::heartbeat::{Beat, HeartbeatMonitor};
use super::state::{ShardState, ShardStatus};
use crate::protocol::{CloseCode, CloseDisposition};
use std::time::Duration;

/// Close code for client-initiated closes that keep the session resumable
pub const RESUMABLE_CLOSE: u16 = 4000;

/// Close code for a normal shutdown; the server invalidates the session
pub const NORMAL_CLOSE: u16 = 1000;

/// Exponential reconnect backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base: Duration,
    pub max: Duration,
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (zero-based)
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base
            .saturating_mul(1u32 << attempt.min(16))
            .min(self.max)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            max: Duration::from_secs(60),
        }
    }
}

/// Resumable session established by READY
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub resume_url: Option<String>,
}

/// Inputs to the machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShardEvent {
    Start,
    SocketOpened,
    ConnectFailed,
    Hello {
        interval: Duration,
    },
    /// An admission slot was granted
    Admitted,
    Ready {
        session_id: String,
        resume_url: Option<String>,
        sequence: u64,
    },
    Resumed {
        sequence: u64,
    },
    Dispatch {
        sequence: u64,
    },
    HeartbeatTick {
        now: u64,
    },
    HeartbeatAck {
        now: u64,
    },
    /// Server asked for an immediate heartbeat (op 1)
    HeartbeatRequested {
        now: u64,
    },
    /// Server asked the client to reconnect (op 7)
    ReconnectRequested,
    InvalidSession {
        resumable: bool,
    },
    /// `None` when the socket ended without a close frame
    SocketClosed {
        code: Option<u16>,
    },
    /// Undecodable transport data (corrupt compression stream)
    TransportError,
    BackoffElapsed,
    Shutdown,
}

/// Effects requested from the driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShardAction {
    Connect { url: String },
    StartHeartbeat { interval: Duration },
    StopHeartbeat,
    RequestAdmission,
    SendIdentify,
    SendResume { session_id: String, sequence: u64 },
    SendHeartbeat { sequence: Option<u64> },
    CloseSocket { code: u16 },
    ScheduleReconnect { delay: Duration },
    /// Stop for good after a fatal close code
    Terminate { code: u16 },
}

/// Session state of one shard
#[derive(Debug, Clone)]
pub struct ShardMachine {
    id: u32,
    total: u32,
    gateway_url: String,
    state: ShardState,
    session: Option<Session>,
    sequence: Option<u64>,
    heartbeat: HeartbeatMonitor,
    attempts: u32,
    policy: ReconnectPolicy,
}

impl ShardMachine {
    #[must_use]
    pub fn new(id: u32, total: u32, gateway_url: impl Into<String>, policy: ReconnectPolicy) -> Self {
        Self {
            id,
            total,
            gateway_url: gateway_url.into(),
            state: ShardState::Disconnected,
            session: None,
            sequence: None,
            heartbeat: HeartbeatMonitor::new(),
            attempts: 0,
            policy,
        }
    }

    pub fn state(&self) -> ShardState {
        self.state
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn sequence(&self) -> Option<u64> {
        self.sequence
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    #[must_use]
    pub fn status(&self) -> ShardStatus {
        ShardStatus {
            id: self.id,
            total: self.total,
            state: self.state,
            latency: self.heartbeat.latency(),
            sequence: self.sequence,
            session_id: self.session.as_ref().map(|s| s.id.clone()),
        }
    }

    /// Apply one event
    pub fn handle(&mut self, event: ShardEvent) -> Vec<ShardAction> {
        use ShardEvent as E;
        use ShardState as S;

        match (self.state, event) {
            (_, E::Shutdown) => self.shutdown(),
            (S::Closed, _) => Vec::new(),

            (S::Disconnected, E::Start) | (S::Reconnecting, E::BackoffElapsed) => self.connect(),
            (S::Connecting, E::SocketOpened) => {
                self.state = S::AwaitingHello;
                Vec::new()
            }
            (S::Connecting, E::ConnectFailed) => self.reconnect(false),

            (S::AwaitingHello, E::Hello { interval }) => {
                self.heartbeat.reset();
                self.state = if self.session.is_some() {
                    S::Resuming
                } else {
                    S::Identifying
                };
                vec![
                    ShardAction::StartHeartbeat { interval },
                    ShardAction::RequestAdmission,
                ]
            }
            (S::Identifying, E::Admitted) => vec![ShardAction::SendIdentify],
            (S::Resuming, E::Admitted) => match &self.session {
                Some(session) => vec![ShardAction::SendResume {
                    session_id: session.id.clone(),
                    sequence: self.sequence.unwrap_or(0),
                }],
                None => {
                    self.state = S::Identifying;
                    vec![ShardAction::SendIdentify]
                }
            },

            (
                S::Identifying | S::Resuming | S::Connected,
                E::Ready {
                    session_id,
                    resume_url,
                    sequence,
                },
            ) => {
                tracing::info!(shard_id = self.id, session_id = %session_id, "Session ready");
                self.session = Some(Session {
                    id: session_id,
                    resume_url,
                });
                self.sequence = Some(sequence);
                self.established();
                Vec::new()
            }
            (S::Resuming | S::Connected, E::Resumed { sequence }) => {
                tracing::info!(shard_id = self.id, sequence, "Session resumed");
                self.observe(sequence);
                self.established();
                Vec::new()
            }

            (state, E::Dispatch { sequence }) if state.is_live() => {
                self.observe(sequence);
                Vec::new()
            }
            (state, E::HeartbeatTick { now }) if state.is_live() => match self.heartbeat.tick(now) {
                Beat::Send => vec![ShardAction::SendHeartbeat {
                    sequence: self.sequence,
                }],
                Beat::Zombie => {
                    tracing::warn!(
                        shard_id = self.id,
                        missed = self.heartbeat.missed(),
                        "Heartbeats unacknowledged, dropping connection"
                    );
                    self.reconnect(true)
                }
            },
            (state, E::HeartbeatAck { now }) if state.is_live() => {
                self.heartbeat.ack(now);
                Vec::new()
            }
            (state, E::HeartbeatRequested { now }) if state.is_live() => {
                self.heartbeat.sent(now);
                vec![ShardAction::SendHeartbeat {
                    sequence: self.sequence,
                }]
            }

            (state, E::ReconnectRequested) if state.is_live() => {
                tracing::info!(shard_id = self.id, "Server requested reconnect");
                self.reconnect(true)
            }
            (state, E::InvalidSession { resumable }) if state.is_live() => {
                tracing::info!(shard_id = self.id, resumable, "Session invalidated");
                if !resumable {
                    self.discard_session();
                }
                self.reconnect(true)
            }
            (state, E::TransportError) if state.is_live() => self.reconnect(true),
            (state, E::SocketClosed { code }) if state.is_live() => self.closed(code),

            (state, event) => {
                tracing::trace!(shard_id = self.id, state = %state, ?event, "Event ignored");
                Vec::new()
            }
        }
    }

    fn connect(&mut self) -> Vec<ShardAction> {
        self.state = ShardState::Connecting;
        let url = self
            .session
            .as_ref()
            .and_then(|s| s.resume_url.clone())
            .unwrap_or_else(|| self.gateway_url.clone());
        vec![ShardAction::Connect { url }]
    }

    fn established(&mut self) {
        self.state = ShardState::Connected;
        self.attempts = 0;
    }

    fn observe(&mut self, sequence: u64) {
        self.sequence = Some(self.sequence.map_or(sequence, |s| s.max(sequence)));
    }

    fn discard_session(&mut self) {
        self.session = None;
        self.sequence = None;
    }

    fn closed(&mut self, code: Option<u16>) -> Vec<ShardAction> {
        let disposition = code.map_or(CloseDisposition::Resume, CloseCode::classify);
        match disposition {
            CloseDisposition::Fatal => {
                let code = code.unwrap_or_default();
                tracing::error!(
                    shard_id = self.id,
                    code,
                    reason = CloseCode::from_u16(code).map_or("unknown", CloseCode::description),
                    "Fatal close code"
                );
                self.discard_session();
                self.heartbeat.reset();
                self.state = ShardState::Closed;
                vec![ShardAction::StopHeartbeat, ShardAction::Terminate { code }]
            }
            CloseDisposition::Reidentify => {
                tracing::info!(shard_id = self.id, ?code, "Session expired, will identify");
                self.discard_session();
                self.reconnect(false)
            }
            CloseDisposition::Resume => {
                tracing::info!(shard_id = self.id, ?code, "Connection closed, will resume");
                self.reconnect(false)
            }
        }
    }

    fn reconnect(&mut self, close_socket: bool) -> Vec<ShardAction> {
        let mut actions = vec![ShardAction::StopHeartbeat];
        if close_socket {
            actions.push(ShardAction::CloseSocket {
                code: RESUMABLE_CLOSE,
            });
        }
        let delay = self.policy.delay(self.attempts);
        self.attempts = self.attempts.saturating_add(1);
        self.heartbeat.reset();
        self.state = ShardState::Reconnecting;
        tracing::debug!(
            shard_id = self.id,
            attempt = self.attempts,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Reconnect scheduled"
        );
        actions.push(ShardAction::ScheduleReconnect { delay });
        actions
    }

    fn shutdown(&mut self) -> Vec<ShardAction> {
        if self.state.is_closed() {
            return Vec::new();
        }
        let was_live = self.state.is_live();
        self.state = ShardState::Closed;
        self.heartbeat.reset();

        let mut actions = vec![ShardAction::StopHeartbeat];
        if was_live {
            actions.push(ShardAction::CloseSocket { code: NORMAL_CLOSE });
        }
        actions
    }
}
