//! WebSocket transport of one shard connection
//!
//! Reads happen on the shard task; writes go through a channel to a writer task that owns
//! the sink, so a slow socket never stalls the heartbeat timer. Writes never wait: a full
//! outbound queue means the peer stopped reading, and the socket is treated as dead.

use crate::compression::{DecompressError, DecompressorPool, PooledInflater};
use crate::protocol::GatewayMessage;
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Channel buffer size for outgoing frames
const OUTBOUND_BUFFER: usize = 64;

/// How long a closing connection may take to flush
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// What one read from the socket produced
#[derive(Debug)]
pub(crate) enum Frame {
    Message(GatewayMessage),
    /// Control frame, partial compressed fragment or undecodable JSON
    Skip,
    Closed(Option<u16>),
    Corrupt(DecompressError),
}

/// One open gateway socket
pub(crate) struct Connection {
    shard_id: u32,
    outbound: mpsc::Sender<Message>,
    inbound: SplitStream<Socket>,
    writer: JoinHandle<()>,
    inflater: Option<PooledInflater>,
}

impl Connection {
    /// Open a socket to `url`; transport-compressed when `pool` is given
    pub(crate) async fn open(
        shard_id: u32,
        url: &str,
        timeout: Duration,
        pool: Option<&Arc<DecompressorPool>>,
    ) -> Result<Self, WsError> {
        let (socket, _) = tokio::time::timeout(timeout, tokio_tungstenite::connect_async(url))
            .await
            .map_err(|_| {
                WsError::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "gateway connect timed out",
                ))
            })??;

        tracing::debug!(shard_id, url, "Gateway socket open");

        let (mut sink, inbound) = socket.split();
        let (outbound, mut rx) = mpsc::channel::<Message>(OUTBOUND_BUFFER);

        let writer = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                let closing = matches!(message, Message::Close(_));
                if let Err(e) = sink.send(message).await {
                    tracing::debug!(shard_id, error = %e, "Gateway write failed");
                    break;
                }
                if closing {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        Ok(Self {
            shard_id,
            outbound,
            inbound,
            writer,
            inflater: pool.map(DecompressorPool::checkout),
        })
    }

    /// Queue a message for the writer; false once the socket is gone or stalled
    pub(crate) fn send(&self, message: &GatewayMessage) -> bool {
        let json = match message.to_json() {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(shard_id = self.shard_id, error = %e, "Failed to encode gateway message");
                return false;
            }
        };
        tracing::trace!(shard_id = self.shard_id, op = %message.op, "Sending");
        enqueue(self.shard_id, &self.outbound, Message::Text(json.into()))
    }

    /// Read until the next meaningful frame
    pub(crate) async fn next(&mut self) -> Frame {
        match self.inbound.next().await {
            Some(Ok(Message::Text(text))) => self.decode(text.as_bytes()),
            Some(Ok(Message::Binary(bytes))) => match self.inflater.as_mut() {
                Some(inflater) => match inflater.push(&bytes) {
                    Ok(Some(message)) => self.decode(&message),
                    Ok(None) => Frame::Skip,
                    Err(e) => Frame::Corrupt(e),
                },
                None => self.decode(&bytes),
            },
            Some(Ok(Message::Close(frame))) => Frame::Closed(frame.map(|f| u16::from(f.code))),
            Some(Ok(_)) => Frame::Skip,
            Some(Err(e)) => {
                tracing::debug!(shard_id = self.shard_id, error = %e, "Gateway read failed");
                Frame::Closed(None)
            }
            None => Frame::Closed(None),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Frame {
        match GatewayMessage::from_slice(bytes) {
            Ok(message) => Frame::Message(message),
            Err(e) => {
                tracing::warn!(shard_id = self.shard_id, error = %e, "Undecodable gateway frame");
                Frame::Skip
            }
        }
    }

    /// Send a close frame and wait for the writer to flush it
    pub(crate) async fn close(self, code: u16) {
        let frame = CloseFrame {
            code: WsCloseCode::from(code),
            reason: "".into(),
        };
        enqueue(self.shard_id, &self.outbound, Message::Close(Some(frame)));
        self.finish().await;
    }

    /// Tear down a socket the server already closed
    pub(crate) async fn finish(self) {
        let Self {
            shard_id,
            outbound,
            writer,
            ..
        } = self;
        drop(outbound);

        let abort = writer.abort_handle();
        if tokio::time::timeout(CLOSE_TIMEOUT, writer).await.is_err() {
            tracing::debug!(shard_id, "Gateway writer did not finish, aborting");
            abort.abort();
        }
    }
}

/// Hand a frame to the writer without waiting for room
fn enqueue(shard_id: u32, outbound: &mpsc::Sender<Message>, message: Message) -> bool {
    match outbound.try_send(message) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            tracing::warn!(shard_id, "Gateway write queue full, peer is not reading");
            false
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("shard_id", &self.shard_id)
            .field("compressed", &self.inflater.is_some())
            .finish()
    }
}
