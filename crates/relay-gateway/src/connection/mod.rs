//! Gateway connection lifecycle
//!
//! One `run` call is one connection: dial, handshake, then pump frames
//! until the server closes, an error surfaces or the caller cancels.
//! Sequence numbers are persisted before a frame is acted on, so a crash
//! between the two never loses progress.

mod heartbeat;

pub use heartbeat::{HeartbeatScheduler, HeartbeatSignal};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use relay_core::entities::GatewaySession;
use relay_core::error::GatewayError;
use relay_core::protocol::{
    GatewayEvent, GatewayMessage, IdentifyPayload, IdentifyProperties, Intents, ReadyPayload,
    ResumePayload, EVENT_READY, EVENT_RESUMED,
};
use relay_core::traits::{EventHandler, SessionStore};

use crate::outbox::{Outbox, OutgoingSender};
use crate::rest::RestClient;

/// Protocol version requested when dialing
const GATEWAY_VERSION: u8 = 9;

/// Outbound frame buffer between producers and the socket writer
const OUTBOUND_BUFFER: usize = 16;

/// Heartbeat signal buffer between the receive loop and the scheduler
const SIGNAL_BUFFER: usize = 8;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Settings for one gateway identity
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Bot token used for Identify, Resume and REST calls
    pub token: String,
    /// Event intents requested at Identify
    pub intents: Intents,
    /// Fixed gateway URL; discovered over REST when absent
    pub gateway_url: Option<String>,
    /// Name reported in the Identify properties
    pub client_name: String,
}

/// What the receive loop decided after one frame
enum FrameOutcome {
    Continue,
    Close,
}

/// A single logical gateway connection, restartable via [`GatewayConnection::run`]
pub struct GatewayConnection {
    config: ConnectionConfig,
    rest: Arc<RestClient>,
    sessions: Arc<dyn SessionStore>,
    outbox: Arc<Outbox>,
    handler: Arc<dyn EventHandler>,
    connected: AtomicBool,
}

impl GatewayConnection {
    pub fn new(
        config: ConnectionConfig,
        rest: Arc<RestClient>,
        sessions: Arc<dyn SessionStore>,
        outbox: Arc<Outbox>,
        handler: Arc<dyn EventHandler>,
    ) -> Self {
        Self {
            config,
            rest,
            sessions,
            outbox,
            handler,
            connected: AtomicBool::new(false),
        }
    }

    /// Whether the handshake completed and the connection is being pumped
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Run one connection to completion. `Ok(())` means the connection
    /// ended in an expected way (server close, reconnect request,
    /// cancellation); an error means it died and the caller should back
    /// off before retrying.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), GatewayError> {
        let result = self.run_session(&cancel).await;
        self.connected.store(false, Ordering::SeqCst);
        result
    }

    async fn run_session(&self, cancel: &CancellationToken) -> Result<(), GatewayError> {
        let url = self.resolve_gateway_url().await?;
        debug!(url = %url, "Dialing gateway");

        let (socket, _response) = connect_async(&url)
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        let (mut sink, mut stream) = socket.split();

        // First frame must be Hello
        let hello = match read_frame(&mut stream).await? {
            Some(frame) => frame,
            None => {
                return Err(GatewayError::Protocol(
                    "connection closed before hello".to_string(),
                ))
            }
        };
        let GatewayEvent::Hello(hello) = hello.into_event()? else {
            return Err(GatewayError::Protocol(
                "expected hello as the first frame".to_string(),
            ));
        };
        if hello.heartbeat_interval == 0 {
            return Err(GatewayError::Protocol(
                "hello with a zero heartbeat interval".to_string(),
            ));
        }
        debug!(heartbeat_interval_ms = hello.heartbeat_interval, "Hello received");

        self.handshake(&mut sink, &mut stream).await?;
        self.connected.store(true, Ordering::SeqCst);

        // Socket writer owns the sink from here on
        let (outbound, outbound_rx) = mpsc::channel::<GatewayMessage>(OUTBOUND_BUFFER);
        let _writer = spawn_writer(sink, outbound_rx);

        let child = cancel.child_token();
        let (signals, signals_rx) = mpsc::channel::<HeartbeatSignal>(SIGNAL_BUFFER);
        let scheduler = HeartbeatScheduler::new(
            Duration::from_millis(hello.heartbeat_interval),
            self.sessions.clone(),
            outbound.clone(),
            signals_rx,
        );
        let mut heartbeat = tokio::spawn(scheduler.run(child.clone()));

        let sender = OutgoingSender::new(self.outbox.clone(), self.rest.clone());
        tokio::spawn(sender.run(child.clone()));

        let result = loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("Connection cancelled");
                    break Ok(());
                }
                join = &mut heartbeat => {
                    break match join {
                        Ok(Ok(())) => Ok(()),
                        Ok(Err(e)) => Err(e),
                        Err(e) => Err(GatewayError::Transport(format!("heartbeat task failed: {e}"))),
                    };
                }
                frame = read_frame(&mut stream) => {
                    match frame {
                        Ok(Some(msg)) => match self.handle_frame(msg, &signals).await {
                            Ok(FrameOutcome::Continue) => {}
                            Ok(FrameOutcome::Close) => break Ok(()),
                            Err(e) => break Err(e),
                        },
                        Ok(None) => {
                            info!("Gateway closed the connection");
                            break Ok(());
                        }
                        Err(e) => break Err(e),
                    }
                }
            }
        };

        child.cancel();
        result
    }

    /// Resume the stored session or identify from scratch
    async fn handshake(
        &self,
        sink: &mut WsSink,
        stream: &mut WsStream,
    ) -> Result<(), GatewayError> {
        if let Some(session) = self.sessions.get().await? {
            info!(
                session_id = %session.session_id,
                sequence = session.sequence_number,
                "Resuming session"
            );
            let resume = GatewayMessage::resume(ResumePayload {
                token: self.config.token.clone(),
                session_id: session.session_id,
                seq: session.sequence_number,
            });
            send_frame(sink, &resume).await?;
            // Success is implicit: the server replays missed dispatches
            // and eventually sends RESUMED through the normal loop.
            return Ok(());
        }

        info!("No stored session, identifying");
        let identify = GatewayMessage::identify(
            IdentifyPayload::new(self.config.token.clone(), self.config.intents)
                .with_properties(IdentifyProperties::current(&self.config.client_name)),
        );
        send_frame(sink, &identify).await?;

        // Block until READY so the session is durable before any event
        // is processed
        let ready = match read_frame(stream).await? {
            Some(frame) => frame,
            None => {
                return Err(GatewayError::Protocol(
                    "connection closed before ready".to_string(),
                ))
            }
        };
        let sequence = ready.s;
        let GatewayEvent::Dispatch { name, data, .. } = ready.into_event()? else {
            return Err(GatewayError::Protocol(
                "expected ready dispatch after identify".to_string(),
            ));
        };
        if name != EVENT_READY {
            return Err(GatewayError::Protocol(format!(
                "expected ready, got {name}"
            )));
        }

        let payload: ReadyPayload = serde_json::from_value(data)
            .map_err(|e| GatewayError::Protocol(format!("malformed ready payload: {e}")))?;
        let session = GatewaySession::new(payload.session_id, sequence.unwrap_or(0));
        self.sessions.put(&session).await?;

        info!(
            session_id = %session.session_id,
            user = %payload.user.username,
            "Session established"
        );
        Ok(())
    }

    /// Persist the sequence, then route one server frame
    async fn handle_frame(
        &self,
        frame: GatewayMessage,
        signals: &mpsc::Sender<HeartbeatSignal>,
    ) -> Result<FrameOutcome, GatewayError> {
        if let Some(sequence) = frame.s {
            self.sessions.update_sequence(sequence).await?;
        }

        match frame.into_event()? {
            GatewayEvent::Dispatch { name, data, .. } => {
                if name == EVENT_RESUMED {
                    info!("Session resumed");
                }
                trace!(event = %name, "Dispatch received");
                if let Err(e) = self.handler.on_event(&name, &data).await {
                    error!(event = %name, error = %e, "Event handler failed");
                }
                Ok(FrameOutcome::Continue)
            }
            GatewayEvent::HeartbeatRequest => {
                signals.send(HeartbeatSignal::Request).await.ok();
                Ok(FrameOutcome::Continue)
            }
            GatewayEvent::HeartbeatAck => {
                signals.send(HeartbeatSignal::Ack).await.ok();
                Ok(FrameOutcome::Continue)
            }
            GatewayEvent::Reconnect => {
                info!("Server requested reconnect");
                Ok(FrameOutcome::Close)
            }
            GatewayEvent::InvalidSession => {
                info!("Session invalidated by server");
                self.sessions.delete().await?;
                Ok(FrameOutcome::Close)
            }
            GatewayEvent::Hello(_) => {
                debug!("Ignoring hello after handshake");
                Ok(FrameOutcome::Continue)
            }
            GatewayEvent::Unknown { op } => {
                debug!(op, "Ignoring unknown opcode");
                Ok(FrameOutcome::Continue)
            }
        }
    }

    async fn resolve_gateway_url(&self) -> Result<String, GatewayError> {
        let base = match &self.config.gateway_url {
            Some(url) => url.clone(),
            None => self.rest.get_gateway_bot().await?.url,
        };
        Ok(format!(
            "{}/?v={GATEWAY_VERSION}&encoding=json",
            base.trim_end_matches('/')
        ))
    }
}

/// Read the next gateway frame. `Ok(None)` means the socket closed
/// cleanly; non-text frames are skipped.
async fn read_frame(stream: &mut WsStream) -> Result<Option<GatewayMessage>, GatewayError> {
    loop {
        let Some(frame) = stream.next().await else {
            return Ok(None);
        };

        let frame = match frame {
            Ok(frame) => frame,
            Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => return Ok(None),
            Err(e) => return Err(GatewayError::Transport(e.to_string())),
        };

        match frame {
            Message::Text(text) => {
                return GatewayMessage::from_json(&text)
                    .map(Some)
                    .map_err(|e| GatewayError::Protocol(format!("malformed frame: {e}")));
            }
            Message::Close(close) => {
                debug!(frame = ?close, "Server closed the connection");
                return Ok(None);
            }
            // The transport answers pings on its own
            Message::Ping(_) | Message::Pong(_) => {}
            other => debug!(frame = ?other, "Ignoring non-text frame"),
        }
    }
}

async fn send_frame(sink: &mut WsSink, frame: &GatewayMessage) -> Result<(), GatewayError> {
    let json = frame
        .to_json()
        .map_err(|e| GatewayError::Protocol(e.to_string()))?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| GatewayError::Transport(e.to_string()))
}

/// Forward outbound frames to the socket, closing it when the channel ends
fn spawn_writer(mut sink: WsSink, mut rx: mpsc::Receiver<GatewayMessage>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let json = match frame.to_json() {
                Ok(json) => json,
                Err(e) => {
                    warn!(error = %e, "Failed to encode outbound frame");
                    continue;
                }
            };
            if sink.send(Message::Text(json)).await.is_err() {
                warn!("Failed to send frame to gateway");
                break;
            }
        }
        let _ = sink.close().await;
    })
}
