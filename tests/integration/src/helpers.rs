//! Test helpers for integration tests
//!
//! Provides scriptable mock servers standing in for the real gateway and
//! REST API, plus utilities for wiring the client under test to them.

use std::collections::VecDeque;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::Utc;
use parking_lot::Mutex;
use relay_core::error::GatewayError;
use relay_core::memory::{MemoryOutgoingStore, MemorySessionStore};
use relay_core::protocol::Intents;
use relay_core::traits::EventHandler;
use relay_gateway::{ConnectionConfig, GatewayConnection, Outbox, RateLimiter, RestClient};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Token every test client authenticates with
pub const TEST_TOKEN: &str = "test-token";

/// Upper bound on any single wait inside a test
pub const WAIT_LIMIT: Duration = Duration::from_secs(10);

/// Counter for unique test ports
static PORT_COUNTER: AtomicU16 = AtomicU16::new(19000);

/// Get a unique port for testing
pub fn get_test_port() -> u16 {
    PORT_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Mock gateway server that hands each accepted WebSocket to the test
pub struct TestGateway {
    pub addr: SocketAddr,
    conns: mpsc::Receiver<ServerSocket>,
    _handle: JoinHandle<()>,
}

impl TestGateway {
    /// Start the mock gateway on a loopback port
    pub async fn start() -> Result<Self> {
        let port = get_test_port();
        let addr = SocketAddr::from(([127, 0, 0, 1], port));

        let (tx, conns) = mpsc::channel(4);
        let app = Router::new().route("/", get(gateway_upgrade)).with_state(tx);

        let listener = TcpListener::bind(addr).await?;
        let actual_addr = listener.local_addr()?;

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(Self {
            addr: actual_addr,
            conns,
            _handle: handle,
        })
    }

    /// URL for the client's gateway override
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Wait for the next client connection
    pub async fn accept(&mut self) -> Result<ServerSocket> {
        tokio::time::timeout(WAIT_LIMIT, self.conns.recv())
            .await
            .context("no gateway connection arrived")?
            .context("gateway server stopped")
    }
}

async fn gateway_upgrade(
    ws: WebSocketUpgrade,
    State(tx): State<mpsc::Sender<ServerSocket>>,
) -> Response {
    ws.on_upgrade(move |socket| async move {
        tx.send(ServerSocket { socket }).await.ok();
    })
}

/// Server side of one accepted gateway connection
pub struct ServerSocket {
    socket: WebSocket,
}

impl ServerSocket {
    /// Send one frame as JSON text
    pub async fn send(&mut self, frame: Value) -> Result<()> {
        self.socket
            .send(Message::Text(frame.to_string()))
            .await
            .context("failed to send frame to client")
    }

    /// Receive the next text frame from the client as JSON
    pub async fn recv(&mut self) -> Result<Value> {
        loop {
            let message = tokio::time::timeout(WAIT_LIMIT, self.socket.recv())
                .await
                .context("no frame arrived from client")?;
            match message {
                Some(Ok(Message::Text(text))) => return Ok(serde_json::from_str(&text)?),
                Some(Ok(Message::Close(_))) | None => bail!("client closed the connection"),
                Some(Ok(_)) => {}
                Some(Err(e)) => bail!("socket error: {e}"),
            }
        }
    }

    /// Close the server side of the connection
    pub async fn close(mut self) {
        self.socket.send(Message::Close(None)).await.ok();
    }
}

/// What the mock API should answer next on the create-message route
#[derive(Debug, Clone)]
pub enum Scripted {
    /// Accept the message and attach rate limit bucket headers
    RateLimitHeaders { limit: u32, reset_after: f64 },
    /// Reject with 429, optionally flagged as a global limit
    TooManyRequests { retry_after: f64, global: bool },
    /// Reject with 503
    ServerError,
    /// Reject with 404
    NotFound,
}

/// Observable state of the mock REST API
#[derive(Default)]
pub struct ApiState {
    /// URL handed out by the discovery endpoint
    pub gateway_url: Mutex<String>,
    /// Messages accepted by the create-message endpoint
    pub messages: Mutex<Vec<(String, Value)>>,
    /// Scripted answers consumed by create-message, oldest first
    pub create_script: Mutex<VecDeque<Scripted>>,
    /// Create-message attempts, including rejected ones
    pub create_attempts: AtomicU32,
    /// Last Authorization header seen on any route
    pub last_auth: Mutex<Option<String>>,
}

/// Mock REST API serving discovery, create-message and delete-message
pub struct TestApi {
    pub addr: SocketAddr,
    pub state: Arc<ApiState>,
    _handle: JoinHandle<()>,
}

impl TestApi {
    /// Start the mock API on a loopback port
    pub async fn start() -> Result<Self> {
        let port = get_test_port();
        let addr = SocketAddr::from(([127, 0, 0, 1], port));

        let state = Arc::new(ApiState::default());
        let app = Router::new()
            .route("/gateway/bot", get(get_gateway_bot))
            .route("/channels/:channel_id/messages", post(create_message))
            .route(
                "/channels/:channel_id/messages/:message_id",
                delete(delete_message),
            )
            .with_state(state.clone());

        let listener = TcpListener::bind(addr).await?;
        let actual_addr = listener.local_addr()?;

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(Self {
            addr: actual_addr,
            state,
            _handle: handle,
        })
    }

    /// Get base URL for the API
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Queue scripted answers for the create-message route
    pub fn script_create(&self, steps: impl IntoIterator<Item = Scripted>) {
        self.state.create_script.lock().extend(steps);
    }
}

fn record_auth(state: &ApiState, headers: &HeaderMap) {
    if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        *state.last_auth.lock() = Some(auth.to_string());
    }
}

fn header_value(value: &str) -> HeaderValue {
    HeaderValue::from_str(value).unwrap_or_else(|_| HeaderValue::from_static("0"))
}

async fn get_gateway_bot(State(state): State<Arc<ApiState>>, headers: HeaderMap) -> Json<Value> {
    record_auth(&state, &headers);
    Json(json!({ "url": *state.gateway_url.lock() }))
}

async fn create_message(
    State(state): State<Arc<ApiState>>,
    Path(channel_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    record_auth(&state, &headers);
    state.create_attempts.fetch_add(1, Ordering::SeqCst);

    let step = state.create_script.lock().pop_front();
    match step {
        Some(Scripted::TooManyRequests {
            retry_after,
            global,
        }) => {
            let mut reply_headers = HeaderMap::new();
            reply_headers.insert("Retry-After", header_value(&retry_after.to_string()));
            if global {
                reply_headers.insert("X-RateLimit-Global", header_value("true"));
            } else {
                reply_headers.insert(
                    "X-RateLimit-Reset-After",
                    header_value(&retry_after.to_string()),
                );
            }
            (
                StatusCode::TOO_MANY_REQUESTS,
                reply_headers,
                Json(json!({ "message": "You are being rate limited." })),
            )
                .into_response()
        }
        Some(Scripted::ServerError) => StatusCode::SERVICE_UNAVAILABLE.into_response(),
        Some(Scripted::NotFound) => StatusCode::NOT_FOUND.into_response(),
        Some(Scripted::RateLimitHeaders { limit, reset_after }) => {
            let message = accept_message(&state, &channel_id, &body);
            let mut reply_headers = HeaderMap::new();
            reply_headers.insert("X-RateLimit-Bucket", header_value("test-bucket"));
            reply_headers.insert("X-RateLimit-Limit", header_value(&limit.to_string()));
            reply_headers.insert("X-RateLimit-Remaining", header_value("0"));
            reply_headers.insert(
                "X-RateLimit-Reset-After",
                header_value(&reset_after.to_string()),
            );
            (StatusCode::OK, reply_headers, Json(message)).into_response()
        }
        None => {
            let message = accept_message(&state, &channel_id, &body);
            Json(message).into_response()
        }
    }
}

fn accept_message(state: &ApiState, channel_id: &str, body: &Value) -> Value {
    let mut messages = state.messages.lock();
    messages.push((channel_id.to_string(), body.clone()));
    let id = format!("m{}", messages.len());
    drop(messages);

    json!({
        "id": id,
        "channel_id": channel_id,
        "content": body.get("content").and_then(Value::as_str).unwrap_or(""),
        "author": { "id": "bot-1", "username": "relay" },
        "timestamp": Utc::now().to_rfc3339(),
    })
}

async fn delete_message(
    State(state): State<Arc<ApiState>>,
    Path((_channel_id, message_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    record_auth(&state, &headers);
    if message_id == "missing" {
        StatusCode::NOT_FOUND.into_response()
    } else {
        StatusCode::NO_CONTENT.into_response()
    }
}

/// Event handler that forwards every dispatch into a channel
pub struct ChannelHandler(pub mpsc::UnboundedSender<(String, Value)>);

#[async_trait]
impl EventHandler for ChannelHandler {
    async fn on_event(&self, name: &str, data: &Value) -> anyhow::Result<()> {
        self.0.send((name.to_string(), data.clone())).ok();
        Ok(())
    }
}

/// A gateway client wired to the mock servers with in-memory stores
pub struct TestClient {
    pub connection: Arc<GatewayConnection>,
    pub sessions: Arc<MemorySessionStore>,
    pub outbox: Arc<Outbox>,
    pub rest: Arc<RestClient>,
    pub events: mpsc::UnboundedReceiver<(String, Value)>,
    pub shutdown: CancellationToken,
}

impl TestClient {
    /// Build a client pointed at the given mock endpoints
    pub fn new(gateway_url: &str, api_url: &str) -> Result<Self> {
        let sessions = Arc::new(MemorySessionStore::new());
        let outgoing = Arc::new(MemoryOutgoingStore::new());
        let outbox = Arc::new(Outbox::new(outgoing));
        let shutdown = CancellationToken::new();
        let limiter = Arc::new(RateLimiter::new(shutdown.clone()));
        let rest = Arc::new(RestClient::new(api_url, TEST_TOKEN, limiter)?);
        let (events_tx, events) = mpsc::unbounded_channel();

        let connection = Arc::new(GatewayConnection::new(
            ConnectionConfig {
                token: TEST_TOKEN.to_string(),
                intents: Intents::DEFAULT,
                gateway_url: Some(gateway_url.to_string()),
                client_name: "relay-tests".to_string(),
            },
            rest.clone(),
            sessions.clone(),
            outbox.clone(),
            Arc::new(ChannelHandler(events_tx)),
        ));

        Ok(Self {
            connection,
            sessions,
            outbox,
            rest,
            events,
            shutdown,
        })
    }

    /// Spawn a single connection attempt
    pub fn spawn_connection(&self) -> JoinHandle<Result<(), GatewayError>> {
        let connection = self.connection.clone();
        let token = self.shutdown.child_token();
        tokio::spawn(async move { connection.run(token).await })
    }

    /// Wait for the next dispatched event
    pub async fn next_event(&mut self) -> Result<(String, Value)> {
        tokio::time::timeout(WAIT_LIMIT, self.events.recv())
            .await
            .context("no event arrived")?
            .context("event channel closed")
    }
}

/// Build a standalone REST client against the mock API
pub fn test_rest(api_url: &str) -> Result<(Arc<RestClient>, CancellationToken)> {
    let shutdown = CancellationToken::new();
    let limiter = Arc::new(RateLimiter::new(shutdown.clone()));
    let rest = Arc::new(RestClient::new(api_url, TEST_TOKEN, limiter)?);
    Ok((rest, shutdown))
}

/// Poll an async condition until it holds or the wait limit passes
pub async fn wait_until<F, Fut>(what: &str, mut check: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    bail!("timed out waiting for {what}")
}

/// Helper to check if the database test environment is available
pub fn check_test_env() -> bool {
    dotenvy::dotenv().ok();

    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("Skipping test: DATABASE_URL not set");
        return false;
    }

    true
}
