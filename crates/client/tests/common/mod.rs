//! In-process stand-in for the ambient light backend: an axum server with
//! the `/ws` event endpoint and a handful of `/api/v1` routes.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ambient_client::ClientConfig;
use ambient_shared::ClientMessage;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{get, put};
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

pub const STATUS_FRAME: &str = r#"{"type":"LedStatusChanged","data":{"data_send_mode":"AmbientLight","last_updated":"2026-01-01T00:00:00Z"}}"#;

struct MockState {
    received: Mutex<Vec<ClientMessage>>,
    connections: AtomicUsize,
    auto_confirm: bool,
    push: broadcast::Sender<String>,
    kick: broadcast::Sender<()>,
}

pub struct MockBackend {
    pub addr: SocketAddr,
    state: Arc<MockState>,
    server: JoinHandle<()>,
}

impl MockBackend {
    /// Backend that confirms every Subscribe it receives.
    pub async fn start() -> Self {
        Self::start_with(true).await
    }

    pub async fn start_with(auto_confirm: bool) -> Self {
        let state = Arc::new(MockState {
            received: Mutex::new(Vec::new()),
            connections: AtomicUsize::new(0),
            auto_confirm,
            push: broadcast::channel(64).0,
            kick: broadcast::channel(4).0,
        });

        let app = Router::new()
            .route("/ws", get(ws_handler))
            .route("/health", get(health))
            .route("/api/v1/led/status", get(led_status))
            .route("/api/v1/info/version", get(version))
            .route("/api/v1/display", get(display_down))
            .route("/api/v1/config/led-strips/length", put(reject_strip_length))
            .route("/slow", get(slow))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            server,
        }
    }

    /// Client config pointed at this backend with fast reconnects.
    pub fn config(&self) -> ClientConfig {
        let mut config = ClientConfig::for_host(&self.addr.to_string());
        config.reconnect.base_delay_ms = 50;
        config.reconnect.max_attempts = 3;
        config
    }

    /// Send a raw text frame to every connected socket.
    pub fn push(&self, frame: &str) {
        let _ = self.state.push.send(frame.to_string());
    }

    /// Close every connected socket from the server side.
    pub fn kick(&self) {
        let _ = self.state.kick.send(());
    }

    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    pub fn received(&self) -> Vec<ClientMessage> {
        self.state.received.lock().unwrap().clone()
    }

    pub fn subscribes(&self) -> Vec<Vec<String>> {
        self.received()
            .into_iter()
            .filter_map(|msg| match msg {
                ClientMessage::Subscribe(types) => Some(types),
                _ => None,
            })
            .collect()
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.kick();
        self.server.abort();
    }
}

/// A config whose endpoints refuse connections.
pub async fn unreachable_config() -> ClientConfig {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut config = ClientConfig::for_host(&addr.to_string());
    config.reconnect.base_delay_ms = 10;
    config.reconnect.max_attempts = 2;
    config
}

/// Poll `condition` until it holds, failing the test after a few seconds.
pub async fn eventually(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<MockState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<MockState>) {
    state.connections.fetch_add(1, Ordering::SeqCst);
    let (mut sender, mut receiver) = socket.split();
    let mut push = state.push.subscribe();
    let mut kick = state.kick.subscribe();

    loop {
        tokio::select! {
            incoming = receiver.next() => {
                let Some(Ok(msg)) = incoming else { break };
                let Message::Text(text) = msg else { continue };
                let Ok(command) = serde_json::from_str::<ClientMessage>(text.as_str()) else {
                    continue;
                };
                state.received.lock().unwrap().push(command.clone());

                let reply = match command {
                    ClientMessage::Subscribe(types) if state.auto_confirm => Some(json!({
                        "type": "SubscriptionConfirmed",
                        "data": { "event_types": types },
                    })),
                    ClientMessage::Ping => Some(json!({ "type": "Pong" })),
                    _ => None,
                };
                if let Some(reply) = reply {
                    if sender.send(Message::Text(reply.to_string().into())).await.is_err() {
                        break;
                    }
                }
            }
            frame = push.recv() => {
                let Ok(frame) = frame else { break };
                if sender.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }
            _ = kick.recv() => {
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
        }
    }
}

async fn health() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": { "status": "healthy", "timestamp": "2026-01-01T00:00:00Z", "version": "2.0.0", "uptime": 12 },
    }))
}

async fn led_status() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "data_send_mode": "StripConfig",
            "last_updated": "2026-01-01T00:00:00Z",
            "send_stats": { "total_packets_sent": 42, "total_bytes_sent": 4200, "last_send_time": null, "send_errors": 0 },
        },
    }))
}

async fn version() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": { "version": "2.0.0", "is_dev": true, "build_time": null, "git_hash": null },
    }))
}

async fn display_down() -> (StatusCode, &'static str) {
    (StatusCode::SERVICE_UNAVAILABLE, "display service down")
}

async fn reject_strip_length(Json(body): Json<Value>) -> Json<Value> {
    Json(json!({
        "success": false,
        "data": null,
        "error": format!("display {} not found", body["display_id"]),
    }))
}

async fn slow() -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(10)).await;
    Json(json!({ "success": true, "data": null }))
}
