// Shared primitives for server bootstrapping and WebSocket clients across integration tests.
#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use spacehub::interface_adapters::net::ConnectionSettings;
use spacehub::use_cases::HubSettings;
use std::{
    // `Arc` shares data between threads; `OnceLock` writes a value only once.
    sync::{Arc, OnceLock},
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

// Global WebSocket URL used by all tests after the server publishes its bound address.
static SERVER_URL: OnceLock<String> = OnceLock::new();
// One-time guard that ensures the server bootstrap path runs only once.
static SERVER_READY: OnceLock<()> = OnceLock::new();

// Ensure the shared test server is running and return its WebSocket URL.
pub fn ensure_server() -> &'static str {
    SERVER_READY.get_or_init(|| {
        let published_addr = Arc::new(OnceLock::<String>::new());
        let published_addr_thread = Arc::clone(&published_addr);
        // Spawn an OS thread so the server outlives individual `#[tokio::test]` runtimes.
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("test runtime");
            runtime.block_on(async move {
                // Bind to an ephemeral port to avoid collisions with local services.
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("bind ephemeral test port");
                let addr = listener.local_addr().expect("get local addr");
                let _ = published_addr_thread.set(addr.to_string());
                spacehub::run(listener).await.expect("server failed");
            });
        });
        wait_for_readiness(published_addr);
    });

    SERVER_URL
        .get()
        .expect("server url should be initialized")
        .as_str()
}

// Wait for address publication and then for the server socket to accept TCP connections.
fn wait_for_readiness(published_addr: Arc<OnceLock<String>>) {
    let addr = loop {
        if let Some(addr) = published_addr.get() {
            break addr.clone();
        }
        std::thread::sleep(Duration::from_millis(10));
    };

    let _ = SERVER_URL.set(format!("ws://{addr}/ws"));

    // Retry for a short period to avoid racing server bind/accept.
    for _ in 0..100 {
        if std::net::TcpStream::connect(&addr).is_ok() {
            return;
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    panic!("server did not become ready in time");
}

// Start a dedicated server on the current runtime, for tests that need custom timers.
pub async fn spawn_server(hub: HubSettings, connection: ConnectionSettings) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral test port");
    let addr = listener.local_addr().expect("get local addr");
    tokio::spawn(async move {
        spacehub::run_with_settings(listener, hub, connection)
            .await
            .expect("server failed");
    });
    format!("ws://{addr}/ws")
}

pub fn test_settings() -> (HubSettings, ConnectionSettings) {
    (
        HubSettings {
            tick_interval: Duration::from_millis(20),
            event_channel_capacity: 256,
        },
        ConnectionSettings {
            outbound_capacity: 64,
            max_message_size: 512,
            idle_timeout: Duration::from_secs(30),
            keepalive_interval: Duration::from_secs(30),
            write_timeout: Duration::from_secs(5),
        },
    )
}

pub fn unique_lobby(prefix: &str) -> String {
    format!("{prefix}-{}", uuid::Uuid::new_v4())
}

pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock after epoch")
        .as_millis() as i64
}

pub async fn connect(url: &str) -> Client {
    let (ws, _response) = tokio_tungstenite::connect_async(url)
        .await
        .expect("websocket handshake should succeed");
    ws
}

pub fn envelope(kind: &str, seq: u32, data: Value) -> Value {
    json!({
        "type": kind,
        "timestamp": now_millis(),
        "seq": seq,
        "data": data,
    })
}

pub async fn send_json(ws: &mut Client, value: &Value) {
    ws.send(Message::text(value.to_string()))
        .await
        .expect("send should succeed");
}

// Next text frame parsed as JSON; control frames are skipped.
pub async fn next_json(ws: &mut Client) -> Value {
    loop {
        let frame = tokio::time::timeout(RECV_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for a message")
            .expect("stream ended")
            .expect("websocket error");
        match frame {
            Message::Text(text) => {
                return serde_json::from_str(text.as_str()).expect("server sent valid json");
            }
            Message::Close(frame) => panic!("connection closed: {frame:?}"),
            _ => continue,
        }
    }
}

// Skips messages until one with the given type tag arrives.
pub async fn next_of_type(ws: &mut Client, kind: &str) -> Value {
    loop {
        let message = next_json(ws).await;
        if message["type"] == kind {
            return message;
        }
    }
}

// True once the server closes the connection (close frame, EOF or transport error).
pub async fn wait_for_close(ws: &mut Client) -> bool {
    let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
    loop {
        match tokio::time::timeout_at(deadline, ws.next()).await {
            Err(_) => return false,
            Ok(None) | Ok(Some(Err(_))) | Ok(Some(Ok(Message::Close(_)))) => return true,
            Ok(Some(Ok(_))) => continue,
        }
    }
}
