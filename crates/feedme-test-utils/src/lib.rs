//! Common test helpers for Feedme integration tests
//!
//! Provides a ready-to-use server over the in-process channel transport, a
//! client wrapper that speaks raw wire JSON, and condition-based waiting so
//! tests never rely on hardcoded sleeps.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tokio::time::timeout;

use feedme_server::{Server, ServerConfig, ServerEvent, ServerEvents};
use feedme_transport::{ChannelTransport, ClientConn};

/// Default test timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default condition check interval
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(10);

/// Install the tracing subscriber once per test binary. Honors `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Wait for a condition with timeout - condition-based, not time-based
pub async fn wait_for<F>(check: F, max_wait: Duration) -> bool
where
    F: Fn() -> bool,
{
    let start = Instant::now();
    while start.elapsed() < max_wait {
        if check() {
            return true;
        }
        tokio::time::sleep(DEFAULT_CHECK_INTERVAL).await;
    }
    false
}

// ============================================================================
// Test Server
// ============================================================================

/// A started server over the channel transport.
pub struct TestServer {
    pub server: Server,
    pub transport: ChannelTransport,
    events: ServerEvents,
}

impl TestServer {
    /// Start a server with default configuration.
    pub async fn start() -> Self {
        Self::start_with_config(ServerConfig::default()).await
    }

    /// Start a server with custom configuration. Consumes the Starting and
    /// Started events so tests begin from a quiet stream.
    pub async fn start_with_config(config: ServerConfig) -> Self {
        init_tracing();
        let (transport, transport_events) = ChannelTransport::new();
        let (server, events) = Server::new(Arc::new(transport.clone()), transport_events, config);
        server.start().await.unwrap();

        let mut this = TestServer {
            server,
            transport,
            events,
        };
        loop {
            match this.next_event().await {
                ServerEvent::Started => break,
                ServerEvent::Starting => {}
                other => panic!("unexpected event during startup: {:?}", other),
            }
        }
        this
    }

    /// Open a raw client connection.
    pub fn connect(&self) -> TestClient {
        TestClient {
            conn: self.transport.connect().unwrap(),
        }
    }

    /// Open a connection and complete a handshake, returning the client
    /// alongside the server-assigned client id.
    pub async fn connect_handshaken(&self) -> (TestClient, String) {
        let mut client = self.connect();
        let id = client.handshake().await;
        (client, id)
    }

    /// Next server event, panicking if none arrives in time.
    pub async fn next_event(&mut self) -> ServerEvent {
        match timeout(DEFAULT_TIMEOUT, self.events.recv()).await {
            Ok(Some(event)) => event,
            Ok(None) => panic!("server event stream ended"),
            Err(_) => panic!("timed out waiting for a server event"),
        }
    }

    /// True if no server event arrives within `window`.
    pub async fn no_event_within(&mut self, window: Duration) -> bool {
        timeout(window, self.events.recv()).await.is_err()
    }
}

// ============================================================================
// Test Client
// ============================================================================

/// Client side of one channel connection, speaking wire JSON.
pub struct TestClient {
    conn: ClientConn,
}

impl TestClient {
    /// Send a raw text frame.
    pub fn send_text(&self, text: impl Into<String>) {
        self.conn.send(text).unwrap();
    }

    /// Send a JSON value as a text frame.
    pub fn send_json(&self, value: &Value) {
        self.conn.send(value.to_string()).unwrap();
    }

    /// Next frame from the server as parsed JSON; panics on timeout.
    pub async fn recv_json(&mut self) -> Value {
        match timeout(DEFAULT_TIMEOUT, self.conn.recv()).await {
            Ok(Some(text)) => serde_json::from_str(&text).unwrap(),
            Ok(None) => panic!("connection closed while expecting a message"),
            Err(_) => panic!("timed out waiting for a server message"),
        }
    }

    /// True once the server side has closed this connection.
    pub async fn closed(&mut self) -> bool {
        matches!(timeout(DEFAULT_TIMEOUT, self.conn.recv()).await, Ok(None))
    }

    /// True if no frame arrives within `window`.
    pub async fn silent_for(&mut self, window: Duration) -> bool {
        timeout(window, self.conn.recv()).await.is_err()
    }

    /// Perform a version-compatible handshake and return the assigned
    /// client id.
    pub async fn handshake(&mut self) -> String {
        self.send_json(&json!({
            "MessageType": "Handshake",
            "Versions": [feedme_core::FEEDME_VERSION],
        }));
        let response = self.recv_json().await;
        assert_eq!(response["MessageType"], "HandshakeResponse");
        assert_eq!(response["Success"], true);
        response["ClientId"]
            .as_str()
            .expect("handshake success carries a ClientId")
            .to_string()
    }

    /// Open a feed and assert the open succeeds.
    pub async fn open_feed(&mut self, feed_name: &str, feed_args: &Value) {
        self.send_json(&json!({
            "MessageType": "FeedOpen",
            "FeedName": feed_name,
            "FeedArgs": feed_args,
        }));
        let response = self.recv_json().await;
        assert_eq!(response["MessageType"], "FeedOpenResponse");
        assert_eq!(response["Success"], true);
    }

    /// Close this connection from the client side.
    pub fn close(&self, reason: Option<String>) {
        self.conn.close(reason);
    }
}
