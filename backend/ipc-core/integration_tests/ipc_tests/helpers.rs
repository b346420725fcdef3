//! Test helpers for IPC integration tests.
//!
//! - Starting a server with a small set of handlers on an ephemeral port
//! - Connecting raw WebSocket clients
//! - Sending and receiving JSON frames
//! - Authentication helpers

use common::RedactedToken;
use ipc_core::clock::SystemClock;
use ipc_core::error::HandlerError;
use ipc_core::guard::{RequestGuard, handler};
use ipc_core::ipc::{IpcRouter, IpcServerHandle, start_ipc_server};
use models::{
    GuardConfig, GuardConfigBuilder, IpcClientMessage, IpcServerMessage, RuntimeEnvironment,
    ValidationSchema,
};

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

pub type TestSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const TEST_AUTH_TOKEN: &str = "test-token-12345";

/// Calls admitted per window on `THROTTLED_CHANNEL`.
pub const THROTTLED_LIMIT: u32 = 2;
pub const THROTTLED_CHANNEL: &str = "get-dns-records";

/// Channel that fails with `TIMEOUT` on its first `FLAKY_FAILURES` calls.
pub const FLAKY_CHANNEL: &str = "get-website-schema";
pub const FLAKY_FAILURES: usize = 1;

pub struct TestServer {
    pub handle: IpcServerHandle,
    pub router: Arc<IpcRouter>,
    pub flaky_calls: Arc<AtomicUsize>,
}

impl TestServer {
    pub fn port(&self) -> u16 {
        self.handle.port()
    }
}

/// Start a server on an ephemeral port with these channels:
///
/// - `echo`: returns its arguments
/// - `save-website`: requires `{ name: string }`
/// - `get-dns-records`: [`THROTTLED_LIMIT`] calls per 60s window
/// - `get-website-schema`: flaky, see [`FLAKY_FAILURES`]
/// - `log-event`: one-way
pub async fn start_test_ipc_server(environment: RuntimeEnvironment) -> TestServer {
    let guard = RequestGuard::new(environment, Arc::new(SystemClock));
    let router = Arc::new(IpcRouter::new(guard));

    router
        .register_guarded_handler(
            "echo",
            handler(|args| async move { Ok(Value::Array(args)) }),
            GuardConfig::default(),
            Vec::new(),
        )
        .expect("Failed to register echo");

    router
        .register_guarded_handler(
            "save-website",
            handler(|args| async move { Ok(json!({ "saved": args.first().cloned() })) }),
            GuardConfig::default(),
            vec![ValidationSchema::object([(
                "name",
                ValidationSchema::string().required(),
            )])
            .required()],
        )
        .expect("Failed to register save-website");

    let throttled = GuardConfigBuilder::default()
        .with_rate_limit_ms(60_000)
        .with_max_requests_per_window(THROTTLED_LIMIT)
        .build()
        .expect("Valid guard config");
    router
        .register_guarded_handler(
            THROTTLED_CHANNEL,
            handler(|_args| async { Ok(json!([])) }),
            throttled,
            Vec::new(),
        )
        .expect("Failed to register throttled channel");

    let flaky_calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&flaky_calls);
    router
        .register_guarded_handler(
            FLAKY_CHANNEL,
            handler(move |_args| {
                let call = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if call < FLAKY_FAILURES {
                        Err(HandlerError::from("TIMEOUT: schema service busy"))
                    } else {
                        Ok(json!({ "fields": ["title"] }))
                    }
                }
            }),
            GuardConfig::default(),
            Vec::new(),
        )
        .expect("Failed to register flaky channel");

    router
        .register_one_way_handler(
            "log-event",
            handler(|_args| async { Ok(Value::Null) }),
            GuardConfig::default(),
            Vec::new(),
        )
        .expect("Failed to register log-event");

    let handle = start_ipc_server(0, RedactedToken::new(TEST_AUTH_TOKEN), Arc::clone(&router))
        .await
        .expect("Failed to start IPC server");

    TestServer {
        handle,
        router,
        flaky_calls,
    }
}

pub async fn connect_to_server(ipc_port: u16) -> TestSocket {
    let url = format!("ws://127.0.0.1:{ipc_port}");
    let (ws_stream, _) = connect_async(&url)
        .await
        .expect("Failed to connect to WebSocket server");
    ws_stream
}

pub async fn send_frame(ws: &mut TestSocket, message: &IpcClientMessage) {
    let json = serde_json::to_string(message).expect("Failed to encode frame");
    ws.send(Message::Text(json.into()))
        .await
        .expect("Failed to send frame");
}

/// Next server frame, failing the test after two seconds.
pub async fn receive_frame(ws: &mut TestSocket) -> IpcServerMessage {
    let message = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("Timed out waiting for frame")
        .expect("No message received")
        .expect("Error receiving message");

    match message {
        Message::Text(text) => {
            serde_json::from_str(text.as_str()).expect("Failed to decode server frame")
        }
        other => panic!("Expected text frame, got {other:?}"),
    }
}

/// Send the handshake and return `(success, error)`.
pub async fn authenticate(ws: &mut TestSocket, token: &str) -> (bool, Option<String>) {
    send_frame(
        ws,
        &IpcClientMessage::AuthHandshake {
            token: token.to_string(),
        },
    )
    .await;

    match receive_frame(ws).await {
        IpcServerMessage::AuthHandshakeResponse { success, error } => (success, error),
        other => panic!("Expected AuthHandshakeResponse, got {other:?}"),
    }
}

pub async fn authenticated_client(ipc_port: u16) -> TestSocket {
    let mut ws = connect_to_server(ipc_port).await;
    let (success, _) = authenticate(&mut ws, TEST_AUTH_TOKEN).await;
    assert!(success, "Auth should succeed");
    ws
}

pub async fn is_connection_closed(ws: &mut TestSocket) -> bool {
    match tokio::time::timeout(Duration::from_millis(500), ws.next()).await {
        Err(_) => false,
        Ok(None) => true,
        Ok(Some(Ok(Message::Close(_)))) => true,
        Ok(Some(Ok(_))) => false,
        Ok(Some(Err(_))) => true,
    }
}
