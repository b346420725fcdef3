use crate::ipc_tests::helpers::{FLAKY_CHANNEL, TEST_AUTH_TOKEN, start_test_ipc_server};

use common::RedactedToken;
use ipc_core::clock::SystemClock;
use ipc_core::error::InvokeError;
use ipc_core::error::ipc::IpcError;
use ipc_core::guard::handler;
use ipc_core::ipc::{LocalTransport, Transport, WsTransport};
use ipc_core::policy::ChannelPolicyRegistry;
use ipc_core::retry::{InvokeOptions, RetryOrchestrator};
use ipc_core::telemetry::TelemetryGate;

use models::{GuardConfig, RuntimeEnvironment};

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

fn orchestrator(transport: Arc<dyn Transport>) -> RetryOrchestrator {
    RetryOrchestrator::new(
        Arc::new(ChannelPolicyRegistry::standard()),
        transport,
        Arc::new(TelemetryGate::disabled(Arc::new(SystemClock))),
    )
}

/// **VALUE**: Verifies a transient backend failure is retried over the real
/// socket and the caller only sees the final value.
///
/// **WHY THIS MATTERS**: This is the complete path a front-end call takes.
///
/// **BUG THIS CATCHES**: Would catch remote error payloads losing their message
/// on decode, which would make them unclassifiable.
#[tokio::test]
async fn given_flaky_channel_when_invoking_over_websocket_then_recovered() {
    // GIVEN
    let server = start_test_ipc_server(RuntimeEnvironment::Production).await;
    let transport = WsTransport::connect(
        server.port(),
        &RedactedToken::new(TEST_AUTH_TOKEN),
        CONNECT_TIMEOUT,
    )
    .await
    .expect("Failed to connect");
    let orchestrator = orchestrator(Arc::new(transport));
    let retries = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&retries);
    let options = InvokeOptions::new()
        .with_base_delay_ms(20)
        .on_retry(move |attempt, delay_ms, error| {
            seen.lock()
                .unwrap()
                .push((attempt, delay_ms, error.message().map(str::to_string)));
        });

    // WHEN
    let value = orchestrator
        .invoke(FLAKY_CHANNEL, vec![json!("site-1")], options)
        .await
        .expect("Call should recover");

    // THEN
    assert_eq!(value, json!({ "fields": ["title"] }));
    assert_eq!(server.flaky_calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        *retries.lock().unwrap(),
        vec![(2, 20, Some(String::from("TIMEOUT: schema service busy")))]
    );
}

/// **VALUE**: Verifies guard errors come back as structured remote errors and
/// are not retried.
///
/// **WHY THIS MATTERS**: Validation failures are final; retrying them only
/// delays the message the user needs to see.
///
/// **BUG THIS CATCHES**: Would catch remote errors decoded as thrown values.
#[tokio::test]
async fn given_validation_failure_when_invoking_over_websocket_then_remote_error() {
    // GIVEN
    let server = start_test_ipc_server(RuntimeEnvironment::Production).await;
    let transport = WsTransport::connect(
        server.port(),
        &RedactedToken::new(TEST_AUTH_TOKEN),
        CONNECT_TIMEOUT,
    )
    .await
    .expect("Failed to connect");
    let orchestrator = orchestrator(Arc::new(transport));

    // WHEN
    let error = orchestrator
        .invoke("save-website", vec![json!({})], InvokeOptions::new())
        .await
        .unwrap_err();

    // THEN
    match error {
        InvokeError::Remote { error, .. } => {
            assert_eq!(error.name, "ValidationError");
            assert_eq!(error.message, "Validation failed: argument[0].name is required");
        }
        other => panic!("Expected remote error, got {other:?}"),
    }
}

/// **VALUE**: Verifies the client surfaces a rejected token as an auth error.
///
/// **WHY THIS MATTERS**: A stale token must fail loudly, not retry forever.
///
/// **BUG THIS CATCHES**: Would catch handshake rejections reported as success.
#[tokio::test]
async fn given_wrong_token_when_connecting_then_auth_error() {
    // GIVEN
    let server = start_test_ipc_server(RuntimeEnvironment::Production).await;

    // WHEN
    let result = WsTransport::connect(
        server.port(),
        &RedactedToken::new("not-the-token"),
        CONNECT_TIMEOUT,
    )
    .await;

    // THEN
    assert!(matches!(result, Err(IpcError::Auth { .. })));
}

/// **VALUE**: Verifies connecting to a port nobody listens on gives up after the
/// connect timeout with a refusal the retry patterns recognise.
///
/// **WHY THIS MATTERS**: The host may start after the front-end.
///
/// **BUG THIS CATCHES**: Would catch an unbounded connect loop.
#[tokio::test]
async fn given_no_server_when_connecting_then_connect_error_after_timeout() {
    // GIVEN: A port that was free a moment ago
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("Bind ephemeral port");
        listener.local_addr().expect("Local addr").port()
    };

    // WHEN
    let result = WsTransport::connect(
        port,
        &RedactedToken::new(TEST_AUTH_TOKEN),
        Duration::from_millis(300),
    )
    .await;

    // THEN
    match result {
        Err(IpcError::Connect { message, .. }) => assert!(message.starts_with("ECONNREFUSED")),
        Err(other) => panic!("Expected connect error, got {other}"),
        Ok(_) => panic!("Expected connect error"),
    }
}

/// **VALUE**: Verifies calls on a closed transport fail with a reset.
///
/// **WHY THIS MATTERS**: The orchestrator classifies `ECONNRESET` as transient.
///
/// **BUG THIS CATCHES**: Would catch calls on a dead socket hanging forever.
#[tokio::test]
async fn given_closed_transport_when_calling_then_connection_reset() {
    // GIVEN
    let server = start_test_ipc_server(RuntimeEnvironment::Production).await;
    let transport = WsTransport::connect(
        server.port(),
        &RedactedToken::new(TEST_AUTH_TOKEN),
        CONNECT_TIMEOUT,
    )
    .await
    .expect("Failed to connect");

    // WHEN
    transport.close();
    let result = transport
        .call("echo", vec![], tokio_util::sync::CancellationToken::new())
        .await;

    // THEN
    assert!(transport.is_closed());
    match result {
        Err(InvokeError::Transport { message, .. }) => assert!(message.starts_with("ECONNRESET")),
        other => panic!("Expected transport error, got {other:?}"),
    }
    assert_eq!(transport.pending_count(), 0);
}

/// **VALUE**: Verifies the in-process transport follows the same contract.
///
/// **WHY THIS MATTERS**: Hosts that embed the backend skip the socket entirely.
///
/// **BUG THIS CATCHES**: Would catch local dispatch skipping the guard.
#[tokio::test]
async fn given_local_transport_when_invoking_flaky_channel_then_recovered() {
    // GIVEN
    let server = start_test_ipc_server(RuntimeEnvironment::Production).await;
    let transport = LocalTransport::new(Arc::clone(&server.router));
    let orchestrator = orchestrator(Arc::new(transport));

    // WHEN
    let value = orchestrator
        .invoke(
            FLAKY_CHANNEL,
            vec![],
            InvokeOptions::new().with_base_delay_ms(10),
        )
        .await
        .expect("Call should recover");

    // THEN
    assert_eq!(value, json!({ "fields": ["title"] }));
    assert_eq!(server.flaky_calls.load(Ordering::SeqCst), 2);
}

/// **VALUE**: Verifies cancelling an orchestrated call frees its pending entry
/// even though the server never answers.
///
/// **WHY THIS MATTERS**: The orchestrator drops the attempt future as soon as
/// the token fires; an entry left behind would sit in the table until the
/// server's handler timeout, once per cancelled call.
///
/// **BUG THIS CATCHES**: Would catch cleanup that only runs when the transport's
/// own future observes the cancellation.
#[tokio::test]
async fn given_hung_channel_when_orchestrated_call_cancelled_then_pending_entry_removed() {
    // GIVEN: A handler that never answers
    let server = start_test_ipc_server(RuntimeEnvironment::Production).await;
    server
        .router
        .register_guarded_handler(
            "get-build-logs",
            handler(|_args| async {
                std::future::pending::<()>().await;
                Ok(Value::Null)
            }),
            GuardConfig::default(),
            Vec::new(),
        )
        .expect("Failed to register hung channel");
    let transport = Arc::new(
        WsTransport::connect(
            server.port(),
            &RedactedToken::new(TEST_AUTH_TOKEN),
            CONNECT_TIMEOUT,
        )
        .await
        .expect("Failed to connect"),
    );
    let orchestrator = orchestrator(Arc::clone(&transport) as Arc<dyn Transport>);
    let signal = CancellationToken::new();
    let canceller = signal.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        canceller.cancel();
    });

    // WHEN
    let result = orchestrator
        .invoke(
            "get-build-logs",
            vec![],
            InvokeOptions::new().with_signal(signal),
        )
        .await;

    // THEN
    assert!(matches!(result, Err(ref error) if error.is_cancelled()));
    assert_eq!(transport.pending_count(), 0);
}
