use crate::ipc_tests::helpers::{
    THROTTLED_CHANNEL, THROTTLED_LIMIT, TEST_AUTH_TOKEN, authenticate, authenticated_client,
    connect_to_server, is_connection_closed, receive_frame, send_frame, start_test_ipc_server,
};

use models::{IpcClientMessage, IpcOutcome, IpcServerMessage, RuntimeEnvironment, SafeError};

use std::collections::HashMap;

use futures_util::SinkExt;
use serde_json::{Value, json};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

fn invoke(request_id: u64, channel: &str, args: Vec<Value>) -> IpcClientMessage {
    IpcClientMessage::Invoke {
        request_id,
        channel: channel.to_string(),
        args,
    }
}

fn expect_response(frame: IpcServerMessage) -> (u64, IpcOutcome) {
    match frame {
        IpcServerMessage::Response {
            request_id,
            outcome,
        } => (request_id, outcome),
        other => panic!("Expected response, got {other:?}"),
    }
}

fn expect_error(outcome: IpcOutcome) -> SafeError {
    match outcome {
        IpcOutcome::Err { error } => {
            serde_json::from_value(error).expect("Error payload is a SafeError")
        }
        IpcOutcome::Ok { value } => panic!("Expected error, got {value}"),
    }
}

// ----------------------------------------------------------------------------
// Authentication
// ----------------------------------------------------------------------------

/// **VALUE**: Verifies the expected token is accepted.
///
/// **WHY THIS MATTERS**: Every front-end session starts with this handshake.
///
/// **BUG THIS CATCHES**: Would catch a server that never answers the handshake.
#[tokio::test]
async fn given_valid_token_when_authenticating_then_success() {
    // GIVEN
    let server = start_test_ipc_server(RuntimeEnvironment::Production).await;
    let mut ws = connect_to_server(server.port()).await;

    // WHEN
    let (success, error) = authenticate(&mut ws, TEST_AUTH_TOKEN).await;

    // THEN
    assert!(success);
    assert_eq!(error, None);
}

/// **VALUE**: Verifies a wrong token is refused and the connection closed.
///
/// **WHY THIS MATTERS**: Other local processes must not reach privileged handlers.
///
/// **BUG THIS CATCHES**: Would catch the server staying open after a failed handshake.
#[tokio::test]
async fn given_invalid_token_when_authenticating_then_rejected_and_closed() {
    // GIVEN
    let server = start_test_ipc_server(RuntimeEnvironment::Production).await;
    let mut ws = connect_to_server(server.port()).await;

    // WHEN
    let (success, error) = authenticate(&mut ws, "wrong-token").await;

    // THEN
    assert!(!success);
    assert_eq!(error.as_deref(), Some("Invalid authentication token"));
    assert!(is_connection_closed(&mut ws).await);
}

/// **VALUE**: Verifies a first frame that is not a handshake closes the connection
/// without dispatching.
///
/// **WHY THIS MATTERS**: Skipping the handshake must not be a way in.
///
/// **BUG THIS CATCHES**: Would catch invokes dispatched before authentication.
#[tokio::test]
async fn given_unauthenticated_when_invoking_then_connection_closed() {
    // GIVEN
    let server = start_test_ipc_server(RuntimeEnvironment::Production).await;
    let mut ws = connect_to_server(server.port()).await;

    // WHEN
    send_frame(&mut ws, &invoke(1, "get-website-schema", vec![])).await;

    // THEN
    assert!(is_connection_closed(&mut ws).await);
    assert_eq!(server.flaky_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
}

// ----------------------------------------------------------------------------
// Invocation
// ----------------------------------------------------------------------------

/// **VALUE**: Verifies an invoke is answered once with the same request id.
///
/// **WHY THIS MATTERS**: Clients correlate responses only by request id.
///
/// **BUG THIS CATCHES**: Would catch responses carrying the wrong id or the
/// unsanitized arguments.
#[tokio::test]
async fn given_authenticated_when_invoking_then_response_with_matching_id() {
    // GIVEN
    let server = start_test_ipc_server(RuntimeEnvironment::Production).await;
    let mut ws = authenticated_client(server.port()).await;

    // WHEN
    send_frame(
        &mut ws,
        &invoke(7, "echo", vec![json!("<script>alert(1)</script>hello")]),
    )
    .await;

    // THEN
    let (request_id, outcome) = expect_response(receive_frame(&mut ws).await);
    assert_eq!(request_id, 7);
    assert_eq!(
        outcome,
        IpcOutcome::Ok {
            value: json!(["hello"])
        }
    );
}

/// **VALUE**: Verifies several in-flight invokes on one connection all complete.
///
/// **WHY THIS MATTERS**: The front-end multiplexes every view over one socket.
///
/// **BUG THIS CATCHES**: Would catch the server handling one request at a time
/// and dropping the rest, or mixing up payloads.
#[tokio::test]
async fn given_multiple_invokes_when_sent_back_to_back_then_all_answered() {
    // GIVEN
    let server = start_test_ipc_server(RuntimeEnvironment::Production).await;
    let mut ws = authenticated_client(server.port()).await;

    // WHEN
    for request_id in 1..=5u64 {
        send_frame(&mut ws, &invoke(request_id, "echo", vec![json!(request_id)])).await;
    }

    // THEN
    let mut answers = HashMap::new();
    for _ in 0..5 {
        let (request_id, outcome) = expect_response(receive_frame(&mut ws).await);
        answers.insert(request_id, outcome);
    }
    for request_id in 1..=5u64 {
        assert_eq!(
            answers.get(&request_id),
            Some(&IpcOutcome::Ok {
                value: json!([request_id])
            })
        );
    }
}

/// **VALUE**: Verifies validation failures cross the wire as a safe error with
/// no stack in production.
///
/// **WHY THIS MATTERS**: The renderer must never see backend internals.
///
/// **BUG THIS CATCHES**: Would catch the raw error display (with its source
/// location) being serialized.
#[tokio::test]
async fn given_invalid_args_when_invoking_then_safe_validation_error() {
    // GIVEN
    let server = start_test_ipc_server(RuntimeEnvironment::Production).await;
    let mut ws = authenticated_client(server.port()).await;

    // WHEN
    send_frame(&mut ws, &invoke(3, "save-website", vec![json!({ "name": 42 })])).await;

    // THEN
    let (request_id, outcome) = expect_response(receive_frame(&mut ws).await);
    let error = expect_error(outcome);
    assert_eq!(request_id, 3);
    assert_eq!(error.name, "ValidationError");
    assert_eq!(
        error.message,
        "Validation failed: argument[0].name must be of type string"
    );
    assert_eq!(error.stack, None);
}

/// **VALUE**: Verifies development hosts attach a stack to errors.
///
/// **WHY THIS MATTERS**: Developers need the source chain to debug handlers.
///
/// **BUG THIS CATCHES**: Would catch the environment never reaching the mapper.
#[tokio::test]
async fn given_development_host_when_handler_fails_then_stack_included() {
    // GIVEN
    let server = start_test_ipc_server(RuntimeEnvironment::Development).await;
    let mut ws = authenticated_client(server.port()).await;

    // WHEN
    send_frame(&mut ws, &invoke(1, "get-website-schema", vec![])).await;

    // THEN
    let (_, outcome) = expect_response(receive_frame(&mut ws).await);
    let error = expect_error(outcome);
    assert_eq!(error.name, "Error");
    assert_eq!(error.message, "TIMEOUT: schema service busy");
    assert!(error.stack.is_some());
}

/// **VALUE**: Verifies unknown channels are answered with `NoHandler`.
///
/// **WHY THIS MATTERS**: A version skew between front-end and backend must fail
/// fast instead of hanging.
///
/// **BUG THIS CATCHES**: Would catch unknown channels left unanswered.
#[tokio::test]
async fn given_unknown_channel_when_invoking_then_no_handler() {
    // GIVEN
    let server = start_test_ipc_server(RuntimeEnvironment::Production).await;
    let mut ws = authenticated_client(server.port()).await;

    // WHEN
    send_frame(&mut ws, &invoke(9, "get-plugins", vec![])).await;

    // THEN
    let (request_id, outcome) = expect_response(receive_frame(&mut ws).await);
    let error = expect_error(outcome);
    assert_eq!(request_id, 9);
    assert_eq!(error.name, "NoHandler");
    assert_eq!(error.message, "No handler registered for 'get-plugins'");
}

/// **VALUE**: Verifies the channel window is enforced over the wire.
///
/// **WHY THIS MATTERS**: A runaway front-end loop must not flood the backend.
///
/// **BUG THIS CATCHES**: Would catch rate limiting only applied to local dispatch.
#[tokio::test]
async fn given_throttled_channel_when_window_exhausted_then_rate_limit_exceeded() {
    // GIVEN
    let server = start_test_ipc_server(RuntimeEnvironment::Production).await;
    let mut ws = authenticated_client(server.port()).await;

    // WHEN: One more call than the window admits, sent sequentially
    let mut outcomes = Vec::new();
    for request_id in 1..=u64::from(THROTTLED_LIMIT) + 1 {
        send_frame(&mut ws, &invoke(request_id, THROTTLED_CHANNEL, vec![])).await;
        outcomes.push(expect_response(receive_frame(&mut ws).await).1);
    }

    // THEN
    let rejected = outcomes.pop().map(expect_error).expect("Last outcome present");
    assert!(outcomes.iter().all(|outcome| matches!(outcome, IpcOutcome::Ok { .. })));
    assert_eq!(rejected.name, "RateLimitExceeded");
    assert_eq!(
        rejected.message,
        format!("Rate limit exceeded for channel '{THROTTLED_CHANNEL}'")
    );
}

// ----------------------------------------------------------------------------
// Framing
// ----------------------------------------------------------------------------

/// **VALUE**: Verifies a malformed frame gets a protocol error and the
/// connection stays usable.
///
/// **WHY THIS MATTERS**: One bad frame must not tear down every pending call.
///
/// **BUG THIS CATCHES**: Would catch decode errors closing the socket.
#[tokio::test]
async fn given_malformed_frame_when_sent_then_protocol_error_and_connection_usable() {
    // GIVEN
    let server = start_test_ipc_server(RuntimeEnvironment::Production).await;
    let mut ws = authenticated_client(server.port()).await;

    // WHEN
    ws.send(Message::Text(String::from("{ \"type\": \"nonsense\" }").into()))
        .await
        .expect("Failed to send frame");

    // THEN
    match receive_frame(&mut ws).await {
        IpcServerMessage::ProtocolError { request_id, message } => {
            assert_eq!(request_id, None);
            assert!(message.starts_with("Invalid message:"));
        }
        other => panic!("Expected protocol error, got {other:?}"),
    }

    send_frame(&mut ws, &invoke(2, "echo", vec![json!(1)])).await;
    let (request_id, _) = expect_response(receive_frame(&mut ws).await);
    assert_eq!(request_id, 2);
}

/// **VALUE**: Verifies one-way sends are never answered.
///
/// **WHY THIS MATTERS**: A stray response would be matched against no request
/// and confuse the client's correlation table.
///
/// **BUG THIS CATCHES**: Would catch `send` frames answered like `invoke`.
#[tokio::test]
async fn given_one_way_send_when_followed_by_invoke_then_only_invoke_answered() {
    // GIVEN
    let server = start_test_ipc_server(RuntimeEnvironment::Production).await;
    let mut ws = authenticated_client(server.port()).await;

    // WHEN
    send_frame(
        &mut ws,
        &IpcClientMessage::Send {
            channel: String::from("log-event"),
            args: vec![json!("opened settings")],
        },
    )
    .await;
    send_frame(&mut ws, &invoke(11, "echo", vec![])).await;

    // THEN
    let (request_id, _) = expect_response(receive_frame(&mut ws).await);
    assert_eq!(request_id, 11);
}

// ----------------------------------------------------------------------------
// Lifecycle
// ----------------------------------------------------------------------------

/// **VALUE**: Verifies shutdown stops accepting connections.
///
/// **WHY THIS MATTERS**: The host must release its port on exit.
///
/// **BUG THIS CATCHES**: Would catch an accept loop that ignores the shutdown token.
#[tokio::test]
async fn given_running_server_when_shutdown_then_refuses_connections() {
    // GIVEN
    let server = start_test_ipc_server(RuntimeEnvironment::Production).await;
    let port = server.port();

    // WHEN
    server.handle.shutdown().await;

    // THEN
    let result = connect_async(format!("ws://127.0.0.1:{port}")).await;
    assert!(result.is_err());
}
