use ipc_host::handlers::{GET_APP_VERSION, LOG_EVENT, PING};
use ipc_host::host::start_host;

use ipc_core::clock::SystemClock;
use ipc_core::config::AppConfig;
use ipc_core::ipc::{LocalTransport, Transport, WsTransport};
use ipc_core::policy::ChannelPolicyRegistry;
use ipc_core::retry::{InvokeOptions, RetryOrchestrator};
use ipc_core::telemetry::TelemetryGate;

use models::{GuardConfig, RuntimeEnvironment};

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

// ============================================================================
// Host wiring tests
// These start a real host on an ephemeral port and talk to it as a front-end
// ============================================================================

fn ephemeral_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.server.ipc_port = 0;
    config
}

fn orchestrator(transport: Arc<dyn Transport>) -> RetryOrchestrator {
    RetryOrchestrator::new(
        Arc::new(ChannelPolicyRegistry::standard()),
        transport,
        Arc::new(TelemetryGate::disabled(Arc::new(SystemClock))),
    )
}

/// **VALUE**: Verifies a started host answers its built-in channels over the socket.
///
/// **WHY THIS MATTERS**: This is the front-end's first contact with the backend.
///
/// **BUG THIS CATCHES**: Would catch the handoff port differing from the bound
/// port, or built-ins never being registered.
#[tokio::test]
async fn given_started_host_when_pinging_over_websocket_then_pong() {
    // GIVEN
    let runtime = start_host(&ephemeral_config(), RuntimeEnvironment::Test)
        .await
        .expect("Host should start");
    assert_ne!(runtime.ipc_config.port(), 0);
    let transport = WsTransport::connect(
        runtime.ipc_config.port(),
        runtime.ipc_config.auth_token(),
        Duration::from_secs(2),
    )
    .await
    .expect("Front-end should connect");
    let orchestrator = orchestrator(Arc::new(transport));

    // WHEN
    let pong = orchestrator
        .invoke(PING, vec![], InvokeOptions::new())
        .await
        .expect("Ping should succeed");
    let version = orchestrator
        .invoke(GET_APP_VERSION, vec![], InvokeOptions::new())
        .await
        .expect("Version should succeed");

    // THEN
    assert_eq!(pong["pong"], json!(true));
    assert_eq!(version, json!(env!("CARGO_PKG_VERSION")));

    runtime.shutdown().await;
}

/// **VALUE**: Verifies the one-way log channel validates its message.
///
/// **WHY THIS MATTERS**: Front-end logging must not be a way to write arbitrary
/// shapes into host logs.
///
/// **BUG THIS CATCHES**: Would catch the built-in registered without schemas.
#[tokio::test]
async fn given_started_host_when_logging_event_then_accepted_and_non_string_rejected() {
    // GIVEN
    let runtime = start_host(&ephemeral_config(), RuntimeEnvironment::Test)
        .await
        .expect("Host should start");

    // WHEN
    let accepted = runtime.router.dispatch(LOG_EVENT, vec![json!("opened settings")]).await;
    let transport = LocalTransport::new(Arc::clone(&runtime.router));
    let sent = transport.send(LOG_EVENT, vec![json!(42)]).await;

    // THEN: One-way handlers only ever answer null
    assert_eq!(accepted, Ok(json!(null)));
    assert!(sent.is_ok());
    assert_eq!(runtime.router.guard().in_flight_count(), 0);

    runtime.shutdown().await;
}

/// **VALUE**: Verifies invalid guard settings stop the host before it binds.
///
/// **WHY THIS MATTERS**: A zero timeout would fail every call with a timeout.
///
/// **BUG THIS CATCHES**: Would catch the host starting with a broken guard.
#[tokio::test]
async fn given_invalid_guard_config_when_starting_then_registration_error() {
    // GIVEN
    let mut config = ephemeral_config();
    config.guard = GuardConfig {
        max_requests_per_window: 0,
        ..GuardConfig::default()
    };

    // WHEN
    let result = start_host(&config, RuntimeEnvironment::Test).await;

    // THEN
    match result {
        Err(error) => assert!(error.to_string().starts_with("Registration Error: ping")),
        Ok(_) => panic!("Host should refuse to start"),
    }
}
