use crate::error::guard::{GuardError, HandlerError};
use crate::guard::{GuardedHandler, HandlerMode, handler};
use crate::tests::support::{capture_logs, test_guard};

use models::{GuardConfig, GuardConfigBuilder, RuntimeEnvironment, ValidationSchema};

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use log::Level;
use serde_json::{Value, json};
use serial_test::serial;
use tokio::sync::oneshot;

fn explode() -> Result<Value, HandlerError> {
    panic!("boom")
}

fn echo(channel: &str, config: GuardConfig, schemas: Vec<ValidationSchema>) -> GuardedHandler {
    GuardedHandler::new(
        channel,
        handler(|args| async move { Ok(Value::Array(args)) }),
        config,
        schemas,
        HandlerMode::TwoWay,
    )
}

/// **VALUE**: Verifies a slow handler loses the race against its timeout.
///
/// **WHY THIS MATTERS**: A hung handler must not hold the front-end forever.
///
/// **BUG THIS CATCHES**: Would catch a timeout that is configured but never raced,
/// or a message that drops the channel name or the configured timeout.
#[tokio::test(start_paused = true)]
async fn given_slow_handler_when_timeout_elapses_then_handler_timeout() {
    // GIVEN: 50ms timeout, handler that sleeps a minute
    let (guard, _clock) = test_guard(RuntimeEnvironment::Production);
    let config = GuardConfigBuilder::default().with_timeout_ms(50).build().unwrap();
    let registration = GuardedHandler::new(
        "get-websites",
        handler(|_args| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Value::Null)
        }),
        config,
        Vec::new(),
        HandlerMode::TwoWay,
    );

    // WHEN
    let error = guard.invoke(&registration, vec![], "local").await.unwrap_err();

    // THEN
    assert_eq!(error.name, "HandlerTimeout");
    assert_eq!(
        error.message,
        "IPC handler timeout: 'get-websites' did not respond within 50ms"
    );
    assert_eq!(guard.in_flight_count(), 0);
}

/// **VALUE**: Verifies the in-flight record exists while the handler runs and is
/// gone afterwards.
///
/// **WHY THIS MATTERS**: The in-flight view is what diagnostics use to spot stuck
/// calls; leaked entries make it lie.
///
/// **BUG THIS CATCHES**: Would catch removal skipped on the success path, or a
/// record created after the handler already ran.
#[tokio::test]
async fn given_running_handler_when_observing_then_in_flight_then_cleared() {
    // GIVEN: A handler blocked on a oneshot
    let (guard, _clock) = test_guard(RuntimeEnvironment::Production);
    let guard = Arc::new(guard);
    let (release_tx, release_rx) = oneshot::channel::<()>();
    let release_rx = Arc::new(tokio::sync::Mutex::new(Some(release_rx)));
    let registration = GuardedHandler::new(
        "get-website-content",
        handler(move |_args| {
            let release_rx = Arc::clone(&release_rx);
            async move {
                if let Some(rx) = release_rx.lock().await.take() {
                    let _ = rx.await;
                }
                Ok(json!("content"))
            }
        }),
        GuardConfig::default(),
        Vec::new(),
        HandlerMode::TwoWay,
    );

    // WHEN: Invoked in the background
    let task = {
        let guard = Arc::clone(&guard);
        tokio::spawn(async move {
            guard
                .invoke(&registration, vec![json!(1), json!(2)], "peer-1")
                .await
        })
    };
    while guard.in_flight_count() == 0 {
        tokio::task::yield_now().await;
    }

    // THEN: One record with the call's metadata
    let snapshot = guard.in_flight();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].channel, "get-website-content");
    assert_eq!(snapshot[0].caller, "peer-1");
    assert_eq!(snapshot[0].arg_count, 2);

    // WHEN: Released
    release_tx.send(()).unwrap();
    let value = task.await.unwrap().unwrap();

    // THEN
    assert_eq!(value, json!("content"));
    assert_eq!(guard.in_flight_count(), 0);
}

/// **VALUE**: Verifies a validation failure never reaches the handler and leaves
/// no in-flight record.
///
/// **WHY THIS MATTERS**: Validation is the privileged side's first line of defence.
///
/// **BUG THIS CATCHES**: Would catch validation after execution, or an early
/// return that skips record removal.
#[tokio::test]
async fn given_invalid_args_when_invoking_then_validation_error_and_handler_not_called() {
    // GIVEN
    let (guard, _clock) = test_guard(RuntimeEnvironment::Production);
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let registration = GuardedHandler::new(
        "save-website",
        handler(move |_args| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(Value::Null) }
        }),
        GuardConfig::default(),
        vec![ValidationSchema::object([("name", ValidationSchema::string().required())])],
        HandlerMode::TwoWay,
    );

    // WHEN
    let error = guard
        .invoke(&registration, vec![json!({ "name": 5 })], "local")
        .await
        .unwrap_err();

    // THEN
    assert_eq!(error.name, "ValidationError");
    assert_eq!(error.message, "Validation failed: argument[0].name must be of type string");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(guard.in_flight_count(), 0);
}

/// **VALUE**: Verifies disabling validation lets any shape through.
///
/// **WHY THIS MATTERS**: Some handlers do their own parsing and opt out.
///
/// **BUG THIS CATCHES**: Would catch the `validate` flag being ignored.
#[tokio::test]
async fn given_validation_disabled_when_invoking_then_schema_ignored() {
    // GIVEN
    let (guard, _clock) = test_guard(RuntimeEnvironment::Production);
    let config = GuardConfigBuilder::default().with_validate(false).build().unwrap();
    let registration = echo("get-dns-records", config, vec![ValidationSchema::number().required()]);

    // WHEN
    let value = guard.invoke(&registration, vec![json!("not a number")], "local").await.unwrap();

    // THEN
    assert_eq!(value, json!(["not a number"]));
}

/// **VALUE**: Verifies the handler receives sanitized arguments, and raw ones when
/// sanitizing is off.
///
/// **WHY THIS MATTERS**: Handlers write these values to disk and render them.
///
/// **BUG THIS CATCHES**: Would catch sanitizing the copy that is then discarded.
#[tokio::test]
async fn given_script_payload_when_invoking_then_handler_sees_sanitized_args() {
    // GIVEN
    let (guard, _clock) = test_guard(RuntimeEnvironment::Production);
    let sanitizing = echo("save-website", GuardConfig::default(), Vec::new());
    let raw_config = GuardConfigBuilder::default().with_sanitize(false).build().unwrap();
    let raw = echo("update-website-settings", raw_config, Vec::new());
    let payload = vec![json!({ "body": " <script>x()</script>Hi " })];

    // WHEN
    let cleaned = guard.invoke(&sanitizing, payload.clone(), "local").await.unwrap();
    let untouched = guard.invoke(&raw, payload.clone(), "local").await.unwrap();

    // THEN
    assert_eq!(cleaned, json!([{ "body": "Hi" }]));
    assert_eq!(untouched, Value::Array(payload));
}

/// **VALUE**: Verifies handler errors keep only name and message in production
/// and carry a stack in development.
///
/// **WHY THIS MATTERS**: Stacks leak file paths and internals to the renderer.
///
/// **BUG THIS CATCHES**: Would catch stacks attached regardless of environment.
#[tokio::test]
async fn given_handler_error_when_mapping_then_stack_only_outside_production() {
    // GIVEN: The same failing handler under two environments
    let failing = GuardedHandler::new(
        "delete-website",
        handler(|_args| async { Err(HandlerError::from("disk full")) }),
        GuardConfig::default(),
        Vec::new(),
        HandlerMode::TwoWay,
    );
    let (production, _) = test_guard(RuntimeEnvironment::Production);
    let (development, _) = test_guard(RuntimeEnvironment::Development);

    // WHEN
    let stripped = production.invoke(&failing, vec![], "local").await.unwrap_err();
    let detailed = development.invoke(&failing, vec![], "local").await.unwrap_err();

    // THEN
    assert_eq!(stripped.name, "Error");
    assert_eq!(stripped.message, "disk full");
    assert_eq!(stripped.stack, None);

    assert_eq!(detailed.message, "disk full");
    let stack = detailed.stack.expect("development keeps the stack");
    assert!(stack.contains("disk full"));
    assert!(stack.contains("Caused by"));
}

/// **VALUE**: Verifies a panicking handler becomes an ordinary error.
///
/// **WHY THIS MATTERS**: One buggy handler must not take down the connection task.
///
/// **BUG THIS CATCHES**: Would catch handlers polled inline, where the panic would
/// unwind through the guard and leak the in-flight record.
#[tokio::test]
async fn given_panicking_handler_when_invoking_then_handler_panicked_error() {
    // GIVEN
    let (guard, _clock) = test_guard(RuntimeEnvironment::Production);
    let registration = GuardedHandler::new(
        "get-monitors",
        handler(|_args| async { explode() }),
        GuardConfig::default(),
        Vec::new(),
        HandlerMode::TwoWay,
    );

    // WHEN
    let error = guard.invoke(&registration, vec![], "local").await.unwrap_err();

    // THEN
    assert_eq!(error.name, "Error");
    assert_eq!(error.message, "Handler panicked");
    assert_eq!(guard.in_flight_count(), 0);
}

/// **VALUE**: Verifies two-way calls over the window are rejected and the window
/// reopens once `rate_limit_ms` has passed.
///
/// **WHY THIS MATTERS**: The guard, not each handler, owns throttling.
///
/// **BUG THIS CATCHES**: Would catch the guard not consulting the limiter, or
/// using wall time instead of the injected clock.
#[tokio::test]
async fn given_window_exhausted_when_invoking_then_rate_limit_exceeded_until_elapsed() {
    // GIVEN: 2 calls per 1000ms
    let (guard, clock) = test_guard(RuntimeEnvironment::Production);
    let config = GuardConfigBuilder::default()
        .with_max_requests_per_window(2)
        .build()
        .unwrap();
    let registration = echo("get-certificates", config, Vec::new());

    // WHEN: 3 calls
    guard.invoke(&registration, vec![], "local").await.unwrap();
    guard.invoke(&registration, vec![], "local").await.unwrap();
    let error = guard.invoke(&registration, vec![], "local").await.unwrap_err();

    // THEN
    assert_eq!(error.name, "RateLimitExceeded");
    assert_eq!(error.message, "Rate limit exceeded for channel 'get-certificates'");

    // WHEN: Window elapses
    clock.advance(1000);

    // THEN
    guard.invoke(&registration, vec![], "local").await.unwrap();
}

/// **VALUE**: Verifies a two-way rate-limit rejection leaves one completion line.
///
/// **WHY THIS MATTERS**: Throttled calls are failed completions; without a log
/// line a flood against one channel is invisible on the server side.
///
/// **BUG THIS CATCHES**: Would catch the early return skipping the log.
#[tokio::test]
#[serial]
async fn given_window_exhausted_when_invoking_then_rejection_logged_with_status() {
    // GIVEN: 1 call per window
    let logs = capture_logs();
    let (guard, _clock) = test_guard(RuntimeEnvironment::Production);
    let config = GuardConfigBuilder::default()
        .with_max_requests_per_window(1)
        .build()
        .unwrap();
    let registration = echo("get-ssl-expiry", config, Vec::new());

    // WHEN
    guard.invoke(&registration, vec![], "local").await.unwrap();
    guard.invoke(&registration, vec![], "local").await.unwrap_err();

    // THEN
    let records =
        logs.records_containing("channel=get-ssl-expiry caller=local status=RateLimitExceeded");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].0, Level::Warn);
}

/// **VALUE**: Verifies one-way messages over the limit are dropped silently.
///
/// **WHY THIS MATTERS**: Fire-and-forget senders have nobody to receive an error.
///
/// **BUG THIS CATCHES**: Would catch the dropped message still reaching the handler.
#[tokio::test]
async fn given_one_way_over_limit_when_notifying_then_dropped() {
    // GIVEN: 2 per window
    let (guard, _clock) = test_guard(RuntimeEnvironment::Production);
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let config = GuardConfigBuilder::default()
        .with_max_requests_per_window(2)
        .build()
        .unwrap();
    let registration = GuardedHandler::new(
        "set-window-placement",
        handler(move |_args| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(Value::Null) }
        }),
        config,
        Vec::new(),
        HandlerMode::OneWay,
    );

    // WHEN
    for _ in 0..3 {
        guard.notify(&registration, vec![], "local").await;
    }

    // THEN
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

/// **VALUE**: Verifies the raw error keeps its variant for local callers.
///
/// **WHY THIS MATTERS**: The router and tests branch on the variant; only the
/// boundary flattens it.
///
/// **BUG THIS CATCHES**: Would catch `execute` returning an already-mapped error.
#[tokio::test(start_paused = true)]
async fn given_timeout_when_executing_then_raw_variant_carries_channel_and_ms() {
    // GIVEN
    let (guard, _clock) = test_guard(RuntimeEnvironment::Production);
    let config = GuardConfigBuilder::default().with_timeout_ms(10).build().unwrap();
    let registration = GuardedHandler::new(
        "commit-website-changes",
        handler(|_args| futures_util::future::pending::<Result<Value, HandlerError>>()),
        config,
        Vec::new(),
        HandlerMode::TwoWay,
    );

    // WHEN
    let error = guard.execute(&registration, vec![], "local").await.unwrap_err();

    // THEN
    match error {
        GuardError::HandlerTimeout { channel, timeout_ms, .. } => {
            assert_eq!(channel, "commit-website-changes");
            assert_eq!(timeout_ms, 10);
        }
        other => panic!("Expected timeout, got {other:?}"),
    }
}
