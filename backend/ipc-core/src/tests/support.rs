//! Shared fakes for unit tests.

use crate::clock::ManualClock;
use crate::error::guard::HandlerError;
use crate::error::invoke::InvokeError;
use crate::error::telemetry::TelemetryError;
use crate::guard::{RequestGuard, handler};
use crate::ipc::router::IpcRouter;
use crate::ipc::transport::Transport;
use crate::policy::ChannelPolicyRegistry;
use crate::retry::RetryOrchestrator;
use crate::telemetry::{TelemetryCapability, TelemetryGate};

use common::ErrorLocation;
use models::{GuardConfig, RetryAttemptEvent, RuntimeEnvironment, SafeError, TelemetryConfig};

use std::collections::VecDeque;
use std::panic::Location;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::future::{BoxFuture, FutureExt, pending};
use log::{Level, LevelFilter, Log, Metadata, Record};
use once_cell::sync::Lazy;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

// ============================================
// TRANSPORT
// ============================================

#[derive(Clone)]
pub enum Step {
    Reply(Result<Value, InvokeError>),
    /// Never settles on its own.
    Hang,
}

pub fn fail(message: &str) -> Step {
    Step::Reply(Err(InvokeError::remote(SafeError::new("Error", message))))
}

pub fn succeed(value: Value) -> Step {
    Step::Reply(Ok(value))
}

/// Plays back scripted steps, then repeats `fallback`.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Step>>,
    fallback: Step,
    calls: AtomicUsize,
    channels: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Step>, fallback: Step) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicUsize::new(0),
            channels: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn channels(&self) -> Vec<String> {
        self.channels.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    fn call(
        &self,
        channel: &str,
        _args: Vec<Value>,
        _cancel: CancellationToken,
    ) -> BoxFuture<'static, Result<Value, InvokeError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.channels.lock().unwrap().push(channel.to_string());
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match step {
            Step::Reply(result) => async move { result }.boxed(),
            Step::Hang => pending().boxed(),
        }
    }

    fn send(
        &self,
        _channel: &str,
        _args: Vec<Value>,
    ) -> BoxFuture<'static, Result<(), InvokeError>> {
        async { Ok(()) }.boxed()
    }
}

// ============================================
// TELEMETRY
// ============================================

#[derive(Default)]
pub struct RecordingTelemetry {
    pub enabled: AtomicBool,
    pub fail_config: AtomicBool,
    pub fail_report: AtomicBool,
    pub config_calls: AtomicUsize,
    pub events: Mutex<Vec<RetryAttemptEvent>>,
}

impl RecordingTelemetry {
    pub fn new(enabled: bool) -> Arc<Self> {
        let telemetry = Self::default();
        telemetry.enabled.store(enabled, Ordering::SeqCst);
        Arc::new(telemetry)
    }

    pub fn events(&self) -> Vec<RetryAttemptEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn config_calls(&self) -> usize {
        self.config_calls.load(Ordering::SeqCst)
    }
}

impl TelemetryCapability for RecordingTelemetry {
    fn get_config(&self) -> BoxFuture<'_, Result<TelemetryConfig, TelemetryError>> {
        async move {
            self.config_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_config.load(Ordering::SeqCst) {
                return Err(TelemetryError::Config {
                    message: String::from("config endpoint unavailable"),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
            Ok(TelemetryConfig {
                enabled: self.enabled.load(Ordering::SeqCst),
            })
        }
        .boxed()
    }

    fn report_event(&self, event: RetryAttemptEvent) -> BoxFuture<'_, Result<(), TelemetryError>> {
        async move {
            if self.fail_report.load(Ordering::SeqCst) {
                return Err(TelemetryError::Report {
                    message: String::from("collector rejected event"),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
            self.events.lock().unwrap().push(event);
            Ok(())
        }
        .boxed()
    }
}

// ============================================
// WIRING
// ============================================

pub fn orchestrator(
    transport: Arc<dyn Transport>,
    telemetry: Arc<RecordingTelemetry>,
) -> RetryOrchestrator {
    let clock = ManualClock::new(0);
    RetryOrchestrator::new(
        Arc::new(ChannelPolicyRegistry::standard()),
        transport,
        Arc::new(TelemetryGate::new(telemetry, clock)),
    )
}

pub fn test_guard(environment: RuntimeEnvironment) -> (RequestGuard, Arc<ManualClock>) {
    let clock = ManualClock::new(1_000_000);
    (RequestGuard::new(environment, clock.clone()), clock)
}

/// Router with one handler that fails with each message in `failures`, then
/// answers `"ok"`. Returns the router and the handler's call counter.
pub fn failing_then_ok_router(
    channel: &str,
    failures: Vec<&'static str>,
) -> (Arc<IpcRouter>, Arc<AtomicUsize>) {
    let (guard, _clock) = test_guard(RuntimeEnvironment::Test);
    let router = Arc::new(IpcRouter::new(guard));
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&calls);
    router
        .register_guarded_handler(
            channel,
            handler(move |_args| {
                let call = counter.fetch_add(1, Ordering::SeqCst);
                let failure = failures.get(call).copied();
                async move {
                    match failure {
                        Some(message) => Err(HandlerError::from(message)),
                        None => Ok(Value::String(String::from("ok"))),
                    }
                }
            }),
            GuardConfig::default(),
            Vec::new(),
        )
        .unwrap();

    (router, calls)
}

// ============================================
// LOG CAPTURE
// ============================================

pub struct CaptureLogger {
    records: Mutex<Vec<(Level, String)>>,
}

impl Log for CaptureLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        self.records
            .lock()
            .unwrap()
            .push((record.level(), record.args().to_string()));
    }

    fn flush(&self) {}
}

static CAPTURE: Lazy<CaptureLogger> = Lazy::new(|| CaptureLogger {
    records: Mutex::new(Vec::new()),
});

/// Install the capture logger (first caller wins) and return it.
pub fn capture_logs() -> &'static CaptureLogger {
    let logger: &'static CaptureLogger = &CAPTURE;
    if log::set_logger(logger).is_ok() {
        log::set_max_level(LevelFilter::Trace);
    }
    logger
}

impl CaptureLogger {
    pub fn records_containing(&self, needle: &str) -> Vec<(Level, String)> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, message)| message.contains(needle))
            .cloned()
            .collect()
    }
}
