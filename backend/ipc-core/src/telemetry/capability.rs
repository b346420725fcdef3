//! External telemetry collaborator.

use crate::error::telemetry::TelemetryError;

use models::{RetryAttemptEvent, TelemetryConfig};

use futures_util::future::{BoxFuture, FutureExt};

/// Whatever the host uses to ship retry events off-box.
pub trait TelemetryCapability: Send + Sync {
    fn get_config(&self) -> BoxFuture<'_, Result<TelemetryConfig, TelemetryError>>;

    fn report_event(&self, event: RetryAttemptEvent) -> BoxFuture<'_, Result<(), TelemetryError>>;
}

/// Capability for hosts without telemetry. Always reports `enabled: false`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledTelemetry;

impl TelemetryCapability for DisabledTelemetry {
    fn get_config(&self) -> BoxFuture<'_, Result<TelemetryConfig, TelemetryError>> {
        async { Ok(TelemetryConfig { enabled: false }) }.boxed()
    }

    fn report_event(&self, _event: RetryAttemptEvent) -> BoxFuture<'_, Result<(), TelemetryError>> {
        async { Ok(()) }.boxed()
    }
}
