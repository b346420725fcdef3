//! Client-side retry orchestration.
//!
//! One logical call moves through
//! `Idle → Attempting → (Success | Retrying → Attempting | Failed | Cancelled)`.
//! Attempts are strictly sequential. Blacklisted channels get exactly one
//! attempt and no classification. Telemetry is spawned, never awaited.

pub mod backoff;
pub mod classify;
pub mod options;

pub use options::InvokeOptions;

use crate::error::invoke::InvokeError;
use crate::ipc::transport::Transport;
use crate::policy::ChannelPolicyRegistry;
use crate::retry::backoff::delay_ms;
use crate::retry::classify::is_retryable;
use crate::telemetry::TelemetryGate;

use common::ErrorLocation;
use models::{RetryPolicy, RetryPolicyBuilder};

use std::future::Future;
use std::panic::Location;
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use serde_json::Value;
use tokio::spawn as TokioSpawn;
use tokio::time::{Instant, sleep as TokioSleep};
use tokio_util::sync::CancellationToken;

pub struct RetryOrchestrator {
    registry: Arc<ChannelPolicyRegistry>,
    transport: Arc<dyn Transport>,
    telemetry: Arc<TelemetryGate>,
}

impl RetryOrchestrator {
    pub fn new(
        registry: Arc<ChannelPolicyRegistry>,
        transport: Arc<dyn Transport>,
        telemetry: Arc<TelemetryGate>,
    ) -> Self {
        Self {
            registry,
            transport,
            telemetry,
        }
    }

    pub fn registry(&self) -> &ChannelPolicyRegistry {
        &self.registry
    }

    /// Policy a call on `channel` would run under with `options` applied.
    ///
    /// # Errors
    ///
    /// [`InvokeError::Policy`] if the overrides break a policy invariant.
    #[track_caller]
    pub fn effective_policy(
        &self,
        channel: &str,
        options: &InvokeOptions,
    ) -> Result<RetryPolicy, InvokeError> {
        RetryPolicyBuilder::from_policy(self.registry.resolve_policy(channel))
            .with_override(&options.policy_override())
            .build()
            .map_err(|e| InvokeError::Policy {
                message: e.to_string(),
                location: ErrorLocation::from(Location::caller()),
            })
    }

    /// Invoke `channel`, retrying transient failures per its policy.
    ///
    /// The error that ends the call is returned exactly as the transport
    /// produced it.
    pub async fn invoke(
        &self,
        channel: &str,
        args: Vec<Value>,
        options: InvokeOptions,
    ) -> Result<Value, InvokeError> {
        let cancel = match &options.signal {
            Some(signal) => signal.child_token(),
            None => CancellationToken::new(),
        };

        if self.registry.is_blacklisted(channel) {
            debug!("'{channel}' is retry-blacklisted; single attempt");
            return self.attempt(channel, args, &cancel).await;
        }

        let policy = self.effective_policy(channel, &options)?;
        let started = Instant::now();
        let mut attempt: u32 = 1;

        loop {
            let result = self.attempt(channel, args.clone(), &cancel).await;

            let error = match result {
                Ok(value) => {
                    let total_duration_ms = elapsed_ms(started);
                    options.notify_success(attempt, total_duration_ms);
                    if attempt > 1 {
                        let channel = channel.to_string();
                        self.spawn_telemetry(move |gate| async move {
                            gate.record_success(&channel, attempt, total_duration_ms)
                                .await;
                        });
                    }
                    return Ok(value);
                }
                Err(error) if error.is_cancelled() => return Err(error),
                Err(error) => error,
            };

            if !is_retryable(&error, &policy.retryable_error_patterns)
                || attempt >= policy.max_attempts
            {
                let total_duration_ms = elapsed_ms(started);
                options.notify_failure(&error, attempt, total_duration_ms);
                let channel = channel.to_string();
                let message = describe(&error);
                self.spawn_telemetry(move |gate| async move {
                    gate.record_failure(&channel, attempt, total_duration_ms, &message)
                        .await;
                });
                return Err(error);
            }

            let next_attempt = attempt + 1;
            let delay = delay_ms(&policy, next_attempt);
            options.notify_retry(next_attempt, delay, &error);
            {
                let channel = channel.to_string();
                let total_attempts = policy.max_attempts;
                let message = describe(&error);
                self.spawn_telemetry(move |gate| async move {
                    gate.record_attempt(&channel, next_attempt, total_attempts, delay, &message)
                        .await;
                });
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(InvokeError::cancelled(channel)),
                _ = TokioSleep(Duration::from_millis(delay)) => {}
            }

            attempt = next_attempt;
        }
    }

    /// One transport call, raced against cancellation.
    async fn attempt(
        &self,
        channel: &str,
        args: Vec<Value>,
        cancel: &CancellationToken,
    ) -> Result<Value, InvokeError> {
        if cancel.is_cancelled() {
            return Err(InvokeError::cancelled(channel));
        }

        let call = self.transport.call(channel, args, cancel.clone());

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(InvokeError::cancelled(channel)),
            result = call => result,
        };

        // A late result must not look like a settled call.
        if cancel.is_cancelled() {
            return Err(InvokeError::cancelled(channel));
        }

        result
    }

    fn spawn_telemetry<F, Fut>(&self, report: F)
    where
        F: FnOnce(Arc<TelemetryGate>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        TokioSpawn(report(Arc::clone(&self.telemetry)));
    }
}

/// Text for logs and telemetry events, without capture locations.
fn describe(error: &InvokeError) -> String {
    match error {
        InvokeError::Remote { error, .. } => error.to_string(),
        InvokeError::Thrown { value, .. } => value.to_string(),
        other => other.message().map_or_else(|| other.to_string(), str::to_string),
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
