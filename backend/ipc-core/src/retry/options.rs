//! Per-call options for [`RetryOrchestrator::invoke`](super::RetryOrchestrator::invoke).

use crate::error::invoke::InvokeError;

use models::ChannelOverride;

use std::collections::BTreeSet;
use std::fmt::{Debug, Formatter, Result as FormatResult};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use log::warn;
use tokio_util::sync::CancellationToken;

/// `(attempt about to be made, delay before it, error that caused it)`
pub type OnRetry = Arc<dyn Fn(u32, u64, &InvokeError) + Send + Sync>;
/// `(total attempts, total duration since the first attempt)`
pub type OnSuccess = Arc<dyn Fn(u32, u64) + Send + Sync>;
/// `(final error, total attempts, total duration since the first attempt)`
pub type OnFailure = Arc<dyn Fn(&InvokeError, u32, u64) + Send + Sync>;

/// Caller overrides and lifecycle observers.
///
/// Policy fields are layered on top of the channel's resolved policy. Every
/// callback runs inline with the state transition; a panicking callback is
/// logged and otherwise ignored.
#[derive(Clone, Default)]
pub struct InvokeOptions {
    pub signal: Option<CancellationToken>,
    pub max_attempts: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub retryable_error_patterns: Option<BTreeSet<String>>,
    pub on_retry: Option<OnRetry>,
    pub on_success: Option<OnSuccess>,
    pub on_failure: Option<OnFailure>,
}

impl InvokeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = Some(base_delay_ms);
        self
    }

    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = Some(max_delay_ms);
        self
    }

    pub fn with_retryable_error_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.retryable_error_patterns = Some(patterns.into_iter().map(Into::into).collect());
        self
    }

    pub fn on_retry(
        mut self,
        callback: impl Fn(u32, u64, &InvokeError) + Send + Sync + 'static,
    ) -> Self {
        self.on_retry = Some(Arc::new(callback));
        self
    }

    pub fn on_success(mut self, callback: impl Fn(u32, u64) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(callback));
        self
    }

    pub fn on_failure(
        mut self,
        callback: impl Fn(&InvokeError, u32, u64) + Send + Sync + 'static,
    ) -> Self {
        self.on_failure = Some(Arc::new(callback));
        self
    }

    /// Policy fields as a partial policy for the builder.
    pub fn policy_override(&self) -> ChannelOverride {
        ChannelOverride {
            max_attempts: self.max_attempts,
            base_delay_ms: self.base_delay_ms,
            max_delay_ms: self.max_delay_ms,
            retryable_error_patterns: self.retryable_error_patterns.clone(),
        }
    }

    pub(crate) fn notify_retry(&self, attempt: u32, delay_ms: u64, error: &InvokeError) {
        if let Some(callback) = &self.on_retry {
            guarded("on_retry", || callback(attempt, delay_ms, error));
        }
    }

    pub(crate) fn notify_success(&self, total_attempts: u32, total_duration_ms: u64) {
        if let Some(callback) = &self.on_success {
            guarded("on_success", || callback(total_attempts, total_duration_ms));
        }
    }

    pub(crate) fn notify_failure(
        &self,
        error: &InvokeError,
        total_attempts: u32,
        total_duration_ms: u64,
    ) {
        if let Some(callback) = &self.on_failure {
            guarded("on_failure", || callback(error, total_attempts, total_duration_ms));
        }
    }
}

impl Debug for InvokeOptions {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        formatter
            .debug_struct("InvokeOptions")
            .field("signal", &self.signal)
            .field("max_attempts", &self.max_attempts)
            .field("base_delay_ms", &self.base_delay_ms)
            .field("max_delay_ms", &self.max_delay_ms)
            .field("retryable_error_patterns", &self.retryable_error_patterns)
            .field("on_retry", &self.on_retry.is_some())
            .field("on_success", &self.on_success.is_some())
            .field("on_failure", &self.on_failure.is_some())
            .finish()
    }
}

fn guarded(name: &str, callback: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(callback)).is_err() {
        warn!("Retry lifecycle callback '{name}' panicked; ignoring");
    }
}
