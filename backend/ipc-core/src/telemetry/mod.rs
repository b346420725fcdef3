//! Best-effort reporting of retry lifecycle events.
//!
//! The gate caches the capability's `enabled` flag for
//! [`TELEMETRY_CACHE_TTL_MS`]. Every record call logs locally first; only
//! when the flag is set does it also build an event and hand it to the
//! capability. Reporting errors are logged and dropped.

pub mod capability;

pub use capability::{DisabledTelemetry, TelemetryCapability};

use crate::clock::Clock;

use models::RetryAttemptEvent;

use std::sync::{Arc, Mutex};

use log::{debug, error, info, warn};

pub const TELEMETRY_CACHE_TTL_MS: u64 = 60_000;

#[derive(Debug, Clone, Copy)]
struct TelemetryFlagCache {
    enabled: bool,
    last_checked_ms: u64,
}

pub struct TelemetryGate {
    capability: Arc<dyn TelemetryCapability>,
    clock: Arc<dyn Clock>,
    cache: Mutex<Option<TelemetryFlagCache>>,
}

impl TelemetryGate {
    pub fn new(capability: Arc<dyn TelemetryCapability>, clock: Arc<dyn Clock>) -> Self {
        Self {
            capability,
            clock,
            cache: Mutex::new(None),
        }
    }

    /// Gate over [`DisabledTelemetry`].
    pub fn disabled(clock: Arc<dyn Clock>) -> Self {
        Self::new(Arc::new(DisabledTelemetry), clock)
    }

    /// Cached flag; refreshed from the capability once the cache is older
    /// than the TTL. Lookup failures count as disabled and are not cached.
    pub async fn is_enabled(&self) -> bool {
        let now = self.clock.now_ms();

        if let Some(cached) = self.cached() {
            if now.saturating_sub(cached.last_checked_ms) < TELEMETRY_CACHE_TTL_MS {
                return cached.enabled;
            }
        }

        match self.capability.get_config().await {
            Ok(config) => {
                self.store(TelemetryFlagCache {
                    enabled: config.enabled,
                    last_checked_ms: now,
                });
                config.enabled
            }
            Err(e) => {
                debug!("Telemetry config unavailable, treating as disabled: {e}");
                false
            }
        }
    }

    /// A retry was scheduled: `attempt` is the attempt about to run.
    pub async fn record_attempt(
        &self,
        channel: &str,
        attempt: u32,
        total_attempts: u32,
        delay_ms: u64,
        error: &str,
    ) {
        warn!("Retrying '{channel}' (attempt {attempt}/{total_attempts}) in {delay_ms}ms: {error}");

        if !self.is_enabled().await {
            return;
        }

        let event = RetryAttemptEvent {
            channel: channel.to_string(),
            attempt,
            total_attempts,
            delay_ms,
            error: Some(error.to_string()),
            timestamp_ms: self.clock.now_ms(),
            success: false,
            total_duration_ms: None,
        };
        self.report(event).await;
    }

    /// A call succeeded after at least one retry.
    pub async fn record_success(&self, channel: &str, total_attempts: u32, total_duration_ms: u64) {
        info!("'{channel}' succeeded after {total_attempts} attempts in {total_duration_ms}ms");

        if !self.is_enabled().await {
            return;
        }

        let event = RetryAttemptEvent {
            channel: channel.to_string(),
            attempt: total_attempts,
            total_attempts,
            delay_ms: 0,
            error: None,
            timestamp_ms: self.clock.now_ms(),
            success: true,
            total_duration_ms: Some(total_duration_ms),
        };
        self.report(event).await;
    }

    /// A call ended in failure. Always logged at error, enabled or not.
    pub async fn record_failure(
        &self,
        channel: &str,
        total_attempts: u32,
        total_duration_ms: u64,
        error: &str,
    ) {
        error!(
            "'{channel}' failed after {total_attempts} attempts in {total_duration_ms}ms: {error}"
        );

        if !self.is_enabled().await {
            return;
        }

        let event = RetryAttemptEvent {
            channel: channel.to_string(),
            attempt: total_attempts,
            total_attempts,
            delay_ms: 0,
            error: Some(error.to_string()),
            timestamp_ms: self.clock.now_ms(),
            success: false,
            total_duration_ms: Some(total_duration_ms),
        };
        self.report(event).await;
    }

    async fn report(&self, event: RetryAttemptEvent) {
        let channel = event.channel.clone();
        if let Err(e) = self.capability.report_event(event).await {
            warn!("Dropped telemetry event for '{channel}': {e}");
        }
    }

    fn cached(&self) -> Option<TelemetryFlagCache> {
        match self.cache.lock() {
            Ok(cache) => *cache,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn store(&self, entry: TelemetryFlagCache) {
        let mut cache = self.cache.lock().unwrap_or_else(|poisoned| {
            warn!("Telemetry cache lock poisoned, recovering");
            poisoned.into_inner()
        });
        *cache = Some(entry);
    }
}
