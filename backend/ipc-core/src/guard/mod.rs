//! Server-side request guard.
//!
//! Every registered handler runs through the same pipeline:
//! rate limit → validation → sanitization → timeout-wrapped execution →
//! safe-error mapping. Each stage lives in its own module; this one owns the
//! ordering, the in-flight bookkeeping and the completion log line.

pub mod in_flight;
pub mod rate_limit;
pub mod safe_error;
pub mod sanitize;
pub mod timeout;
pub mod validation;

pub use in_flight::{InFlightRegistry, InFlightRequest};
pub use timeout::HandlerFuture;

use crate::clock::Clock;
use crate::error::guard::{GuardError, HandlerError};
use crate::guard::rate_limit::RateLimiter;
use crate::guard::safe_error::to_safe_error;
use crate::guard::sanitize::sanitize_args;
use crate::guard::timeout::run_with_timeout;
use crate::guard::validation::validate_args;

use common::ErrorLocation;
use models::{GuardConfig, RuntimeEnvironment, SafeError, ValidationSchema};

use std::fmt::{Debug, Formatter, Result as FormatResult};
use std::future::Future;
use std::panic::Location;
use std::sync::Arc;

use log::{debug, error, info, warn};
use serde_json::Value;
use tokio::time::Instant;
use uuid::Uuid;

/// Type-erased async handler: positional arguments in, JSON value out.
pub type Handler = Arc<dyn Fn(Vec<Value>) -> HandlerFuture + Send + Sync>;

/// Wrap an async closure as a [`Handler`].
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
{
    Arc::new(move |args| Box::pin(f(args)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerMode {
    /// Caller awaits a response; guard failures are returned.
    TwoWay,
    /// Fire-and-forget; guard failures are logged and dropped.
    OneWay,
}

/// A handler plus everything the guard needs to run it.
#[derive(Clone)]
pub struct GuardedHandler {
    pub channel: String,
    pub handler: Handler,
    pub config: GuardConfig,
    pub schemas: Vec<ValidationSchema>,
    pub mode: HandlerMode,
}

impl GuardedHandler {
    pub fn new(
        channel: impl Into<String>,
        handler: Handler,
        config: GuardConfig,
        schemas: Vec<ValidationSchema>,
        mode: HandlerMode,
    ) -> Self {
        let channel = channel.into();
        debug!(
            "Guarded handler '{channel}': timeout={}ms validate={} sanitize={} retries={} window={}ms/{} mode={mode:?}",
            config.timeout_ms,
            config.validate,
            config.sanitize,
            config.retries,
            config.rate_limit_ms,
            config.max_requests_per_window,
        );

        Self {
            channel,
            handler,
            config,
            schemas,
            mode,
        }
    }
}

impl Debug for GuardedHandler {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        formatter
            .debug_struct("GuardedHandler")
            .field("channel", &self.channel)
            .field("config", &self.config)
            .field("schemas", &self.schemas)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

pub struct RequestGuard {
    rate_limiter: RateLimiter,
    in_flight: Arc<InFlightRegistry>,
    environment: RuntimeEnvironment,
    clock: Arc<dyn Clock>,
}

impl RequestGuard {
    pub fn new(environment: RuntimeEnvironment, clock: Arc<dyn Clock>) -> Self {
        Self {
            rate_limiter: RateLimiter::new(Arc::clone(&clock)),
            in_flight: Arc::new(InFlightRegistry::default()),
            environment,
            clock,
        }
    }

    pub fn environment(&self) -> RuntimeEnvironment {
        self.environment
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn in_flight(&self) -> Vec<InFlightRequest> {
        self.in_flight.snapshot()
    }

    /// Run one invocation through the full pipeline, keeping the raw error.
    pub async fn execute(
        &self,
        registration: &GuardedHandler,
        args: Vec<Value>,
        caller: &str,
    ) -> Result<Value, GuardError> {
        let channel = registration.channel.as_str();
        let config = &registration.config;

        if !self.rate_limiter.try_acquire(
            channel,
            config.rate_limit_ms,
            config.max_requests_per_window,
        ) {
            warn!("IPC channel={channel} caller={caller} status=RateLimitExceeded");
            return Err(GuardError::RateLimitExceeded {
                channel: channel.to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let ticket = self.in_flight.track(InFlightRequest {
            channel: channel.to_string(),
            request_id: Uuid::new_v4(),
            start_time_ms: self.clock.now_ms(),
            caller: caller.to_string(),
            arg_count: args.len(),
        });
        let request_id = ticket.request_id();
        let started = Instant::now();

        let result = run_stages(registration, args).await;

        let duration_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => info!(
                "IPC channel={channel} request_id={request_id} duration_ms={duration_ms} status=success"
            ),
            Err(e) => warn!(
                "IPC channel={channel} request_id={request_id} duration_ms={duration_ms} status={} error={e}",
                e.name()
            ),
        }

        drop(ticket);
        result
    }

    /// Two-way entry point: failures leave as [`SafeError`].
    pub async fn invoke(
        &self,
        registration: &GuardedHandler,
        args: Vec<Value>,
        caller: &str,
    ) -> Result<Value, SafeError> {
        self.execute(registration, args, caller)
            .await
            .map_err(|e| to_safe_error(&e, self.environment))
    }

    /// One-way entry point: nothing surfaces to the caller.
    pub async fn notify(&self, registration: &GuardedHandler, args: Vec<Value>, caller: &str) {
        match self.execute(registration, args, caller).await {
            Ok(_) => {}
            Err(GuardError::RateLimitExceeded { channel, .. }) => {
                warn!("Dropped one-way message on '{channel}': rate limit exceeded");
            }
            Err(e) => {
                error!("One-way handler '{}' failed: {e}", registration.channel);
            }
        }
    }
}

async fn run_stages(registration: &GuardedHandler, args: Vec<Value>) -> Result<Value, GuardError> {
    let config = &registration.config;

    if config.validate && !registration.schemas.is_empty() {
        validate_args(&args, &registration.schemas)?;
    }

    let args = if config.sanitize {
        sanitize_args(args)
    } else {
        args
    };

    let handler = Arc::clone(&registration.handler);
    let execution: HandlerFuture = Box::pin(async move { handler(args).await });

    run_with_timeout(&registration.channel, config.timeout(), execution).await
}
