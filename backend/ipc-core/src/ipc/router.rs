//! Channel → guarded handler table.
//!
//! The router is the server registration surface. Every dispatch goes
//! through the shared [`RequestGuard`], so rate-limit windows and in-flight
//! bookkeeping are per router.

use crate::error::guard::GuardError;
use crate::guard::safe_error::to_safe_error;
use crate::guard::{GuardedHandler, Handler, HandlerMode, RequestGuard};

use common::ErrorLocation;
use models::{GuardConfig, ModelError, SafeError, ValidationSchema};

use std::collections::HashMap;
use std::panic::Location;
use std::sync::RwLock;

use log::{info, warn};
use serde_json::Value;

/// Caller tag for in-process dispatches.
pub const LOCAL_CALLER: &str = "local";

pub struct IpcRouter {
    guard: RequestGuard,
    handlers: RwLock<HashMap<String, GuardedHandler>>,
}

impl IpcRouter {
    pub fn new(guard: RequestGuard) -> Self {
        Self {
            guard,
            handlers: RwLock::new(HashMap::new()),
        }
    }

    pub fn guard(&self) -> &RequestGuard {
        &self.guard
    }

    /// Register a two-way handler behind the guard.
    ///
    /// Replaces any handler already on `channel`.
    ///
    /// # Errors
    ///
    /// [`ModelError::Validation`] if `config` breaks a guard invariant.
    pub fn register_guarded_handler(
        &self,
        channel: impl Into<String>,
        handler: Handler,
        config: GuardConfig,
        schemas: Vec<ValidationSchema>,
    ) -> Result<(), ModelError> {
        self.register(channel.into(), handler, config, schemas, HandlerMode::TwoWay)
    }

    /// Register a fire-and-forget handler behind the guard.
    ///
    /// # Errors
    ///
    /// [`ModelError::Validation`] if `config` breaks a guard invariant.
    pub fn register_one_way_handler(
        &self,
        channel: impl Into<String>,
        handler: Handler,
        config: GuardConfig,
        schemas: Vec<ValidationSchema>,
    ) -> Result<(), ModelError> {
        self.register(channel.into(), handler, config, schemas, HandlerMode::OneWay)
    }

    pub fn unregister(&self, channel: &str) -> bool {
        self.write_handlers().remove(channel).is_some()
    }

    pub fn channels(&self) -> Vec<String> {
        let mut channels: Vec<String> = self.read_handlers().keys().cloned().collect();
        channels.sort();
        channels
    }

    /// Dispatch an in-process call.
    pub async fn dispatch(&self, channel: &str, args: Vec<Value>) -> Result<Value, SafeError> {
        self.dispatch_from(LOCAL_CALLER, channel, args).await
    }

    /// Dispatch a call on behalf of `caller`.
    ///
    /// A one-way handler reached this way still runs, but the caller only
    /// ever sees `null`.
    pub async fn dispatch_from(
        &self,
        caller: &str,
        channel: &str,
        args: Vec<Value>,
    ) -> Result<Value, SafeError> {
        let Some(registration) = self.lookup(channel) else {
            warn!("No handler registered for '{channel}' (caller {caller})");
            let error = GuardError::NoHandler {
                channel: channel.to_string(),
                location: ErrorLocation::from(Location::caller()),
            };
            return Err(to_safe_error(&error, self.guard.environment()));
        };

        match registration.mode {
            HandlerMode::TwoWay => self.guard.invoke(&registration, args, caller).await,
            HandlerMode::OneWay => {
                self.guard.notify(&registration, args, caller).await;
                Ok(Value::Null)
            }
        }
    }

    /// Deliver a one-way message. Nothing is returned, whatever happens.
    pub async fn dispatch_one_way(&self, caller: &str, channel: &str, args: Vec<Value>) {
        match self.lookup(channel) {
            Some(registration) => self.guard.notify(&registration, args, caller).await,
            None => warn!("Dropped one-way message on '{channel}' (caller {caller}): no handler"),
        }
    }

    fn register(
        &self,
        channel: String,
        handler: Handler,
        config: GuardConfig,
        schemas: Vec<ValidationSchema>,
        mode: HandlerMode,
    ) -> Result<(), ModelError> {
        config.validate()?;

        let registration = GuardedHandler::new(channel.clone(), handler, config, schemas, mode);
        if self
            .write_handlers()
            .insert(channel.clone(), registration)
            .is_some()
        {
            warn!("Replaced existing handler on '{channel}'");
        } else {
            info!("Registered {mode:?} handler on '{channel}'");
        }

        Ok(())
    }

    fn lookup(&self, channel: &str) -> Option<GuardedHandler> {
        self.read_handlers().get(channel).cloned()
    }

    fn read_handlers(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, GuardedHandler>> {
        self.handlers.read().unwrap_or_else(|poisoned| {
            warn!("Handler table lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write_handlers(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, GuardedHandler>> {
        self.handlers.write().unwrap_or_else(|poisoned| {
            warn!("Handler table lock poisoned, recovering");
            poisoned.into_inner()
        })
    }
}
