use common::ErrorLocation;

use std::error::Error as StdError;

use thiserror::Error as ThisError;

/// Error type handlers return. Anything implementing `Error` qualifies.
pub type HandlerError = Box<dyn StdError + Send + Sync>;

pub const VALIDATION_ERROR_NAME: &str = "ValidationError";
pub const RATE_LIMIT_ERROR_NAME: &str = "RateLimitExceeded";
pub const TIMEOUT_ERROR_NAME: &str = "HandlerTimeout";
pub const HANDLER_ERROR_NAME: &str = "Error";
pub const NO_HANDLER_ERROR_NAME: &str = "NoHandler";

/// Every way a guarded invocation can fail on the server side.
///
/// `Display` is for local logs and includes the location. What crosses the
/// process boundary is built from [`GuardError::name`] and
/// [`GuardError::safe_message`] instead.
#[derive(Debug, ThisError)]
pub enum GuardError {
    #[error("Validation Error: {field} {reason} {location}")]
    Validation {
        field: String,
        reason: String,
        location: ErrorLocation,
    },

    #[error("Rate Limit Error: channel '{channel}' {location}")]
    RateLimitExceeded {
        channel: String,
        location: ErrorLocation,
    },

    #[error("Timeout Error: channel '{channel}' after {timeout_ms}ms {location}")]
    HandlerTimeout {
        channel: String,
        timeout_ms: u64,
        location: ErrorLocation,
    },

    #[error("Handler Error: {wrapped} {location}")]
    Handler {
        #[source]
        wrapped: HandlerError,
        location: ErrorLocation,
    },

    #[error("No Handler Error: channel '{channel}' {location}")]
    NoHandler {
        channel: String,
        location: ErrorLocation,
    },
}

impl GuardError {
    pub fn name(&self) -> &'static str {
        match self {
            GuardError::Validation { .. } => VALIDATION_ERROR_NAME,
            GuardError::RateLimitExceeded { .. } => RATE_LIMIT_ERROR_NAME,
            GuardError::HandlerTimeout { .. } => TIMEOUT_ERROR_NAME,
            GuardError::Handler { .. } => HANDLER_ERROR_NAME,
            GuardError::NoHandler { .. } => NO_HANDLER_ERROR_NAME,
        }
    }

    /// Message without internal locations, fit for the front-end.
    pub fn safe_message(&self) -> String {
        match self {
            GuardError::Validation { field, reason, .. } => {
                format!("Validation failed: {field} {reason}")
            }
            GuardError::RateLimitExceeded { channel, .. } => {
                format!("Rate limit exceeded for channel '{channel}'")
            }
            GuardError::HandlerTimeout {
                channel,
                timeout_ms,
                ..
            } => format!("IPC handler timeout: '{channel}' did not respond within {timeout_ms}ms"),
            GuardError::Handler { wrapped, .. } => wrapped.to_string(),
            GuardError::NoHandler { channel, .. } => {
                format!("No handler registered for '{channel}'")
            }
        }
    }

    pub fn location(&self) -> ErrorLocation {
        match self {
            GuardError::Validation { location, .. }
            | GuardError::RateLimitExceeded { location, .. }
            | GuardError::HandlerTimeout { location, .. }
            | GuardError::Handler { location, .. }
            | GuardError::NoHandler { location, .. } => *location,
        }
    }
}
