use common::ErrorLocation;
use models::SafeError;

use std::panic::Location;

use serde_json::Value;
use thiserror::Error as ThisError;

/// Client-side view of a failed call.
///
/// The retry orchestrator classifies these by message but never rewrites
/// them: the value that ends a call is the value the caller receives.
#[derive(Debug, Clone, ThisError)]
pub enum InvokeError {
    /// The backend answered with a mapped error.
    #[error("Remote Error: {error} {location}")]
    Remote {
        error: SafeError,
        location: ErrorLocation,
    },

    /// The call never produced an answer (connection refused, reset, closed).
    #[error("Transport Error: {message} {location}")]
    Transport {
        message: String,
        location: ErrorLocation,
    },

    #[error("Cancelled Error: call on '{channel}' was cancelled {location}")]
    Cancelled {
        channel: String,
        location: ErrorLocation,
    },

    /// The backend rejected with something that is not an error object.
    #[error("Thrown Value: {value} {location}")]
    Thrown {
        value: Value,
        location: ErrorLocation,
    },

    /// Caller-supplied options produced an invalid retry policy.
    #[error("Policy Error: {message} {location}")]
    Policy {
        message: String,
        location: ErrorLocation,
    },
}

impl InvokeError {
    #[track_caller]
    pub fn remote(error: SafeError) -> Self {
        InvokeError::Remote {
            error,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn transport(message: impl Into<String>) -> Self {
        InvokeError::Transport {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn cancelled(channel: impl Into<String>) -> Self {
        InvokeError::Cancelled {
            channel: channel.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Decode the `error` payload of a failed outcome.
    ///
    /// Structured `{name, message}` objects become `Remote`; anything else is
    /// kept verbatim as `Thrown`.
    #[track_caller]
    pub fn from_payload(payload: Value) -> Self {
        let location = ErrorLocation::from(Location::caller());
        match serde_json::from_value::<SafeError>(payload.clone()) {
            Ok(error) => InvokeError::Remote { error, location },
            Err(_) => InvokeError::Thrown {
                value: payload,
                location,
            },
        }
    }

    /// Message used for retry classification.
    ///
    /// `None` for values that are not errors and for cancellations.
    pub fn message(&self) -> Option<&str> {
        match self {
            InvokeError::Remote { error, .. } => Some(&error.message),
            InvokeError::Transport { message, .. } | InvokeError::Policy { message, .. } => {
                Some(message)
            }
            InvokeError::Cancelled { .. } | InvokeError::Thrown { .. } => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, InvokeError::Cancelled { .. })
    }
}
