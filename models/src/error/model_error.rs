use crate::ErrorLocation;

use thiserror::Error as ThisError;

/// Raised by the builders when a policy or guard config breaks its invariants.
#[derive(Debug, ThisError)]
pub enum ModelError {
    #[error("Validation Error: {field}: {message} {location}")]
    Validation {
        field: &'static str,
        message: String,
        location: ErrorLocation,
    },
}
