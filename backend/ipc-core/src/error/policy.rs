use common::ErrorLocation;
use models::ModelError;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum PolicyError {
    /// A channel is both blacklisted and overridden; which rule wins is undefined.
    #[error("Policy Overlap Error: channel '{channel}' is blacklisted and overridden {location}")]
    Overlap {
        channel: String,
        location: ErrorLocation,
    },

    #[error("Policy Override Error: channel '{channel}': {source} {location}")]
    InvalidOverride {
        channel: String,
        location: ErrorLocation,
        #[source]
        source: ModelError,
    },
}
