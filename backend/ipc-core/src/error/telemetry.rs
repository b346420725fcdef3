use common::ErrorLocation;

use thiserror::Error as ThisError;

/// Failures talking to the external telemetry capability.
///
/// These are logged by the gate and never reach a caller.
#[derive(Debug, ThisError)]
pub enum TelemetryError {
    #[error("Telemetry Config Error: {message} {location}")]
    Config {
        message: String,
        location: ErrorLocation,
    },

    #[error("Telemetry Report Error: {message} {location}")]
    Report {
        message: String,
        location: ErrorLocation,
    },
}
