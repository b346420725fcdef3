use common::ErrorLocation;

use ipc_core::error::config::ConfigError;
use ipc_core::error::ipc::IpcError;

use models::ModelError;

use std::panic::Location;

use thiserror::Error;

/// Errors that stop the host process.
///
/// Everything here is fatal at startup; nothing crosses the IPC boundary.
#[derive(Debug, Error)]
pub enum HostError {
    /// Error from this App
    #[error("Host Error: {message} {location}")]
    Host {
        message: String,
        location: ErrorLocation,
    },

    /// `config.json` could not be loaded
    #[error("Config Error: {message} {location}")]
    Config {
        message: String,
        location: ErrorLocation,
    },

    /// A built-in handler was rejected by the router
    #[error("Registration Error: {channel}: {message} {location}")]
    Registration {
        channel: String,
        message: String,
        location: ErrorLocation,
    },

    /// The IPC server could not start
    #[error("IPC Error: {message} {location}")]
    Ipc {
        message: String,
        location: ErrorLocation,
    },
}

impl From<ConfigError> for HostError {
    #[track_caller]
    fn from(error: ConfigError) -> Self {
        HostError::Config {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<IpcError> for HostError {
    #[track_caller]
    fn from(error: IpcError) -> Self {
        HostError::Ipc {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl HostError {
    #[track_caller]
    pub fn registration(channel: &str, error: ModelError) -> Self {
        HostError::Registration {
            channel: channel.to_string(),
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
