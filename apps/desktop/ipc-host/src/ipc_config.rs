//! Connection details the front-end needs to reach the IPC server.

use crate::error::HostError;

use common::{ErrorLocation, RedactedToken};

use std::fs;
use std::panic::Location;
use std::path::{Path, PathBuf};

use log::info;
use serde::Serialize;
use uuid::Uuid;

/// File the front-end reads to find the server.
pub const IPC_HANDOFF_FILE_NAME: &str = "ipc.json";

pub struct IpcConfig {
    port: u16,
    auth_token: RedactedToken,
}

#[derive(Serialize)]
struct IpcHandoff<'a> {
    port: u16,
    auth_token: &'a str,
}

impl IpcConfig {
    pub fn new(port: u16, auth_token: RedactedToken) -> Self {
        Self { port, auth_token }
    }

    /// Fresh random token for one host run.
    pub fn generate(port: u16) -> Self {
        Self::new(port, RedactedToken::new(Uuid::new_v4().to_string()))
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn auth_token(&self) -> &RedactedToken {
        &self.auth_token
    }

    /// Same token, with the port the server actually bound.
    pub fn with_port(self, port: u16) -> Self {
        Self { port, ..self }
    }

    /// Write `{port, auth_token}` to `{dir}/ipc.json` for the front-end.
    ///
    /// # Errors
    ///
    /// [`HostError::Host`] if the file cannot be serialized or written.
    pub fn write_handoff(&self, dir: &Path) -> Result<PathBuf, HostError> {
        let path = dir.join(IPC_HANDOFF_FILE_NAME);
        let json = serde_json::to_string_pretty(&IpcHandoff {
            port: self.port,
            auth_token: self.auth_token.expose(),
        })
        .map_err(|e| HostError::Host {
            message: format!("Failed to encode IPC handoff: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        fs::write(&path, json).map_err(|e| HostError::Host {
            message: format!("Failed to write {}: {e}", path.display()),
            location: ErrorLocation::from(Location::caller()),
        })?;

        info!("IPC connection details written to {}", path.display());
        Ok(path)
    }
}
