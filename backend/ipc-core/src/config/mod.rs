//! Host configuration (`config.json`) and runtime environment detection.

use crate::error::config::ConfigError;

use common::ErrorLocation;
use models::{GuardConfig, RuntimeEnvironment};

use std::env;
use std::panic::Location;
use std::path::Path;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_VERSION: u32 = 1;

/// Environment variable naming the runtime environment.
pub const ENVIRONMENT_VAR: &str = "IPC_ENVIRONMENT";

pub const DEFAULT_IPC_PORT: u16 = 19876;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

// ============================================
// CONFIG STRUCTS
// ============================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_ipc_port")]
    pub ipc_port: u16,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ipc_port: default_ipc_port(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub server: ServerConfig,

    /// Guard settings applied to every handler the host registers.
    #[serde(default)]
    pub guard: GuardConfig,

    /// Wins over `IPC_ENVIRONMENT` when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<RuntimeEnvironment>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            server: ServerConfig::default(),
            guard: GuardConfig::default(),
            environment: None,
        }
    }
}

// ============================================
// DEFAULT FUNCTIONS
// ============================================

fn default_version() -> u32 {
    CONFIG_VERSION
}
fn default_ipc_port() -> u16 {
    DEFAULT_IPC_PORT
}
fn default_connect_timeout_secs() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

// ============================================
// IMPLEMENTATION
// ============================================

impl AppConfig {
    /// Load config from {config_dir}/config.json.
    ///
    /// Returns defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] if the file exists but cannot be read, parsed or validated.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            info!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path).map_err(|e| {
            warn!("Failed to read config file: {e}");
            ConfigError::ReadError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                source: e,
            }
        })?;

        let config: AppConfig = serde_json::from_str(&contents).map_err(|e| {
            warn!("Failed to parse config JSON: {e}");
            ConfigError::ParseError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                reason: e.to_string(),
            }
        })?;

        config.validate()?;

        info!("Config loaded from {}", config_path.display());
        Ok(config)
    }

    /// Save config to {config_dir}/config.json via temp file + rename.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] if validation, directory creation, serialization,
    /// the write or the rename fails.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        std::fs::create_dir_all(config_dir).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_dir.to_path_buf(),
            source: e,
        })?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let temp_path = config_dir.join(format!("{CONFIG_FILE_NAME}.tmp"));

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
            location: ErrorLocation::from(Location::caller()),
            reason: e.to_string(),
        })?;

        std::fs::write(&temp_path, json).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: temp_path.clone(),
            source: e,
        })?;

        std::fs::rename(&temp_path, &config_path).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_path.clone(),
            source: e,
        })?;

        info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// # Errors
    ///
    /// [`ConfigError::ValidationError`] if any value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version == 0 || self.version > CONFIG_VERSION {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "Invalid version: {} (expected 1-{CONFIG_VERSION})",
                    self.version
                ),
            });
        }

        if self.server.ipc_port == 0 {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: String::from("ipc_port must be non-zero"),
            });
        }

        if self.server.connect_timeout_secs == 0 {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: String::from("connect_timeout_secs must be greater than 0"),
            });
        }

        self.guard.validate()?;

        Ok(())
    }

    /// The configured environment, or [`detect_environment`] when unset.
    pub fn resolve_environment(&self) -> RuntimeEnvironment {
        match self.environment {
            Some(environment) => environment,
            None => detect_environment(),
        }
    }
}

/// Read `IPC_ENVIRONMENT`, loading a `.env` file first when one exists.
///
/// Unset or unrecognized values resolve to production.
pub fn detect_environment() -> RuntimeEnvironment {
    if let Ok(path) = dotenvy::dotenv() {
        debug!("Loaded .env from: {path:?}");
    }
    environment_from_var()
}

/// Like [`detect_environment`] without touching `.env`.
pub fn environment_from_var() -> RuntimeEnvironment {
    match env::var(ENVIRONMENT_VAR) {
        Ok(value) => RuntimeEnvironment::from_name(&value).unwrap_or_else(|| {
            warn!("Unrecognized {ENVIRONMENT_VAR}={value:?}, assuming production");
            RuntimeEnvironment::Production
        }),
        Err(_) => RuntimeEnvironment::Production,
    }
}
