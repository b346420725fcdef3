use crate::error::model_error::ModelError;
use crate::ErrorLocation;

use std::panic::Location;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_RETRIES: u32 = 2;
pub const DEFAULT_RATE_LIMIT_MS: u64 = 1000;
pub const DEFAULT_MAX_REQUESTS_PER_WINDOW: u32 = 10;

// ============================================
// GUARD CONFIG
// ============================================

/// Per-handler settings for the server-side request guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardConfig {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_enabled")]
    pub validate: bool,
    #[serde(default = "default_enabled")]
    pub sanitize: bool,
    /// Advertised retry budget. The guard itself never re-runs a handler.
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_rate_limit_ms")]
    pub rate_limit_ms: u64,
    #[serde(default = "default_max_requests_per_window")]
    pub max_requests_per_window: u32,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            validate: default_enabled(),
            sanitize: default_enabled(),
            retries: default_retries(),
            rate_limit_ms: default_rate_limit_ms(),
            max_requests_per_window: default_max_requests_per_window(),
        }
    }
}

impl GuardConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Check the invariants the builder enforces, for configs that arrived via serde.
    #[track_caller]
    pub fn validate(&self) -> Result<(), ModelError> {
        GuardConfigBuilder::from_config(self.clone()).build().map(|_| ())
    }
}

// ============================================
// DEFAULT FUNCTIONS
// ============================================

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}
fn default_enabled() -> bool {
    true
}
fn default_retries() -> u32 {
    DEFAULT_RETRIES
}
fn default_rate_limit_ms() -> u64 {
    DEFAULT_RATE_LIMIT_MS
}
fn default_max_requests_per_window() -> u32 {
    DEFAULT_MAX_REQUESTS_PER_WINDOW
}

// ============================================
// BUILDER
// ============================================

#[derive(Debug, Default)]
pub struct GuardConfigBuilder {
    config: GuardConfig,
}

impl GuardConfigBuilder {
    pub fn from_config(config: GuardConfig) -> Self {
        Self { config }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.config.timeout_ms = timeout_ms;
        self
    }

    pub fn with_validate(mut self, validate: bool) -> Self {
        self.config.validate = validate;
        self
    }

    pub fn with_sanitize(mut self, sanitize: bool) -> Self {
        self.config.sanitize = sanitize;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.config.retries = retries;
        self
    }

    pub fn with_rate_limit_ms(mut self, rate_limit_ms: u64) -> Self {
        self.config.rate_limit_ms = rate_limit_ms;
        self
    }

    pub fn with_max_requests_per_window(mut self, max_requests: u32) -> Self {
        self.config.max_requests_per_window = max_requests;
        self
    }

    #[track_caller]
    pub fn build(self) -> Result<GuardConfig, ModelError> {
        if self.config.timeout_ms == 0 {
            return Err(ModelError::Validation {
                field: "timeout_ms",
                message: String::from("must be greater than 0"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        if self.config.rate_limit_ms == 0 {
            return Err(ModelError::Validation {
                field: "rate_limit_ms",
                message: String::from("must be greater than 0"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        if self.config.max_requests_per_window == 0 {
            return Err(ModelError::Validation {
                field: "max_requests_per_window",
                message: String::from("must be at least 1"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        Ok(self.config)
    }
}
