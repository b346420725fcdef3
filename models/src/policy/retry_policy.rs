use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;
pub const DEFAULT_MAX_DELAY_MS: u64 = 5000;

/// Error message fragments that mark a failure as transient.
pub const DEFAULT_RETRYABLE_ERROR_PATTERNS: [&str; 5] = [
    "TIMEOUT",
    "ECONNREFUSED",
    "ECONNRESET",
    "ENOTFOUND",
    "Network error",
];

/// Retry behavior for one logical call.
///
/// Resolved once per call and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub retryable_error_patterns: BTreeSet<String>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            retryable_error_patterns: DEFAULT_RETRYABLE_ERROR_PATTERNS
                .iter()
                .map(|pattern| pattern.to_string())
                .collect(),
        }
    }
}

/// Partial [`RetryPolicy`]. Absent fields keep whatever they are merged onto.
///
/// Used both for the static per-channel table and for per-call overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelOverride {
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub base_delay_ms: Option<u64>,
    #[serde(default)]
    pub max_delay_ms: Option<u64>,
    #[serde(default)]
    pub retryable_error_patterns: Option<BTreeSet<String>>,
}

impl ChannelOverride {
    pub const fn timing(max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            base_delay_ms: Some(base_delay_ms),
            max_delay_ms: Some(max_delay_ms),
            retryable_error_patterns: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.max_attempts.is_none()
            && self.base_delay_ms.is_none()
            && self.max_delay_ms.is_none()
            && self.retryable_error_patterns.is_none()
    }
}
