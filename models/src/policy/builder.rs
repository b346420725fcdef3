use crate::error::model_error::ModelError;
use crate::{ChannelOverride, ErrorLocation, RetryPolicy};

use std::collections::BTreeSet;
use std::panic::Location;

/// Builder for validated [`RetryPolicy`] instances.
///
/// Starts from a base policy (the default unless given one) and layers
/// partial values on top. `build` enforces the policy invariants.
#[derive(Debug, Default)]
pub struct RetryPolicyBuilder {
    base: RetryPolicy,
    max_attempts: Option<u32>,
    base_delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
    retryable_error_patterns: Option<BTreeSet<String>>,
}

impl RetryPolicyBuilder {
    pub fn from_policy(base: RetryPolicy) -> Self {
        Self {
            base,
            ..Default::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = Some(base_delay_ms);
        self
    }

    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = Some(max_delay_ms);
        self
    }

    pub fn with_retryable_error_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.retryable_error_patterns = Some(patterns.into_iter().map(Into::into).collect());
        self
    }

    /// Layer every field the override specifies. Later calls win.
    pub fn with_override(mut self, partial: &ChannelOverride) -> Self {
        if let Some(max_attempts) = partial.max_attempts {
            self.max_attempts = Some(max_attempts);
        }
        if let Some(base_delay_ms) = partial.base_delay_ms {
            self.base_delay_ms = Some(base_delay_ms);
        }
        if let Some(max_delay_ms) = partial.max_delay_ms {
            self.max_delay_ms = Some(max_delay_ms);
        }
        if let Some(ref patterns) = partial.retryable_error_patterns {
            self.retryable_error_patterns = Some(patterns.clone());
        }
        self
    }

    #[track_caller]
    pub fn build(self) -> Result<RetryPolicy, ModelError> {
        let max_attempts = self.max_attempts.unwrap_or(self.base.max_attempts);
        if max_attempts == 0 {
            return Err(ModelError::Validation {
                field: "max_attempts",
                message: String::from("must be at least 1"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let base_delay_ms = self.base_delay_ms.unwrap_or(self.base.base_delay_ms);
        if base_delay_ms == 0 {
            return Err(ModelError::Validation {
                field: "base_delay_ms",
                message: String::from("must be greater than 0"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let max_delay_ms = self.max_delay_ms.unwrap_or(self.base.max_delay_ms);
        if max_delay_ms < base_delay_ms {
            return Err(ModelError::Validation {
                field: "max_delay_ms",
                message: format!("{max_delay_ms} is below base_delay_ms {base_delay_ms}"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        Ok(RetryPolicy {
            max_attempts,
            base_delay_ms,
            max_delay_ms,
            retryable_error_patterns: self
                .retryable_error_patterns
                .unwrap_or(self.base.retryable_error_patterns),
        })
    }
}
