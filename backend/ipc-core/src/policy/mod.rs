//! Channel policy lookup.
//!
//! Read-only after construction: the default [`RetryPolicy`], per-channel
//! [`ChannelOverride`]s and the retry blacklist. A channel may appear in the
//! blacklist or in the overrides, never both; [`ChannelPolicyRegistry::new`]
//! rejects tables that break this.

pub mod channels;

use crate::error::policy::PolicyError;

use common::ErrorLocation;
use models::{ChannelOverride, RetryPolicy, RetryPolicyBuilder};

use std::collections::{HashMap, HashSet};
use std::panic::Location;

#[derive(Debug, Clone)]
pub struct ChannelPolicyRegistry {
    default_policy: RetryPolicy,
    overrides: HashMap<String, ChannelOverride>,
    blacklist: HashSet<String>,
}

impl ChannelPolicyRegistry {
    /// Build a registry from custom tables.
    ///
    /// # Errors
    ///
    /// - [`PolicyError::Overlap`] if a channel is both blacklisted and overridden
    /// - [`PolicyError::InvalidOverride`] if an override yields an invalid policy
    pub fn new<O, C, B, S>(
        default_policy: RetryPolicy,
        overrides: O,
        blacklist: B,
    ) -> Result<Self, PolicyError>
    where
        O: IntoIterator<Item = (C, ChannelOverride)>,
        C: Into<String>,
        B: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let registry = Self {
            default_policy,
            overrides: overrides
                .into_iter()
                .map(|(channel, partial)| (channel.into(), partial))
                .collect(),
            blacklist: blacklist.into_iter().map(Into::into).collect(),
        };

        registry.validate()?;
        Ok(registry)
    }

    /// The built-in tables from [`channels`].
    pub fn standard() -> Self {
        Self {
            default_policy: RetryPolicy::default(),
            overrides: channels::standard_overrides()
                .map(|(channel, partial)| (channel.to_string(), partial))
                .collect(),
            blacklist: channels::RETRY_BLACKLIST
                .iter()
                .map(|channel| channel.to_string())
                .collect(),
        }
    }

    #[track_caller]
    pub fn validate(&self) -> Result<(), PolicyError> {
        let mut overlapping: Vec<&String> = self
            .overrides
            .keys()
            .filter(|channel| self.blacklist.contains(*channel))
            .collect();
        overlapping.sort();

        if let Some(channel) = overlapping.first() {
            return Err(PolicyError::Overlap {
                channel: channel.to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        for (channel, partial) in &self.overrides {
            RetryPolicyBuilder::from_policy(self.default_policy.clone())
                .with_override(partial)
                .build()
                .map_err(|source| PolicyError::InvalidOverride {
                    channel: channel.clone(),
                    location: ErrorLocation::from(Location::caller()),
                    source,
                })?;
        }

        Ok(())
    }

    /// Effective policy for `channel`: the default with the channel's override
    /// merged field by field. Always a fresh value.
    pub fn resolve_policy(&self, channel: &str) -> RetryPolicy {
        match self.overrides.get(channel) {
            Some(partial) => merge(&self.default_policy, partial),
            None => self.default_policy.clone(),
        }
    }

    /// Exact, case-sensitive membership. No trimming or normalization.
    pub fn is_blacklisted(&self, channel: &str) -> bool {
        self.blacklist.contains(channel)
    }

    pub fn default_policy(&self) -> &RetryPolicy {
        &self.default_policy
    }

    pub fn override_for(&self, channel: &str) -> Option<&ChannelOverride> {
        self.overrides.get(channel)
    }
}

impl Default for ChannelPolicyRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

/// Field-by-field merge. Fields absent from `partial` keep the base value.
pub fn merge(base: &RetryPolicy, partial: &ChannelOverride) -> RetryPolicy {
    RetryPolicy {
        max_attempts: partial.max_attempts.unwrap_or(base.max_attempts),
        base_delay_ms: partial.base_delay_ms.unwrap_or(base.base_delay_ms),
        max_delay_ms: partial.max_delay_ms.unwrap_or(base.max_delay_ms),
        retryable_error_patterns: partial
            .retryable_error_patterns
            .clone()
            .unwrap_or_else(|| base.retryable_error_patterns.clone()),
    }
}
