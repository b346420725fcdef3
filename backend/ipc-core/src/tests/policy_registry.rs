use crate::error::policy::PolicyError;
use crate::policy::ChannelPolicyRegistry;
use crate::policy::channels::{
    DIAGNOSTICS_READ_CHANNELS, READ_CHANNELS, RETRY_BLACKLIST, WRITE_CHANNELS,
};

use models::{ChannelOverride, RetryPolicy};

/// **VALUE**: Verifies the built-in tables satisfy their own invariants.
///
/// **WHY THIS MATTERS**: `standard()` skips validation at runtime; this test is
/// what keeps a channel from landing in both the blacklist and the overrides.
///
/// **BUG THIS CATCHES**: Would catch adding a blacklisted channel to an override list.
#[test]
fn given_standard_tables_when_validating_then_ok() {
    // GIVEN/WHEN
    let registry = ChannelPolicyRegistry::standard();

    // THEN
    registry.validate().unwrap();
    assert_eq!(RETRY_BLACKLIST.len(), 8);
}

/// **VALUE**: Verifies the three override classes resolve to the published numbers.
///
/// **WHY THIS MATTERS**: Writes must retry less and wait longer than reads.
///
/// **BUG THIS CATCHES**: Would catch swapped read/write overrides.
#[test]
fn given_override_classes_when_resolving_then_published_timings() {
    // GIVEN
    let registry = ChannelPolicyRegistry::standard();

    // WHEN/THEN: read-style
    for channel in READ_CHANNELS {
        let policy = registry.resolve_policy(channel);
        assert_eq!(
            (policy.max_attempts, policy.base_delay_ms, policy.max_delay_ms),
            (3, 1000, 3000),
            "{channel}"
        );
    }

    // WHEN/THEN: write-style
    for channel in WRITE_CHANNELS {
        let policy = registry.resolve_policy(channel);
        assert_eq!(
            (policy.max_attempts, policy.base_delay_ms, policy.max_delay_ms),
            (2, 2000, 5000),
            "{channel}"
        );
    }

    // WHEN/THEN: diagnostics reads
    for channel in DIAGNOSTICS_READ_CHANNELS {
        let policy = registry.resolve_policy(channel);
        assert_eq!(
            (policy.max_attempts, policy.base_delay_ms, policy.max_delay_ms),
            (2, 1000, 3000),
            "{channel}"
        );
    }

    // THEN: Overrides keep the default patterns
    assert_eq!(
        registry.resolve_policy("save-website").retryable_error_patterns,
        RetryPolicy::default().retryable_error_patterns
    );
}

/// **VALUE**: Verifies unknown channels get the default policy unchanged.
///
/// **WHY THIS MATTERS**: New channels must be safe by default without a table edit.
///
/// **BUG THIS CATCHES**: Would catch a lookup that falls through to some override.
#[test]
fn given_unlisted_channel_when_resolving_then_default_policy() {
    // GIVEN
    let registry = ChannelPolicyRegistry::standard();

    // WHEN/THEN
    assert_eq!(registry.resolve_policy("brand-new-channel"), RetryPolicy::default());
}

/// **VALUE**: Verifies blacklist lookups are exact: no case folding, no trimming.
///
/// **WHY THIS MATTERS**: Channel names are identifiers; normalizing them here but
/// not in the router would make the two disagree about which channel is which.
///
/// **BUG THIS CATCHES**: Would catch `to_lowercase()` or `trim()` in the lookup.
#[test]
fn given_near_miss_names_when_checking_blacklist_then_not_blacklisted() {
    // GIVEN
    let registry = ChannelPolicyRegistry::standard();

    // WHEN/THEN
    assert!(registry.is_blacklisted("create-new-page"));
    assert!(registry.is_blacklisted("diagnostics:clear-errors"));
    assert!(!registry.is_blacklisted("Create-New-Page"));
    assert!(!registry.is_blacklisted(" create-new-page"));
    assert!(!registry.is_blacklisted("create-new-page "));
    assert!(!registry.is_blacklisted("get-websites"));
}

/// **VALUE**: Verifies resolved policies are independent values.
///
/// **WHY THIS MATTERS**: A caller that tweaks its resolved policy must not change
/// what the next caller gets.
///
/// **BUG THIS CATCHES**: Would catch returning a shared reference to the default.
#[test]
fn given_resolved_policy_when_mutated_then_registry_unchanged() {
    // GIVEN
    let registry = ChannelPolicyRegistry::standard();
    let mut first = registry.resolve_policy("unlisted-a");
    let second = registry.resolve_policy("unlisted-b");

    // WHEN
    first.max_attempts = 99;
    first.retryable_error_patterns.clear();

    // THEN
    assert_eq!(second, RetryPolicy::default());
    assert_eq!(registry.resolve_policy("unlisted-a"), RetryPolicy::default());
    assert_eq!(registry.default_policy(), &RetryPolicy::default());
}

/// **VALUE**: Verifies a channel in both tables is rejected at construction.
///
/// **WHY THIS MATTERS**: Whether such a channel retries is otherwise undefined.
///
/// **BUG THIS CATCHES**: Would catch a registry that silently lets one table win.
#[test]
fn given_overlapping_tables_when_constructing_then_overlap_error() {
    // GIVEN: "save-website" both overridden and blacklisted
    let overrides = vec![("save-website", ChannelOverride::timing(2, 2000, 5000))];
    let blacklist = vec!["save-website", "create-new-page"];

    // WHEN
    let result = ChannelPolicyRegistry::new(RetryPolicy::default(), overrides, blacklist);

    // THEN
    match result {
        Err(PolicyError::Overlap { channel, .. }) => assert_eq!(channel, "save-website"),
        other => panic!("Expected overlap error, got {other:?}"),
    }
}

/// **VALUE**: Verifies an override that breaks a policy invariant is rejected.
///
/// **WHY THIS MATTERS**: A max delay below the base delay makes the schedule
/// non-monotonic.
///
/// **BUG THIS CATCHES**: Would catch overrides merged without validation.
#[test]
fn given_invalid_override_when_constructing_then_invalid_override_error() {
    // GIVEN
    let overrides = vec![("get-websites", ChannelOverride::timing(3, 4000, 1000))];

    // WHEN
    let result =
        ChannelPolicyRegistry::new(RetryPolicy::default(), overrides, Vec::<String>::new());

    // THEN
    assert!(matches!(result, Err(PolicyError::InvalidOverride { .. })));
}
