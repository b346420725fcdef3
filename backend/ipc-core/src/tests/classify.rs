use crate::error::invoke::InvokeError;
use crate::retry::classify::is_retryable;

use models::{RetryPolicy, SafeError};

use serde_json::json;

fn remote(message: &str) -> InvokeError {
    InvokeError::remote(SafeError::new("Error", message))
}

/// **VALUE**: Verifies a validation failure is fatal under the default patterns.
///
/// **WHY THIS MATTERS**: Retrying a request the backend rejected as invalid only
/// repeats the rejection and delays the error shown to the user.
///
/// **BUG THIS CATCHES**: Would catch over-broad matching (e.g. matching "error").
#[test]
fn given_validation_failure_when_classifying_then_not_retryable() {
    // GIVEN: Default patterns
    let patterns = RetryPolicy::default().retryable_error_patterns;

    // WHEN/THEN
    assert!(!is_retryable(&remote("Validation failed: invalid input"), &patterns));
}

/// **VALUE**: Verifies matching is a case-insensitive substring search.
///
/// **WHY THIS MATTERS**: Transport layers spell the same fault differently
/// ("TIMEOUT", "Request timeout", "network error").
///
/// **BUG THIS CATCHES**: Would catch exact or case-sensitive comparison.
#[test]
fn given_transient_messages_in_any_case_when_classifying_then_retryable() {
    // GIVEN: Default patterns
    let patterns = RetryPolicy::default().retryable_error_patterns;

    // WHEN/THEN
    for message in [
        "TIMEOUT",
        "Request timeout after 30s",
        "connect ECONNREFUSED 127.0.0.1:19876",
        "econnreset",
        "getaddrinfo ENOTFOUND api.example.com",
        "NETWORK ERROR while fetching",
    ] {
        assert!(is_retryable(&remote(message), &patterns), "{message} should be retryable");
    }
    assert!(is_retryable(
        &InvokeError::transport("ECONNRESET: IPC connection closed"),
        &patterns
    ));
}

/// **VALUE**: Verifies non-error rejections and cancellations are never retried.
///
/// **WHY THIS MATTERS**: A thrown string or object has no message to classify,
/// and a cancelled call must stay cancelled.
///
/// **BUG THIS CATCHES**: Would catch classification of `Thrown` values by their
/// JSON text (which could contain "TIMEOUT").
#[test]
fn given_thrown_value_or_cancellation_when_classifying_then_not_retryable() {
    // GIVEN: Default patterns and a thrown value whose JSON mentions TIMEOUT
    let patterns = RetryPolicy::default().retryable_error_patterns;
    let thrown = InvokeError::from_payload(json!("TIMEOUT"));

    // WHEN/THEN
    assert!(matches!(thrown, InvokeError::Thrown { .. }));
    assert!(!is_retryable(&thrown, &patterns));
    assert!(!is_retryable(&InvokeError::cancelled("get-websites"), &patterns));
}
