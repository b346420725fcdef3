//! Transient-versus-fatal classification of failed attempts.

use crate::error::invoke::InvokeError;

use std::collections::BTreeSet;

/// Whether `error` may be retried under `patterns`.
///
/// Case-insensitive substring match on the error message. Cancellations and
/// rejections that are not errors are never retryable. The error itself is
/// left untouched.
pub fn is_retryable(error: &InvokeError, patterns: &BTreeSet<String>) -> bool {
    match error.message() {
        Some(message) => matches_any(message, patterns),
        None => false,
    }
}

pub fn matches_any(message: &str, patterns: &BTreeSet<String>) -> bool {
    let message = message.to_lowercase();
    patterns
        .iter()
        .any(|pattern| message.contains(&pattern.to_lowercase()))
}
