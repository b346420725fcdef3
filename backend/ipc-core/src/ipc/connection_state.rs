//! Per-connection authentication state.

use common::RedactedToken;

use std::sync::Arc;

/// Tracks whether a connection has presented the expected token.
pub(crate) struct ConnectionState {
    authenticated: bool,
    expected_token: Arc<RedactedToken>,
}

impl ConnectionState {
    pub(crate) fn new(expected_token: Arc<RedactedToken>) -> Self {
        Self {
            authenticated: false,
            expected_token,
        }
    }

    /// Mark the connection authenticated if `token` matches.
    pub(crate) fn validate_token(&mut self, token: &str) -> bool {
        let valid = self.expected_token.matches(token);
        if valid {
            self.authenticated = true;
        }
        valid
    }

    pub(crate) fn is_authenticated(&self) -> bool {
        self.authenticated
    }
}
