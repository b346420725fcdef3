//! Boundary mapping from [`GuardError`] to [`SafeError`].

use crate::error::guard::GuardError;

use models::{RuntimeEnvironment, SafeError};

use std::error::Error as StdError;
use std::fmt::Write as FmtWrite;

/// Reduce `error` to `{name, message}`.
///
/// The stack (rendered error, capture location and source chain) survives
/// only when `environment` is explicitly non-production.
pub fn to_safe_error(error: &GuardError, environment: RuntimeEnvironment) -> SafeError {
    let safe = SafeError::new(error.name(), error.safe_message());

    if environment.exposes_stacks() {
        safe.with_stack(render_stack(error))
    } else {
        safe
    }
}

fn render_stack(error: &GuardError) -> String {
    let mut stack = format!(
        "{}: {}\n    at {}",
        error.name(),
        error.safe_message(),
        error.location()
    );

    let mut source = error.source();
    while let Some(cause) = source {
        let _ = write!(stack, "\nCaused by: {cause}");
        source = cause.source();
    }

    stack
}
