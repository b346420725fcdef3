//! Deadline enforcement around handler execution.

use crate::error::guard::{GuardError, HandlerError};

use common::ErrorLocation;

use std::panic::Location;
use std::time::Duration;

use futures_util::future::BoxFuture;
use log::error;
use serde_json::Value;
use tokio::spawn as TokioSpawn;
use tokio::time::timeout as TokioTimeout;

pub type HandlerFuture = BoxFuture<'static, Result<Value, HandlerError>>;

const PANIC_MESSAGE: &str = "Handler panicked";

/// Race the handler against `timeout`.
///
/// The handler runs as its own task so a panic surfaces as a
/// [`GuardError::Handler`] instead of unwinding through the guard. The timer
/// is dropped as soon as the handler settles; on timeout the task is aborted.
pub async fn run_with_timeout(
    channel: &str,
    timeout: Duration,
    handler: HandlerFuture,
) -> Result<Value, GuardError> {
    let mut task = TokioSpawn(handler);

    match TokioTimeout(timeout, &mut task).await {
        Ok(Ok(result)) => result.map_err(|wrapped| GuardError::Handler {
            wrapped,
            location: ErrorLocation::from(Location::caller()),
        }),
        Ok(Err(join_error)) => {
            error!("Handler for '{channel}' did not complete: {join_error}");
            Err(GuardError::Handler {
                wrapped: HandlerError::from(PANIC_MESSAGE),
                location: ErrorLocation::from(Location::caller()),
            })
        }
        Err(_) => {
            task.abort();
            Err(GuardError::HandlerTimeout {
                channel: channel.to_string(),
                timeout_ms: timeout.as_millis() as u64,
                location: ErrorLocation::from(Location::caller()),
            })
        }
    }
}
