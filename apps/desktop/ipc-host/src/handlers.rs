//! Channels the host itself serves.
//!
//! Domain handlers are registered by whoever embeds the router; these are the
//! built-ins every host answers.

use crate::error::HostError;

use ipc_core::guard::handler;
use ipc_core::ipc::IpcRouter;

use models::{GuardConfig, ValidationSchema};

use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info};
use serde_json::{Value, json};

pub const PING: &str = "ping";
pub const GET_APP_VERSION: &str = "get-app-version";
pub const LOG_EVENT: &str = "log-event";

/// Register the built-in channels with `guard` as their guard settings.
///
/// # Errors
///
/// [`HostError::Registration`] if `guard` is rejected.
pub fn register_builtin_handlers(router: &IpcRouter, guard: &GuardConfig) -> Result<(), HostError> {
    router
        .register_guarded_handler(
            PING,
            handler(|_args| async {
                let now_ms = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|elapsed| elapsed.as_millis() as u64)
                    .unwrap_or_default();
                Ok(json!({ "pong": true, "timestamp_ms": now_ms }))
            }),
            guard.clone(),
            Vec::new(),
        )
        .map_err(|e| HostError::registration(PING, e))?;

    router
        .register_guarded_handler(
            GET_APP_VERSION,
            handler(|_args| async { Ok(json!(env!("CARGO_PKG_VERSION"))) }),
            guard.clone(),
            Vec::new(),
        )
        .map_err(|e| HostError::registration(GET_APP_VERSION, e))?;

    router
        .register_one_way_handler(
            LOG_EVENT,
            handler(|args| async move {
                let message = args.first().and_then(Value::as_str).unwrap_or_default();
                info!("Front-end event: {message}");
                if let Some(details) = args.get(1) {
                    debug!("Front-end event details: {details}");
                }
                Ok(Value::Null)
            }),
            guard.clone(),
            vec![
                ValidationSchema::string().required().length(Some(1), Some(1024)),
                ValidationSchema::object(Vec::<(String, ValidationSchema)>::new()),
            ],
        )
        .map_err(|e| HostError::registration(LOG_EVENT, e))?;

    debug!("Registered built-in channels: {:?}", router.channels());
    Ok(())
}
