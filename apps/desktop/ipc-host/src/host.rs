//! Process wiring: config → guard → router → IPC server.

use crate::error::HostError;
use crate::handlers::register_builtin_handlers;
use crate::ipc_config::IpcConfig;

use common::ErrorLocation;

use ipc_core::clock::SystemClock;
use ipc_core::config::AppConfig;
use ipc_core::guard::RequestGuard;
use ipc_core::ipc::{IpcRouter, IpcServerHandle, start_ipc_server};

use models::RuntimeEnvironment;

use std::panic::Location;
use std::path::PathBuf;
use std::sync::Arc;

use log::info;

/// Directory name under the platform data dir.
pub const APP_DIR_NAME: &str = "ipc-host";

/// Everything a running host owns.
pub struct HostRuntime {
    pub router: Arc<IpcRouter>,
    pub server: IpcServerHandle,
    pub ipc_config: IpcConfig,
    pub environment: RuntimeEnvironment,
}

impl HostRuntime {
    pub async fn shutdown(self) {
        info!("Shutting down IPC host");
        self.server.shutdown().await;
    }
}

/// `{data_dir}/ipc-host`, where config, logs and the handoff file live.
///
/// # Errors
///
/// [`HostError::Host`] if the platform has no data directory.
pub fn app_data_dir() -> Result<PathBuf, HostError> {
    dirs::data_local_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .ok_or_else(|| HostError::Host {
            message: String::from("No local data directory on this platform"),
            location: ErrorLocation::from(Location::caller()),
        })
}

/// Build the router, register the built-ins and start serving.
///
/// The auth token is fresh for every start.
///
/// # Errors
///
/// - [`HostError::Registration`] if the configured guard settings are invalid
/// - [`HostError::Ipc`] if the port cannot be bound
pub async fn start_host(
    config: &AppConfig,
    environment: RuntimeEnvironment,
) -> Result<HostRuntime, HostError> {
    let guard = RequestGuard::new(environment, Arc::new(SystemClock));
    let router = Arc::new(IpcRouter::new(guard));
    register_builtin_handlers(&router, &config.guard)?;

    let ipc_config = IpcConfig::generate(config.server.ipc_port);
    info!("Starting IPC server on port {}", ipc_config.port());

    let server = start_ipc_server(
        ipc_config.port(),
        ipc_config.auth_token().clone(),
        Arc::clone(&router),
    )
    .await?;
    let ipc_config = ipc_config.with_port(server.port());

    info!(
        "IPC host ready on {} ({environment:?}, token {})",
        server.local_addr(),
        ipc_config.auth_token()
    );

    Ok(HostRuntime {
        router,
        server,
        ipc_config,
        environment,
    })
}
