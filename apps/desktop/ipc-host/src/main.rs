use ipc_host::error::HostError;
use ipc_host::host::{app_data_dir, start_host};
use ipc_host::logger::initialize as LoggerInitialize;

use ipc_core::config::AppConfig;

use common::ErrorLocation;

use std::fs::create_dir_all;
use std::panic::Location;
use std::process::ExitCode;

use log::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("IPC host failed: {e}");
            eprintln!("IPC host failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), HostError> {
    let data_dir = app_data_dir()?;
    create_dir_all(&data_dir).map_err(|e| HostError::Host {
        message: format!("Failed to create {}: {e}", data_dir.display()),
        location: ErrorLocation::from(Location::caller()),
    })?;

    let config = AppConfig::load(&data_dir)?;
    let environment = config.resolve_environment();

    // Logger before anything else that logs.
    LoggerInitialize(&data_dir, environment)?;

    info!("IPC host starting");
    info!("Data directory: {}", data_dir.display());

    let runtime = start_host(&config, environment).await?;
    runtime.ipc_config.write_handoff(&data_dir)?;

    tokio::signal::ctrl_c().await.map_err(|e| HostError::Host {
        message: format!("Failed to wait for shutdown signal: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    runtime.shutdown().await;
    Ok(())
}
