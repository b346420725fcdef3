//! Host logging: colored stdout plus a plain `ipc-host.log` file.
//!
//! The level follows the runtime environment. Non-production hosts log at
//! debug so guard completion lines and retry decisions are visible.

use crate::error::HostError;

use common::ErrorLocation;

use models::RuntimeEnvironment;

use std::fmt::Arguments;
use std::io::stdout;
use std::panic::Location;
use std::path::Path;
use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use fern::colors::Color::{Blue, Green, Magenta, Red, Yellow};
use fern::colors::ColoredLevelConfig;
use fern::{Dispatch, FormatCallback};
use humantime::format_rfc3339;
use log::{LevelFilter, Record, info, warn};

static INIT_LOGGER_ONCE: Once = Once::new();

static LOGGER_ALREADY_CALLED: AtomicBool = AtomicBool::new(false);

pub const LOG_FILE_NAME: &str = "ipc-host.log";

/// WebSocket internals log every frame at debug.
const QUIET_TARGETS: [&str; 2] = ["tungstenite", "tokio_tungstenite"];

pub fn level_for(environment: RuntimeEnvironment) -> LevelFilter {
    match environment {
        RuntimeEnvironment::Production => LevelFilter::Info,
        RuntimeEnvironment::Development | RuntimeEnvironment::Test => LevelFilter::Debug,
    }
}

/// Install the global logger. Later calls warn and return `Ok`.
///
/// # Errors
///
/// [`HostError::Host`] if the log file cannot be created or another logger
/// is already installed.
pub fn initialize(log_dir: &Path, environment: RuntimeEnvironment) -> Result<(), HostError> {
    if LOGGER_ALREADY_CALLED.swap(true, Ordering::SeqCst) {
        warn!("Logger already initialized");
        return Ok(());
    }

    let level = level_for(environment);
    let mut result = Ok(());

    INIT_LOGGER_ONCE.call_once(|| {
        result = install(log_dir, level);
        if result.is_ok() {
            info!("Logger initialized with level {level:?} for {environment:?}");
        }
    });

    result
}

#[track_caller]
fn install(log_dir: &Path, level: LevelFilter) -> Result<(), HostError> {
    let log_file = fern::log_file(log_dir.join(LOG_FILE_NAME)).map_err(|e| HostError::Host {
        message: format!("Failed to create log file in {}: {e}", log_dir.display()),
        location: ErrorLocation::from(Location::caller()),
    })?;

    let colors = ColoredLevelConfig::new()
        .debug(Blue)
        .info(Green)
        .warn(Yellow)
        .error(Red)
        .trace(Magenta);

    let stdout_dispatch = Dispatch::new()
        .format(move |out, message, record| {
            write_line(out, message, record, colors.color(record.level()))
        })
        .chain(stdout());

    let file_dispatch = Dispatch::new()
        .format(|out, message, record| write_line(out, message, record, record.level()))
        .chain(log_file);

    let mut base = Dispatch::new().level(level);
    for target in QUIET_TARGETS {
        base = base.level_for(target, LevelFilter::Warn);
    }

    base.chain(stdout_dispatch)
        .chain(file_dispatch)
        .apply()
        .map_err(|e| HostError::Host {
            message: format!("Failed to initialize logger: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })
}

fn write_line(
    out: FormatCallback,
    message: &Arguments,
    record: &Record,
    level: impl std::fmt::Display,
) {
    out.finish(format_args!(
        "[{date} - {level}] {message} [{file}:{line}]",
        date = format_rfc3339(SystemTime::now()),
        file = record.file().unwrap_or("unknown"),
        line = record.line().unwrap_or(0),
    ))
}
