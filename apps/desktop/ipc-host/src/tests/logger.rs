// Unit tests for logger module initialization logic

use crate::logger::{initialize, level_for};

use models::RuntimeEnvironment;

use std::path::PathBuf;

use log::LevelFilter;

/// **VALUE**: Verifies a bad log directory is an error and later calls are no-ops.
///
/// **WHY THIS MATTERS**: A read-only data dir must fail startup with a clear
/// message, and a second caller must not panic on fern's global logger.
///
/// **BUG THIS CATCHES**: Would catch `fern::log_file` being unwrapped, or the
/// Once/AtomicBool guards being removed.
#[test]
fn given_invalid_log_dir_when_initialized_twice_then_error_then_ok() {
    // GIVEN: A path that cannot hold a file on Unix-like systems
    let invalid_dir = PathBuf::from("/dev/null/invalid-path");

    // WHEN
    let first = initialize(&invalid_dir, RuntimeEnvironment::Production);
    let second = initialize(&invalid_dir, RuntimeEnvironment::Production);

    // THEN
    let err = first.expect_err("Invalid directory should fail");
    assert!(format!("{err:?}").contains("Host"));
    assert!(second.is_ok(), "Repeat initialization should be a no-op");
}

/// **VALUE**: Verifies only production hosts log at info.
///
/// **WHY THIS MATTERS**: Per-request guard lines are debug noise in production
/// but essential while developing.
///
/// **BUG THIS CATCHES**: Would catch test hosts running at production verbosity.
#[test]
fn given_environment_when_choosing_level_then_debug_outside_production() {
    assert_eq!(level_for(RuntimeEnvironment::Production), LevelFilter::Info);
    assert_eq!(level_for(RuntimeEnvironment::Development), LevelFilter::Debug);
    assert_eq!(level_for(RuntimeEnvironment::Test), LevelFilter::Debug);
}
