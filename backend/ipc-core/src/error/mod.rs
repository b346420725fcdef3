pub mod config;
pub mod guard;
pub mod invoke;
pub mod ipc;
pub mod policy;
pub mod telemetry;

pub use guard::{GuardError, HandlerError};
pub use invoke::InvokeError;
