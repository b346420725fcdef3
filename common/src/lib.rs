//! Cross-cutting plumbing shared by every crate in the IPC bridge.
//!
//! ## Architecture
//!
//! - **common** (this crate): error location tracking, secret handling
//! - **models**: pure data exchanged between the layers
//! - **ipc-core**: guard, retry, telemetry and transport logic
//! - **ipc-host**: process wiring
//!
//! Nothing in here knows about channels or handlers.

pub mod error;
pub mod redacted_token;

pub use error::error_location::ErrorLocation;
pub use error::redact_error::RedactError;
pub use redacted_token::RedactedToken;

#[cfg(test)]
mod tests;
