//! Resilience layer for the front-end ↔ backend IPC bridge.
//!
//! Server side, every handler runs behind a [`guard::RequestGuard`]. Client
//! side, calls go through a [`retry::RetryOrchestrator`] that resolves a
//! per-channel policy from the [`policy::ChannelPolicyRegistry`], backs off
//! between attempts and reports through a [`telemetry::TelemetryGate`].
//! [`hook::InvocationHook`] wraps one orchestrated call as observable state.

pub mod clock;
pub mod config;
pub mod error;
pub mod guard;
pub mod hook;
pub mod ipc;
pub mod policy;
pub mod retry;
pub mod telemetry;

#[cfg(test)]
mod tests;

pub const IPC_SERVER_HOSTNAME: &str = "127.0.0.1";
pub const IPC_SERVER_BASE_URL: &str = const_format::concatcp!("ws://", IPC_SERVER_HOSTNAME);
