//! IPC plumbing between the front-end and the privileged backend.
//!
//! - [`IpcRouter`]: server registration surface, dispatches through the guard
//! - [`Transport`]: client seam used by the retry orchestrator
//! - [`LocalTransport`]: in-process transport over a router
//! - [`start_ipc_server`] / [`WsTransport`]: the same contract over a
//!   loopback WebSocket with an auth handshake
//!
//! # Security
//!
//! - Localhost-only binding (`127.0.0.1`)
//! - Non-loopback connections rejected
//! - Authentication token required as the first frame

mod client;
mod connection_state;
mod handle;
pub mod router;
mod server;
pub mod transport;

pub use client::WsTransport;
pub use handle::IpcServerHandle;
pub use router::IpcRouter;
pub use server::start_ipc_server;
pub use transport::{LocalTransport, Transport};
