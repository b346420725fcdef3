//! JSON frames exchanged over the IPC WebSocket.
//!
//! Every frame is a text message holding one of these enums, tagged by `type`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Client → Server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpcClientMessage {
    /// Must be the first frame on every connection.
    AuthHandshake { token: String },

    /// Two-way call. Answered by exactly one `Response` with the same `request_id`.
    Invoke {
        request_id: u64,
        channel: String,
        #[serde(default)]
        args: Vec<Value>,
    },

    /// Fire-and-forget. Never answered.
    Send {
        channel: String,
        #[serde(default)]
        args: Vec<Value>,
    },
}

/// Server → Client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpcServerMessage {
    AuthHandshakeResponse {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    Response { request_id: u64, outcome: IpcOutcome },

    /// Frame-level problem not tied to a decodable request.
    ProtocolError {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<u64>,
        message: String,
    },
}

/// Settled result of one invocation.
///
/// `error` is normally a serialized `SafeError`; anything else is a rejection
/// with a non-error value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IpcOutcome {
    Ok { value: Value },
    Err { error: Value },
}
