//! WebSocket client transport.
//!
//! One socket per [`WsTransport`]. Calls are multiplexed by `request_id`:
//! each call parks a oneshot in the pending table and the reader task
//! completes it when the matching `response` frame arrives. Transport faults
//! surface with `ECONNREFUSED:` / `ECONNRESET:` prefixes so the default
//! retry patterns classify them as transient.

use crate::error::invoke::InvokeError;
use crate::error::ipc::IpcError;
use crate::ipc::transport::Transport;
use crate::IPC_SERVER_BASE_URL;

use common::{ErrorLocation, RedactedToken};
use models::{IpcClientMessage, IpcOutcome, IpcServerMessage};

use std::collections::HashMap;
use std::panic::Location;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use backoff::{ExponentialBackoff, backoff::Backoff};
use futures_util::future::{BoxFuture, FutureExt};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, trace, warn};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::spawn as TokioSpawn;
use tokio::sync::{mpsc, oneshot};
use tokio::time::sleep as TokioSleep;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use url::Url;

type ClientStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type ClientWrite = SplitSink<ClientStream, Message>;
type ClientRead = SplitStream<ClientStream>;
type PendingMap = HashMap<u64, oneshot::Sender<IpcOutcome>>;
type PendingTable = Arc<Mutex<PendingMap>>;

const OUTGOING_BUFFER: usize = 64;
const CONNECTION_CLOSED: &str = "ECONNRESET: IPC connection closed";

pub struct WsTransport {
    outgoing: mpsc::Sender<IpcClientMessage>,
    pending: PendingTable,
    next_request_id: AtomicU64,
    closed: CancellationToken,
}

impl WsTransport {
    /// Connect to `ws://127.0.0.1:<ipc_port>` and authenticate.
    ///
    /// Connection attempts back off exponentially until `connect_timeout`
    /// has elapsed.
    ///
    /// # Errors
    ///
    /// - [`IpcError::Connect`] if no connection could be made in time
    /// - [`IpcError::Auth`] if the server rejected the token
    pub async fn connect(
        ipc_port: u16,
        auth_token: &RedactedToken,
        connect_timeout: Duration,
    ) -> Result<Self, IpcError> {
        let url = Url::parse(&format!("{IPC_SERVER_BASE_URL}:{ipc_port}")).map_err(|e| {
            IpcError::Connect {
                message: format!("Invalid IPC URL: {e}"),
                location: ErrorLocation::from(Location::caller()),
            }
        })?;

        let mut ws = connect_with_backoff(&url, connect_timeout).await?;
        handshake(&mut ws, auth_token).await?;
        info!("Connected to IPC server at {url}");

        let (write, read) = ws.split();
        let (outgoing, outgoing_rx) = mpsc::channel(OUTGOING_BUFFER);
        let pending: PendingTable = Arc::new(Mutex::new(HashMap::new()));
        let closed = CancellationToken::new();

        TokioSpawn(write_frames(write, outgoing_rx, closed.clone()));
        TokioSpawn(read_frames(read, Arc::clone(&pending), closed.clone()));

        Ok(Self {
            outgoing,
            pending,
            next_request_id: AtomicU64::new(1),
            closed,
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Close the socket. Pending calls fail with `ECONNRESET`.
    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn pending_count(&self) -> usize {
        lock_pending(&self.pending).len()
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.closed.cancel();
    }
}

struct PendingEntry {
    pending: PendingTable,
    request_id: u64,
}

impl Drop for PendingEntry {
    fn drop(&mut self) {
        lock_pending(&self.pending).remove(&self.request_id);
    }
}

impl Transport for WsTransport {
    fn call(
        &self,
        channel: &str,
        args: Vec<Value>,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, Result<Value, InvokeError>> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let outgoing = self.outgoing.clone();
        let pending = Arc::clone(&self.pending);
        let closed = self.closed.clone();
        let channel = channel.to_string();

        async move {
            if cancel.is_cancelled() {
                return Err(InvokeError::cancelled(channel));
            }
            if closed.is_cancelled() {
                return Err(InvokeError::transport(CONNECTION_CLOSED));
            }

            let (response_tx, response_rx) = oneshot::channel();
            lock_pending(&pending).insert(request_id, response_tx);
            // Removes the entry however this future ends, including being dropped.
            let _entry = PendingEntry {
                pending: Arc::clone(&pending),
                request_id,
            };

            let frame = IpcClientMessage::Invoke {
                request_id,
                channel: channel.clone(),
                args,
            };
            if outgoing.send(frame).await.is_err() {
                return Err(InvokeError::transport(CONNECTION_CLOSED));
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(InvokeError::cancelled(channel)),
                outcome = response_rx => match outcome {
                    Ok(IpcOutcome::Ok { value }) => Ok(value),
                    Ok(IpcOutcome::Err { error }) => Err(InvokeError::from_payload(error)),
                    Err(_) => Err(InvokeError::transport(format!(
                        "{CONNECTION_CLOSED} before '{channel}' answered"
                    ))),
                },
            }
        }
        .boxed()
    }

    fn send(&self, channel: &str, args: Vec<Value>) -> BoxFuture<'static, Result<(), InvokeError>> {
        let outgoing = self.outgoing.clone();
        let channel = channel.to_string();

        async move {
            outgoing
                .send(IpcClientMessage::Send { channel, args })
                .await
                .map_err(|_| InvokeError::transport(CONNECTION_CLOSED))
        }
        .boxed()
    }
}

async fn connect_with_backoff(
    url: &Url,
    connect_timeout: Duration,
) -> Result<ClientStream, IpcError> {
    let mut backoff = ExponentialBackoff {
        max_elapsed_time: Some(connect_timeout),
        ..Default::default()
    };

    debug!("Connecting to IPC server at {url}");

    loop {
        match connect_async(url.as_str()).await {
            Ok((ws, _)) => return Ok(ws),
            Err(e) => match backoff.next_backoff() {
                Some(duration) => {
                    trace!("IPC server not reachable ({e}), retrying after {duration:?}");
                    TokioSleep(duration).await;
                }
                None => {
                    return Err(IpcError::Connect {
                        message: format!(
                            "ECONNREFUSED: {url} not reachable within {connect_timeout:?}: {e}"
                        ),
                        location: ErrorLocation::from(Location::caller()),
                    });
                }
            },
        }
    }
}

async fn handshake(ws: &mut ClientStream, auth_token: &RedactedToken) -> Result<(), IpcError> {
    let frame = serde_json::to_string(&IpcClientMessage::AuthHandshake {
        token: auth_token.expose().to_string(),
    })
    .map_err(|e| IpcError::FrameEncode {
        message: format!("Failed to encode auth handshake: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    ws.send(Message::Text(frame.into()))
        .await
        .map_err(|e| IpcError::Send {
            message: format!("Failed to send auth handshake: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

    let reply = match ws.next().await {
        Some(Ok(Message::Text(text))) => text,
        Some(Ok(other)) => {
            return Err(IpcError::Auth {
                message: format!("Unexpected auth reply: {other:?}"),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        Some(Err(e)) => {
            return Err(IpcError::Read {
                message: format!("Error reading auth reply: {e}"),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        None => {
            return Err(IpcError::Auth {
                message: String::from("Server closed the connection during auth"),
                location: ErrorLocation::from(Location::caller()),
            });
        }
    };

    match serde_json::from_str::<IpcServerMessage>(reply.as_str())? {
        IpcServerMessage::AuthHandshakeResponse { success: true, .. } => Ok(()),
        IpcServerMessage::AuthHandshakeResponse { error, .. } => Err(IpcError::Auth {
            message: error.unwrap_or_else(|| String::from("Authentication rejected")),
            location: ErrorLocation::from(Location::caller()),
        }),
        other => Err(IpcError::Auth {
            message: format!("Expected auth handshake response, got {other:?}"),
            location: ErrorLocation::from(Location::caller()),
        }),
    }
}

async fn write_frames(
    mut write: ClientWrite,
    mut outgoing: mpsc::Receiver<IpcClientMessage>,
    closed: CancellationToken,
) {
    loop {
        let message = tokio::select! {
            _ = closed.cancelled() => break,
            message = outgoing.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };

        let json = match serde_json::to_string(&message) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to encode client message: {e}");
                continue;
            }
        };

        if let Err(e) = write.send(Message::Text(json.into())).await {
            warn!("IPC write failed: {e}");
            break;
        }
    }

    closed.cancel();
    let _ = write.close().await;
}

async fn read_frames(mut read: ClientRead, pending: PendingTable, closed: CancellationToken) {
    loop {
        let frame = tokio::select! {
            _ = closed.cancelled() => break,
            frame = read.next() => frame,
        };

        let text = match frame {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                warn!("IPC read failed: {e}");
                break;
            }
        };

        match serde_json::from_str::<IpcServerMessage>(text.as_str()) {
            Ok(IpcServerMessage::Response {
                request_id,
                outcome,
            }) => complete(&pending, request_id, outcome),
            Ok(IpcServerMessage::ProtocolError {
                request_id: Some(request_id),
                message,
            }) => complete(
                &pending,
                request_id,
                IpcOutcome::Err {
                    error: json!({ "name": "ProtocolError", "message": message }),
                },
            ),
            Ok(other) => debug!("Ignoring unsolicited server frame: {other:?}"),
            Err(e) => warn!("Undecodable server frame: {e}"),
        }
    }

    closed.cancel();
    // Dropping the senders fails every waiting call with ECONNRESET.
    lock_pending(&pending).clear();
}

fn complete(pending: &PendingTable, request_id: u64, outcome: IpcOutcome) {
    match lock_pending(pending).remove(&request_id) {
        Some(waiter) => {
            let _ = waiter.send(outcome);
        }
        None => trace!("No pending call for response {request_id}"),
    }
}

fn lock_pending(pending: &PendingTable) -> MutexGuard<'_, PendingMap> {
    pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
