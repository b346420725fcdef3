//! IPC WebSocket server.
//!
//! - Binds `127.0.0.1` only and drops non-loopback peers
//! - The first frame must be an `auth_handshake` carrying the expected token
//! - Every later `invoke` frame is dispatched through the [`IpcRouter`] as its
//!   own task and answered by one `response` frame with the same `request_id`
//! - `send` frames are one-way and never answered
//!
//! Frames are JSON text messages (see [`models::wire`]).

use crate::error::ipc::IpcError;
use crate::ipc::connection_state::ConnectionState;
use crate::ipc::handle::IpcServerHandle;
use crate::ipc::router::IpcRouter;
use crate::IPC_SERVER_HOSTNAME;

use common::{ErrorLocation, RedactedToken};
use models::{IpcClientMessage, IpcOutcome, IpcServerMessage};

use std::net::SocketAddr;
use std::panic::Location;
use std::sync::Arc;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::spawn as TokioSpawn;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};
use tokio_util::sync::CancellationToken;

type WsWrite = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsRead = SplitStream<WebSocketStream<TcpStream>>;

/// Outgoing frames buffered per connection before dispatch tasks wait.
const OUTGOING_BUFFER: usize = 64;

/// Start the IPC server on `127.0.0.1:<ipc_port>`.
///
/// Port `0` binds an ephemeral port; read it back from
/// [`IpcServerHandle::local_addr`].
///
/// # Errors
///
/// [`IpcError::Io`] if the port cannot be bound.
pub async fn start_ipc_server(
    ipc_port: u16,
    auth_token: RedactedToken,
    router: Arc<IpcRouter>,
) -> Result<IpcServerHandle, IpcError> {
    let listener = TcpListener::bind((IPC_SERVER_HOSTNAME, ipc_port)).await?;
    let local_addr = listener.local_addr()?;
    let auth_token = Arc::new(auth_token);
    let shutdown = CancellationToken::new();

    info!("IPC server listening on {local_addr}");

    let accept_shutdown = shutdown.clone();
    let accept_task = TokioSpawn(async move {
        loop {
            tokio::select! {
                _ = accept_shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        debug!("Client connecting from {addr}");
                        let connection = handle_connection(
                            stream,
                            addr,
                            Arc::clone(&auth_token),
                            Arc::clone(&router),
                            accept_shutdown.child_token(),
                        );
                        TokioSpawn(async move {
                            if let Err(e) = connection.await {
                                error!("IPC connection from {addr} ended with error: {e}");
                            }
                        });
                    }
                    Err(e) => {
                        error!("IPC accept failed: {e}");
                        break;
                    }
                },
            }
        }
    });

    Ok(IpcServerHandle::new(local_addr, shutdown, accept_task))
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    auth_token: Arc<RedactedToken>,
    router: Arc<IpcRouter>,
    shutdown: CancellationToken,
) -> Result<(), IpcError> {
    if !addr.ip().is_loopback() {
        warn!("Rejected non-loopback connection from {addr}");
        return Ok(());
    }

    let ws_stream = accept_async(stream).await.map_err(|e| IpcError::Handshake {
        message: format!("WebSocket handshake failed: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    let (mut write, mut read) = ws_stream.split();
    let mut state = ConnectionState::new(auth_token);

    if !authenticate(&mut read, &mut write, &mut state, addr).await? {
        return Ok(());
    }

    let (outgoing_tx, outgoing_rx) = mpsc::channel::<IpcServerMessage>(OUTGOING_BUFFER);
    let writer = TokioSpawn(write_frames(write, outgoing_rx, addr));
    let peer = addr.to_string();

    let result = loop {
        let frame = tokio::select! {
            _ = shutdown.cancelled() => break Ok(()),
            frame = read.next() => frame,
        };

        let text = match frame {
            None => break Ok(()),
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Close(_))) => break Ok(()),
            Some(Ok(Message::Binary(_))) => {
                warn!("Client {addr} sent a binary frame; frames must be JSON text");
                let _ = outgoing_tx
                    .send(IpcServerMessage::ProtocolError {
                        request_id: None,
                        message: String::from("Binary frames are not supported"),
                    })
                    .await;
                continue;
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                break Err(IpcError::Read {
                    message: format!("Error reading message: {e}"),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
        };

        let message = match serde_json::from_str::<IpcClientMessage>(text.as_str()) {
            Ok(message) => message,
            Err(e) => {
                warn!("Client {addr} sent an undecodable frame: {e}");
                let _ = outgoing_tx
                    .send(IpcServerMessage::ProtocolError {
                        request_id: None,
                        message: format!("Invalid message: {e}"),
                    })
                    .await;
                continue;
            }
        };

        match message {
            IpcClientMessage::AuthHandshake { .. } => {
                let _ = outgoing_tx
                    .send(IpcServerMessage::ProtocolError {
                        request_id: None,
                        message: String::from("Connection is already authenticated"),
                    })
                    .await;
            }
            IpcClientMessage::Invoke {
                request_id,
                channel,
                args,
            } => {
                let router = Arc::clone(&router);
                let outgoing_tx = outgoing_tx.clone();
                let peer = peer.clone();
                TokioSpawn(async move {
                    let outcome = match router.dispatch_from(&peer, &channel, args).await {
                        Ok(value) => IpcOutcome::Ok { value },
                        Err(safe) => IpcOutcome::Err {
                            error: serde_json::to_value(&safe)
                                .unwrap_or_else(|_| Value::String(safe.to_string())),
                        },
                    };
                    let response = IpcServerMessage::Response {
                        request_id,
                        outcome,
                    };
                    if outgoing_tx.send(response).await.is_err() {
                        debug!("Client {peer} left before response {request_id} on '{channel}'");
                    }
                });
            }
            IpcClientMessage::Send { channel, args } => {
                let router = Arc::clone(&router);
                let peer = peer.clone();
                TokioSpawn(async move {
                    router.dispatch_one_way(&peer, &channel, args).await;
                });
            }
        }
    };

    drop(outgoing_tx);
    let _ = writer.await;
    info!("Client {addr} disconnected");
    result
}

/// Read the first frame and check the token. `Ok(false)` closes the connection.
async fn authenticate(
    read: &mut WsRead,
    write: &mut WsWrite,
    state: &mut ConnectionState,
    addr: SocketAddr,
) -> Result<bool, IpcError> {
    let frame = match read.next().await {
        Some(Ok(Message::Text(text))) => text,
        Some(Ok(_)) => {
            warn!("Client {addr} sent a non-text first message");
            return Ok(false);
        }
        Some(Err(e)) => {
            return Err(IpcError::Read {
                message: format!("Error reading first message: {e}"),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        None => {
            warn!("Client {addr} disconnected before sending auth");
            return Ok(false);
        }
    };

    match serde_json::from_str::<IpcClientMessage>(frame.as_str()) {
        Ok(IpcClientMessage::AuthHandshake { token }) => {
            if state.validate_token(&token) {
                info!("Client {addr} authenticated successfully");
                send_frame(
                    write,
                    &IpcServerMessage::AuthHandshakeResponse {
                        success: true,
                        error: None,
                    },
                )
                .await?;
                Ok(state.is_authenticated())
            } else {
                warn!("Client {addr} auth failed: invalid token");
                send_frame(
                    write,
                    &IpcServerMessage::AuthHandshakeResponse {
                        success: false,
                        error: Some(String::from("Invalid authentication token")),
                    },
                )
                .await?;
                Ok(false)
            }
        }
        _ => {
            warn!("Client {addr} auth failed: first message was not auth handshake");
            Ok(false)
        }
    }
}

async fn write_frames(
    mut write: WsWrite,
    mut outgoing: mpsc::Receiver<IpcServerMessage>,
    addr: SocketAddr,
) {
    while let Some(message) = outgoing.recv().await {
        if let Err(e) = send_frame(&mut write, &message).await {
            error!("Failed to write to {addr}: {e}");
            break;
        }
    }
    let _ = write.close().await;
}

async fn send_frame(write: &mut WsWrite, message: &IpcServerMessage) -> Result<(), IpcError> {
    let json = serde_json::to_string(message).map_err(|e| IpcError::FrameEncode {
        message: format!("Failed to encode server message: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    write
        .send(Message::Text(json.into()))
        .await
        .map_err(|e| IpcError::Send {
            message: format!("Failed to send message: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })
}
