//! Client-side transport seam.

use crate::error::invoke::InvokeError;
use crate::ipc::router::{IpcRouter, LOCAL_CALLER};

use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use serde_json::Value;
use tokio::spawn as TokioSpawn;
use tokio_util::sync::CancellationToken;

/// One round trip to the backend.
///
/// `call` is one attempt; retrying is the orchestrator's job. When `cancel`
/// fires the returned future resolves to [`InvokeError::Cancelled`] without
/// waiting for the backend.
pub trait Transport: Send + Sync {
    fn call(
        &self,
        channel: &str,
        args: Vec<Value>,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, Result<Value, InvokeError>>;

    fn send(&self, channel: &str, args: Vec<Value>) -> BoxFuture<'static, Result<(), InvokeError>>;
}

/// Transport over an [`IpcRouter`] in the same process.
///
/// Dispatches run as their own tasks, so cancelling a call never interrupts
/// the handler.
#[derive(Clone)]
pub struct LocalTransport {
    router: Arc<IpcRouter>,
}

impl LocalTransport {
    pub fn new(router: Arc<IpcRouter>) -> Self {
        Self { router }
    }

    pub fn router(&self) -> &Arc<IpcRouter> {
        &self.router
    }
}

impl Transport for LocalTransport {
    fn call(
        &self,
        channel: &str,
        args: Vec<Value>,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, Result<Value, InvokeError>> {
        let router = Arc::clone(&self.router);
        let channel = channel.to_string();

        async move {
            if cancel.is_cancelled() {
                return Err(InvokeError::cancelled(channel));
            }

            let dispatch_channel = channel.clone();
            let task = TokioSpawn(async move { router.dispatch(&dispatch_channel, args).await });

            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(InvokeError::cancelled(channel)),
                joined = task => match joined {
                    Ok(result) => result.map_err(InvokeError::remote),
                    Err(e) => Err(InvokeError::transport(format!(
                        "ECONNRESET: dispatch of '{channel}' aborted: {e}"
                    ))),
                },
            }
        }
        .boxed()
    }

    fn send(&self, channel: &str, args: Vec<Value>) -> BoxFuture<'static, Result<(), InvokeError>> {
        let router = Arc::clone(&self.router);
        let channel = channel.to_string();

        async move {
            TokioSpawn(async move {
                router.dispatch_one_way(LOCAL_CALLER, &channel, args).await;
            });
            Ok(())
        }
        .boxed()
    }
}
