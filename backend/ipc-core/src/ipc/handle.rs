//! Handle to a running IPC server.

use std::net::SocketAddr;

use log::info;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Returned by [`start_ipc_server`](crate::ipc::start_ipc_server).
///
/// Dropping the handle leaves the server running; call [`shutdown`](Self::shutdown)
/// to stop accepting and close every open connection.
pub struct IpcServerHandle {
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    accept_task: JoinHandle<()>,
}

impl IpcServerHandle {
    pub(crate) fn new(
        local_addr: SocketAddr,
        shutdown: CancellationToken,
        accept_task: JoinHandle<()>,
    ) -> Self {
        Self {
            local_addr,
            shutdown,
            accept_task,
        }
    }

    /// Actual bound address. Useful when started on port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Stop the accept loop and signal every connection to close.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        let _ = self.accept_task.await;
        info!("IPC server on {} stopped", self.local_addr);
    }
}
