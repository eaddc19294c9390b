//! gRPC server that exposes the CSI Identity, Controller and Node services
//! on a unix socket or TCP address.

use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::net::{TcpListener, UnixListener};
use tokio_stream::wrappers::{TcpListenerStream, UnixListenerStream};
use tonic::transport::Server;
use tracing::{debug, info, warn};

use super::endpoint::Endpoint;
use super::interceptor::CallLogLayer;
use super::service::{ControllerService, IdentityService, NodeService};
use crate::controller::CsiController;
use crate::error::CsiError;
use crate::identity::CsiIdentity;
use crate::message::csi::controller_server::ControllerServer;
use crate::message::csi::identity_server::IdentityServer;
use crate::message::csi::node_server::NodeServer;
use crate::node::CsiNode;

enum Listener {
    Unix { listener: UnixListener, path: PathBuf },
    Tcp(TcpListener),
}

/// A CSI server bound to its endpoint, dispatching every call to one shared
/// [`CsiIdentity`] + [`CsiController`] + [`CsiNode`] implementation.
pub struct CsiServer<T> {
    listener: Listener,
    handler: Arc<T>,
}

impl<T> CsiServer<T>
where
    T: CsiIdentity + CsiController + CsiNode + 'static,
{
    /// Bind the listener for `endpoint`.
    ///
    /// For a unix socket, a file left behind by a previous run is removed
    /// and the parent directory is created first.
    pub async fn bind(endpoint: &Endpoint, handler: Arc<T>) -> Result<Self, CsiError> {
        let listener = match endpoint {
            Endpoint::Unix(path) => {
                prepare_socket_path(path).await?;
                let listener = UnixListener::bind(path).map_err(|e| {
                    CsiError::TransportError(format!("bind {}: {e}", path.display()))
                })?;
                Listener::Unix {
                    listener,
                    path: path.clone(),
                }
            }
            Endpoint::Tcp(addr) => {
                let listener = TcpListener::bind(addr.as_str())
                    .await
                    .map_err(|e| CsiError::TransportError(format!("bind {addr}: {e}")))?;
                Listener::Tcp(listener)
            }
        };

        let server = Self { listener, handler };
        info!(endpoint = %server.local_addr()?, "CSI gRPC server listening");
        Ok(server)
    }

    /// The endpoint actually bound; for `tcp://host:0` this carries the
    /// port the kernel picked.
    pub fn local_addr(&self) -> Result<Endpoint, CsiError> {
        match &self.listener {
            Listener::Unix { path, .. } => Ok(Endpoint::Unix(path.clone())),
            Listener::Tcp(listener) => {
                let addr = listener.local_addr().map_err(CsiError::transport)?;
                Ok(Endpoint::Tcp(addr.to_string()))
            }
        }
    }

    /// Serve until the process is killed.
    pub async fn serve(self) -> Result<(), CsiError> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Serve until `signal` resolves, then stop accepting calls, let
    /// in-flight calls finish, and remove the unix socket file.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<(), CsiError>
    where
        F: Future<Output = ()> + Send,
    {
        let router = Server::builder()
            .layer(CallLogLayer)
            .add_service(IdentityServer::new(IdentityService::new(Arc::clone(
                &self.handler,
            ))))
            .add_service(ControllerServer::new(ControllerService::new(Arc::clone(
                &self.handler,
            ))))
            .add_service(NodeServer::new(NodeService::new(Arc::clone(&self.handler))));
        match self.listener {
            Listener::Unix { listener, path } => {
                let served = router
                    .serve_with_incoming_shutdown(UnixListenerStream::new(listener), signal)
                    .await;
                remove_socket(&path).await;
                served.map_err(CsiError::transport)?;
            }
            Listener::Tcp(listener) => {
                router
                    .serve_with_incoming_shutdown(TcpListenerStream::new(listener), signal)
                    .await
                    .map_err(CsiError::transport)?;
            }
        }
        info!("CSI gRPC server stopped");
        Ok(())
    }
}

/// Clear a stale socket file and make sure its directory exists.
async fn prepare_socket_path(path: &Path) -> Result<(), CsiError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "removed stale socket"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            return Err(CsiError::TransportError(format!(
                "remove stale socket {}: {e}",
                path.display()
            )));
        }
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            CsiError::TransportError(format!("create socket dir {}: {e}", parent.display()))
        })?;
    }
    Ok(())
}

async fn remove_socket(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await
        && e.kind() != ErrorKind::NotFound
    {
        warn!(path = %path.display(), error = %e, "failed to remove socket");
    }
}
