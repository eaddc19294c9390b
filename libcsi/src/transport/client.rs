//! gRPC client for a CSI endpoint, used by health probes and tests.

use hyper_util::rt::TokioIo;
use tokio::net::UnixStream;
use tonic::transport::{Channel, Endpoint as ChannelEndpoint, Uri};
use tower::service_fn;
use tracing::debug;

use super::endpoint::Endpoint;
use crate::error::CsiError;
use crate::message::csi::controller_client::ControllerClient;
use crate::message::csi::identity_client::IdentityClient;
use crate::message::csi::node_client::NodeClient;
use crate::message::csi::ProbeRequest;

/// A connected channel to one CSI plugin.  Cloning is cheap; all clones
/// share the underlying connection.
#[derive(Debug, Clone)]
pub struct CsiClient {
    channel: Channel,
}

impl CsiClient {
    /// Connect to the plugin listening on `endpoint`.
    pub async fn connect(endpoint: &Endpoint) -> Result<Self, CsiError> {
        let channel = match endpoint {
            Endpoint::Unix(path) => {
                let path = path.clone();
                // The URI is required by tonic but ignored by the connector.
                ChannelEndpoint::from_static("http://[::]:50051")
                    .connect_with_connector(service_fn(move |_: Uri| {
                        let path = path.clone();
                        async move {
                            let stream = UnixStream::connect(path).await?;
                            Ok::<_, std::io::Error>(TokioIo::new(stream))
                        }
                    }))
                    .await
                    .map_err(CsiError::transport)?
            }
            Endpoint::Tcp(addr) => ChannelEndpoint::from_shared(format!("http://{addr}"))
                .map_err(|e| CsiError::InvalidEndpoint(format!("tcp://{addr}: {e}")))?
                .connect()
                .await
                .map_err(CsiError::transport)?,
        };
        debug!(%endpoint, "CSI client connected");
        Ok(Self { channel })
    }

    pub fn identity(&self) -> IdentityClient<Channel> {
        IdentityClient::new(self.channel.clone())
    }

    pub fn controller(&self) -> ControllerClient<Channel> {
        ControllerClient::new(self.channel.clone())
    }

    pub fn node(&self) -> NodeClient<Channel> {
        NodeClient::new(self.channel.clone())
    }

    /// Ask the plugin whether it is ready.  An unset `ready` field counts as
    /// ready.
    pub async fn probe(&self) -> Result<bool, CsiError> {
        let resp = self
            .identity()
            .probe(ProbeRequest {})
            .await
            .map_err(|s| CsiError::TransportError(format!("probe: {}: {}", s.code(), s.message())))?;
        Ok(resp.into_inner().ready.unwrap_or(true))
    }
}
