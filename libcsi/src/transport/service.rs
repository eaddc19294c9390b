//! tonic service adapters.
//!
//! Each adapter owns an `Arc` to the shared handler, converts the wire
//! request into domain types, calls the matching trait method and converts
//! the result back.  RPCs this plugin does not offer answer `UNIMPLEMENTED`.

use std::path::Path;
use std::sync::Arc;

use tonic::{Request, Response, Status};

use crate::controller::CsiController;
use crate::error::CsiError;
use crate::identity::CsiIdentity;
use crate::message::csi;
use crate::node::CsiNode;
use crate::types::{CreateVolumeRequest, NodePublishVolumeRequest, VolumeCapability, VolumeId};

type RpcResult<T> = Result<Response<T>, Status>;

fn unimplemented<T>(rpc: &'static str) -> RpcResult<T> {
    Err(CsiError::Unimplemented(rpc).into())
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// `csi.v1.Identity` backed by a [`CsiIdentity`] handler.
pub struct IdentityService<T> {
    handler: Arc<T>,
}

impl<T> IdentityService<T> {
    pub fn new(handler: Arc<T>) -> Self {
        Self { handler }
    }
}

#[tonic::async_trait]
impl<T: CsiIdentity + 'static> csi::identity_server::Identity for IdentityService<T> {
    async fn get_plugin_info(
        &self,
        _request: Request<csi::GetPluginInfoRequest>,
    ) -> RpcResult<csi::GetPluginInfoResponse> {
        let info = self.handler.get_plugin_info().await?;
        Ok(Response::new(csi::GetPluginInfoResponse::from(info)))
    }

    async fn get_plugin_capabilities(
        &self,
        _request: Request<csi::GetPluginCapabilitiesRequest>,
    ) -> RpcResult<csi::GetPluginCapabilitiesResponse> {
        let caps = self.handler.get_plugin_capabilities().await?;
        Ok(Response::new(csi::GetPluginCapabilitiesResponse {
            capabilities: caps.into_iter().map(Into::into).collect(),
        }))
    }

    async fn probe(&self, _request: Request<csi::ProbeRequest>) -> RpcResult<csi::ProbeResponse> {
        let ready = self.handler.probe().await?;
        Ok(Response::new(csi::ProbeResponse { ready: Some(ready) }))
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// `csi.v1.Controller` backed by a [`CsiController`] handler.
pub struct ControllerService<T> {
    handler: Arc<T>,
}

impl<T> ControllerService<T> {
    pub fn new(handler: Arc<T>) -> Self {
        Self { handler }
    }
}

#[tonic::async_trait]
impl<T: CsiController + 'static> csi::controller_server::Controller for ControllerService<T> {
    async fn create_volume(
        &self,
        request: Request<csi::CreateVolumeRequest>,
    ) -> RpcResult<csi::CreateVolumeResponse> {
        let req = CreateVolumeRequest::from(request.into_inner());
        let volume = self.handler.create_volume(req).await?;
        Ok(Response::new(csi::CreateVolumeResponse {
            volume: Some(volume.into()),
        }))
    }

    async fn delete_volume(
        &self,
        request: Request<csi::DeleteVolumeRequest>,
    ) -> RpcResult<csi::DeleteVolumeResponse> {
        let volume_id = VolumeId(request.into_inner().volume_id);
        self.handler.delete_volume(&volume_id).await?;
        Ok(Response::new(csi::DeleteVolumeResponse {}))
    }

    async fn controller_publish_volume(
        &self,
        _request: Request<csi::ControllerPublishVolumeRequest>,
    ) -> RpcResult<csi::ControllerPublishVolumeResponse> {
        unimplemented("ControllerPublishVolume")
    }

    async fn controller_unpublish_volume(
        &self,
        _request: Request<csi::ControllerUnpublishVolumeRequest>,
    ) -> RpcResult<csi::ControllerUnpublishVolumeResponse> {
        unimplemented("ControllerUnpublishVolume")
    }

    async fn validate_volume_capabilities(
        &self,
        request: Request<csi::ValidateVolumeCapabilitiesRequest>,
    ) -> RpcResult<csi::ValidateVolumeCapabilitiesResponse> {
        let req = request.into_inner();
        let volume_id = VolumeId(req.volume_id);
        let caps: Vec<VolumeCapability> =
            req.volume_capabilities.into_iter().map(Into::into).collect();
        let outcome = self
            .handler
            .validate_volume_capabilities(&volume_id, &caps)
            .await?;
        Ok(Response::new(csi::ValidateVolumeCapabilitiesResponse::from(outcome)))
    }

    async fn list_volumes(
        &self,
        _request: Request<csi::ListVolumesRequest>,
    ) -> RpcResult<csi::ListVolumesResponse> {
        unimplemented("ListVolumes")
    }

    async fn get_capacity(
        &self,
        _request: Request<csi::GetCapacityRequest>,
    ) -> RpcResult<csi::GetCapacityResponse> {
        unimplemented("GetCapacity")
    }

    async fn controller_get_capabilities(
        &self,
        _request: Request<csi::ControllerGetCapabilitiesRequest>,
    ) -> RpcResult<csi::ControllerGetCapabilitiesResponse> {
        let caps = self.handler.controller_get_capabilities().await?;
        Ok(Response::new(csi::ControllerGetCapabilitiesResponse {
            capabilities: caps.into_iter().map(Into::into).collect(),
        }))
    }

    async fn create_snapshot(
        &self,
        _request: Request<csi::CreateSnapshotRequest>,
    ) -> RpcResult<csi::CreateSnapshotResponse> {
        unimplemented("CreateSnapshot")
    }

    async fn delete_snapshot(
        &self,
        _request: Request<csi::DeleteSnapshotRequest>,
    ) -> RpcResult<csi::DeleteSnapshotResponse> {
        unimplemented("DeleteSnapshot")
    }

    async fn list_snapshots(
        &self,
        _request: Request<csi::ListSnapshotsRequest>,
    ) -> RpcResult<csi::ListSnapshotsResponse> {
        unimplemented("ListSnapshots")
    }

    async fn controller_expand_volume(
        &self,
        _request: Request<csi::ControllerExpandVolumeRequest>,
    ) -> RpcResult<csi::ControllerExpandVolumeResponse> {
        unimplemented("ControllerExpandVolume")
    }

    async fn controller_get_volume(
        &self,
        _request: Request<csi::ControllerGetVolumeRequest>,
    ) -> RpcResult<csi::ControllerGetVolumeResponse> {
        unimplemented("ControllerGetVolume")
    }

    async fn controller_modify_volume(
        &self,
        _request: Request<csi::ControllerModifyVolumeRequest>,
    ) -> RpcResult<csi::ControllerModifyVolumeResponse> {
        unimplemented("ControllerModifyVolume")
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// `csi.v1.Node` backed by a [`CsiNode`] handler.
pub struct NodeService<T> {
    handler: Arc<T>,
}

impl<T> NodeService<T> {
    pub fn new(handler: Arc<T>) -> Self {
        Self { handler }
    }
}

#[tonic::async_trait]
impl<T: CsiNode + 'static> csi::node_server::Node for NodeService<T> {
    async fn node_stage_volume(
        &self,
        _request: Request<csi::NodeStageVolumeRequest>,
    ) -> RpcResult<csi::NodeStageVolumeResponse> {
        unimplemented("NodeStageVolume")
    }

    async fn node_unstage_volume(
        &self,
        _request: Request<csi::NodeUnstageVolumeRequest>,
    ) -> RpcResult<csi::NodeUnstageVolumeResponse> {
        unimplemented("NodeUnstageVolume")
    }

    async fn node_publish_volume(
        &self,
        request: Request<csi::NodePublishVolumeRequest>,
    ) -> RpcResult<csi::NodePublishVolumeResponse> {
        let req = NodePublishVolumeRequest::from(request.into_inner());
        self.handler.publish_volume(req).await?;
        Ok(Response::new(csi::NodePublishVolumeResponse {}))
    }

    async fn node_unpublish_volume(
        &self,
        request: Request<csi::NodeUnpublishVolumeRequest>,
    ) -> RpcResult<csi::NodeUnpublishVolumeResponse> {
        let req = request.into_inner();
        let volume_id = VolumeId(req.volume_id);
        self.handler
            .unpublish_volume(&volume_id, Path::new(&req.target_path))
            .await?;
        Ok(Response::new(csi::NodeUnpublishVolumeResponse {}))
    }

    async fn node_get_volume_stats(
        &self,
        _request: Request<csi::NodeGetVolumeStatsRequest>,
    ) -> RpcResult<csi::NodeGetVolumeStatsResponse> {
        unimplemented("NodeGetVolumeStats")
    }

    async fn node_expand_volume(
        &self,
        _request: Request<csi::NodeExpandVolumeRequest>,
    ) -> RpcResult<csi::NodeExpandVolumeResponse> {
        unimplemented("NodeExpandVolume")
    }

    async fn node_get_capabilities(
        &self,
        _request: Request<csi::NodeGetCapabilitiesRequest>,
    ) -> RpcResult<csi::NodeGetCapabilitiesResponse> {
        let caps = self.handler.node_get_capabilities().await?;
        Ok(Response::new(csi::NodeGetCapabilitiesResponse {
            capabilities: caps.into_iter().map(Into::into).collect(),
        }))
    }

    async fn node_get_info(
        &self,
        _request: Request<csi::NodeGetInfoRequest>,
    ) -> RpcResult<csi::NodeGetInfoResponse> {
        let info = self.handler.get_info().await?;
        Ok(Response::new(csi::NodeGetInfoResponse::from(info)))
    }
}
