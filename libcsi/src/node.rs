//! CSI Node service trait.
//!
//! The Node service runs on each worker node and makes volumes visible to
//! workloads:
//!
//! 1. **Publish**: bind-mount the volume's backing directory into the pod.
//! 2. **Unpublish**: remove that bind mount.
//!
//! Staging is not used; the CO calls publish directly.

use std::path::Path;

use async_trait::async_trait;

use crate::error::CsiError;
use crate::types::{NodeCapability, NodeInfo, NodePublishVolumeRequest, VolumeId};

/// Node service: local mount / unmount operations.
#[async_trait]
pub trait CsiNode: Send + Sync {
    /// Publish a volume: bind-mount its backing directory at `target_path`.
    ///
    /// This is idempotent; calling it again for the same `target_path` should
    /// succeed without error.
    async fn publish_volume(&self, req: NodePublishVolumeRequest) -> Result<(), CsiError>;

    /// Unpublish a volume: unmount the bind mount at `target_path`.
    ///
    /// This is idempotent.
    async fn unpublish_volume(
        &self,
        volume_id: &VolumeId,
        target_path: &Path,
    ) -> Result<(), CsiError>;

    /// Optional Node RPCs implemented by this plugin.
    async fn node_get_capabilities(&self) -> Result<Vec<NodeCapability>, CsiError>;

    /// Return information about the node on which this service is running.
    async fn get_info(&self) -> Result<NodeInfo, CsiError>;
}
