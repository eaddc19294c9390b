//! CSI Controller service trait.
//!
//! The Controller service manages the volume lifecycle: creation, deletion
//! and capability validation.  It is called by the CO's provisioning sidecar.

use async_trait::async_trait;

use crate::error::CsiError;
use crate::types::{
    ControllerCapability, CreateVolumeRequest, ValidationOutcome, Volume, VolumeCapability,
    VolumeId,
};

/// Controller service: volume provisioning.
///
/// Every method must be safe to call again with the same arguments: the CO
/// retries on any failure and expects to converge on the same result.
#[async_trait]
pub trait CsiController: Send + Sync {
    /// Provision a volume, or return the existing one with the same name.
    ///
    /// The returned [`Volume`] carries the `volume_id` and `volume_context`
    /// that the CO forwards to subsequent Node operations.
    async fn create_volume(&self, req: CreateVolumeRequest) -> Result<Volume, CsiError>;

    /// Delete a volume.  Deleting an unknown volume succeeds.
    async fn delete_volume(&self, volume_id: &VolumeId) -> Result<(), CsiError>;

    /// Check whether the given capabilities are compatible with the volume.
    ///
    /// An unsupported capability is reported through
    /// [`ValidationOutcome::Unsupported`], not as an error.
    async fn validate_volume_capabilities(
        &self,
        volume_id: &VolumeId,
        capabilities: &[VolumeCapability],
    ) -> Result<ValidationOutcome, CsiError>;

    /// Optional Controller RPCs implemented by this plugin.
    async fn controller_get_capabilities(&self) -> Result<Vec<ControllerCapability>, CsiError>;
}
