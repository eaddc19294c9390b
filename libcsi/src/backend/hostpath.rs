//! Hostpath storage backend for CSI.
//!
//! [`HostPathBackend`] implements [`CsiIdentity`], [`CsiController`], and
//! [`CsiNode`] on top of a local directory tree.  Volumes are directories
//! below the state root (see [`VolumeStore`]) and are made available to
//! containers by bind-mounting them at the CO-provided target path (see
//! [`MountManager`]).
//!
//! Volumes are not shared across nodes: a volume is only usable on the node
//! that holds its directory, which the CO learns from [`CsiNode::get_info`].
//!
//! # On-disk layout
//!
//! ```text
//! <state_root>/
//!   <volume-id>/            # backing directory, bind-mounted into pods
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use crate::controller::CsiController;
use crate::error::CsiError;
use crate::identity::CsiIdentity;
use crate::mount::{HostMounter, MountManager, Mounter};
use crate::node::CsiNode;
use crate::store::VolumeStore;
use crate::types::*;

/// Name reported by `GetPluginInfo`, in domain-name notation.
pub const PLUGIN_NAME: &str = "rk8s.hostpath.csi";

/// Message returned when a requested access mode cannot be honoured.
const UNSUPPORTED_ACCESS_MODE: &str = "unsupported access mode";

/// Concrete CSI backend backed by plain directories and bind mounts.
///
/// # Thread safety
///
/// The backend holds no per-volume state in memory.  Concurrent calls for
/// the same volume converge through idempotent filesystem operations, and
/// mount table changes are serialized per target path by [`MountManager`].
pub struct HostPathBackend {
    /// Backing directories, one per volume.
    store: VolumeStore,
    /// Bind mounts into pod target paths.
    mounts: MountManager,
    /// Node identifier (hostname or user-supplied string).
    node_id: String,
}

impl HostPathBackend {
    /// Create a backend that mounts through the host mount table.
    ///
    /// Call [`Self::recover`] afterwards to create the state root and pick up
    /// volumes from a previous run.
    ///
    /// * `state_root`: directory holding one sub-directory per volume
    /// * `node_id`: unique identifier for this node
    pub fn new(state_root: impl Into<PathBuf>, node_id: String) -> Self {
        Self::with_mounter(state_root, node_id, Arc::new(HostMounter))
    }

    /// Create a backend with a custom [`Mounter`], e.g.
    /// [`crate::mount::MemoryMounter`] when mount privileges are unavailable.
    pub fn with_mounter(
        state_root: impl Into<PathBuf>,
        node_id: String,
        mounter: Arc<dyn Mounter>,
    ) -> Self {
        Self {
            store: VolumeStore::new(state_root),
            mounts: MountManager::new(mounter),
            node_id,
        }
    }

    pub fn store(&self) -> &VolumeStore {
        &self.store
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Create the state root if needed and report volumes left by a previous
    /// process.  Returns the number of volumes found.
    ///
    /// Failing here is fatal for the plugin: without a state root no volume
    /// can be created.
    pub async fn recover(&self) -> Result<usize, CsiError> {
        self.store.init().await?;
        self.store.recover().await
    }
}

/// Convert the requested capacity into the informational size reported back.
fn requested_capacity(range: Option<CapacityRange>) -> Result<u64, CsiError> {
    let Some(range) = range else {
        return Ok(0);
    };
    u64::try_from(range.required_bytes).map_err(|_| {
        CsiError::InvalidArgument(format!(
            "required_bytes must not be negative, got {}",
            range.required_bytes
        ))
    })
}

// ---------------------------------------------------------------------------
// CsiIdentity
// ---------------------------------------------------------------------------

#[async_trait]
impl CsiIdentity for HostPathBackend {
    async fn get_plugin_info(&self) -> Result<PluginInfo, CsiError> {
        Ok(PluginInfo {
            name: PLUGIN_NAME.to_owned(),
            vendor_version: env!("CARGO_PKG_VERSION").to_owned(),
        })
    }

    async fn probe(&self) -> Result<bool, CsiError> {
        // Nothing initializes lazily; once serving, the plugin is ready.
        Ok(true)
    }

    async fn get_plugin_capabilities(&self) -> Result<Vec<PluginCapability>, CsiError> {
        Ok(vec![PluginCapability::ControllerService])
    }
}

// ---------------------------------------------------------------------------
// CsiController
// ---------------------------------------------------------------------------

#[async_trait]
impl CsiController for HostPathBackend {
    #[instrument(skip(self, req), fields(name = %req.name))]
    async fn create_volume(&self, req: CreateVolumeRequest) -> Result<Volume, CsiError> {
        if req.name.is_empty() {
            return Err(CsiError::invalid("volume name is required"));
        }
        if req.volume_capabilities.is_empty() {
            return Err(CsiError::invalid("volume capabilities are required"));
        }

        // The name is the ID: a retried create lands on the same directory.
        let volume_id = VolumeId(req.name);
        volume_id.validate()?;
        let capacity_bytes = requested_capacity(req.capacity_range)?;

        let path = self.store.ensure(&volume_id).await?;

        info!(%volume_id, path = %path.display(), capacity_bytes, "volume created");
        Ok(Volume {
            volume_id,
            capacity_bytes,
            volume_context: req.parameters,
        })
    }

    #[instrument(skip(self))]
    async fn delete_volume(&self, volume_id: &VolumeId) -> Result<(), CsiError> {
        volume_id.validate()?;
        self.store.remove(volume_id).await?;
        info!(%volume_id, "volume deleted");
        Ok(())
    }

    async fn validate_volume_capabilities(
        &self,
        volume_id: &VolumeId,
        capabilities: &[VolumeCapability],
    ) -> Result<ValidationOutcome, CsiError> {
        volume_id.validate()?;
        if capabilities.is_empty() {
            return Err(CsiError::invalid("volume capabilities are required"));
        }

        if let Some(cap) = capabilities.iter().find(|c| !c.mode().is_supported()) {
            debug!(%volume_id, mode = ?cap.mode(), "rejecting unsupported access mode");
            return Ok(ValidationOutcome::Unsupported {
                message: UNSUPPORTED_ACCESS_MODE.to_owned(),
            });
        }
        Ok(ValidationOutcome::Confirmed(capabilities.to_vec()))
    }

    async fn controller_get_capabilities(&self) -> Result<Vec<ControllerCapability>, CsiError> {
        Ok(vec![ControllerCapability::CreateDeleteVolume])
    }
}

// ---------------------------------------------------------------------------
// CsiNode
// ---------------------------------------------------------------------------

#[async_trait]
impl CsiNode for HostPathBackend {
    #[instrument(skip(self, req), fields(volume_id = %req.volume_id, target_path = %req.target_path.display()))]
    async fn publish_volume(&self, req: NodePublishVolumeRequest) -> Result<(), CsiError> {
        req.volume_id.validate()?;
        if req.target_path.as_os_str().is_empty() {
            return Err(CsiError::invalid("target path is required"));
        }
        if req.volume_capability.is_none() {
            return Err(CsiError::invalid("volume capability is required"));
        }

        // The controller normally created the directory already; on a
        // single-node cluster it may be this very process racing it.
        let source = self.store.ensure(&req.volume_id).await?;

        self.mounts
            .publish(&source, &req.target_path, req.read_only)
            .await?;

        info!(read_only = req.read_only, "volume published (bind-mount)");
        Ok(())
    }

    #[instrument(skip(self, target_path), fields(target_path = %target_path.display()))]
    async fn unpublish_volume(
        &self,
        volume_id: &VolumeId,
        target_path: &Path,
    ) -> Result<(), CsiError> {
        volume_id.validate()?;
        if target_path.as_os_str().is_empty() {
            return Err(CsiError::invalid("target path is required"));
        }

        self.mounts.unpublish(target_path).await?;

        info!(%volume_id, "volume unpublished");
        Ok(())
    }

    async fn node_get_capabilities(&self) -> Result<Vec<NodeCapability>, CsiError> {
        Ok(Vec::new())
    }

    async fn get_info(&self) -> Result<NodeInfo, CsiError> {
        Ok(NodeInfo {
            node_id: self.node_id.clone(),
            max_volumes: 0,
        })
    }
}
