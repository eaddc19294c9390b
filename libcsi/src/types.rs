//! Core CSI types: volumes, capabilities, requests, and plugin metadata.
//!
//! These types form the data model shared by the CSI traits and the backend
//! implementation.  They are deliberately independent of the generated
//! protobuf code; [`crate::message`] converts between the two at the gRPC
//! boundary.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use crate::error::CsiError;

// ---------------------------------------------------------------------------
// Volume identity
// ---------------------------------------------------------------------------

/// Opaque, unique identifier for a volume.
///
/// The identifier doubles as the name of the volume's backing directory, so
/// it must be a single, non-empty path component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct VolumeId(pub String);

impl VolumeId {
    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check that the identifier can be used as a directory name below the
    /// state root.
    pub fn validate(&self) -> Result<(), CsiError> {
        let id = self.0.as_str();
        if id.is_empty() {
            return Err(CsiError::invalid("volume ID is required"));
        }
        if id == "." || id == ".." || id.contains('/') || id.contains('\0') {
            return Err(CsiError::InvalidArgument(format!(
                "volume ID {id:?} is not a valid directory name"
            )));
        }
        Ok(())
    }
}

impl fmt::Display for VolumeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for VolumeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VolumeId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Access mode & capabilities
// ---------------------------------------------------------------------------

/// Describes how a volume may be accessed.
///
/// Mirrors `VolumeCapability.AccessMode.Mode`; wire values this crate does not
/// know decode to [`AccessMode::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    Unknown,
    /// Single-node read-write.
    SingleNodeWriter,
    /// Single-node read-only.
    SingleNodeReaderOnly,
    /// Multi-node read-only.
    MultiNodeReaderOnly,
    /// Multi-node, at most one writer.
    MultiNodeSingleWriter,
    /// Multi-node read-write.
    MultiNodeMultiWriter,
    /// Single-node, single workload read-write.
    SingleNodeSingleWriter,
    /// Single-node, many workloads read-write.
    SingleNodeMultiWriter,
}

impl AccessMode {
    /// Access modes a hostpath volume can honour.
    pub const SUPPORTED: [AccessMode; 3] = [
        AccessMode::SingleNodeWriter,
        AccessMode::SingleNodeReaderOnly,
        AccessMode::MultiNodeReaderOnly,
    ];

    pub fn is_supported(self) -> bool {
        Self::SUPPORTED.contains(&self)
    }
}

/// How the volume is presented to the workload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessType {
    /// Raw block device.
    Block,
    /// Mounted filesystem.
    Mount {
        /// Filesystem type, empty when the CO leaves it to the plugin.
        fs_type: String,
        /// Additional mount flags (e.g. `"noatime"`).
        mount_flags: Vec<String>,
        /// Group ownership requested for the mounted volume.
        volume_mount_group: String,
    },
}

/// Describes the capabilities required from a volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeCapability {
    pub access_type: Option<AccessType>,
    /// Requested access mode; `None` when the CO omitted it.
    pub access_mode: Option<AccessMode>,
}

impl VolumeCapability {
    /// A filesystem capability with the given access mode.
    pub fn mount(access_mode: AccessMode) -> Self {
        Self {
            access_type: Some(AccessType::Mount {
                fs_type: String::new(),
                mount_flags: Vec::new(),
                volume_mount_group: String::new(),
            }),
            access_mode: Some(access_mode),
        }
    }

    /// The effective access mode; an omitted mode counts as unknown.
    pub fn mode(&self) -> AccessMode {
        self.access_mode.unwrap_or(AccessMode::Unknown)
    }
}

impl Default for VolumeCapability {
    fn default() -> Self {
        Self::mount(AccessMode::SingleNodeWriter)
    }
}

/// Result of checking requested capabilities against what a volume supports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// Every capability is supported; carries the capabilities as requested.
    Confirmed(Vec<VolumeCapability>),
    /// At least one capability is unsupported.  This is not an error: the
    /// call succeeds and reports why nothing was confirmed.
    Unsupported { message: String },
}

// ---------------------------------------------------------------------------
// Volume metadata
// ---------------------------------------------------------------------------

/// Description of a provisioned volume as reported to the CO.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Volume {
    /// Unique volume identifier.
    pub volume_id: VolumeId,
    /// Requested capacity in bytes.  Informational only, never enforced.
    pub capacity_bytes: u64,
    /// Opaque context passed from Controller to Node operations.
    pub volume_context: HashMap<String, String>,
}

/// Capacity bounds from a create request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapacityRange {
    pub required_bytes: i64,
    pub limit_bytes: i64,
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Request to create a new volume.
#[derive(Debug, Clone, Default)]
pub struct CreateVolumeRequest {
    /// Caller-chosen name, also used as the volume ID.
    pub name: String,
    /// Desired capacity, if the CO expressed one.
    pub capacity_range: Option<CapacityRange>,
    /// Required capabilities.
    pub volume_capabilities: Vec<VolumeCapability>,
    /// Storage-class parameters, echoed back as the volume context.
    pub parameters: HashMap<String, String>,
}

/// Request to publish (bind-mount) a volume into a workload.
#[derive(Debug, Clone, Default)]
pub struct NodePublishVolumeRequest {
    /// Volume to publish.
    pub volume_id: VolumeId,
    /// Target path inside the pod's volume directory,
    /// e.g. `/var/lib/kubelet/pods/<pod-uid>/volumes/<vol-name>/mount`.
    pub target_path: PathBuf,
    /// Requested capability.
    pub volume_capability: Option<VolumeCapability>,
    /// Whether the bind mount should be read-only.
    pub read_only: bool,
}

// ---------------------------------------------------------------------------
// Plugin & node info
// ---------------------------------------------------------------------------

/// Information about the CSI plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginInfo {
    /// Plugin name, e.g. `"rk8s.hostpath.csi"`.
    pub name: String,
    /// Vendor-provided version string.
    pub vendor_version: String,
}

/// Services advertised by the CSI plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginCapability {
    /// Plugin provides a Controller service.
    ControllerService,
}

/// Optional Controller RPCs a plugin may advertise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerCapability {
    CreateDeleteVolume,
}

/// Optional Node RPCs a plugin may advertise.  Hostpath volumes need no
/// staging, stats or expansion, so there is nothing to advertise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeCapability {}

/// Information about the node on which the CSI Node service runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    /// Unique node identifier.
    pub node_id: String,
    /// Maximum number of volumes the node can host, 0 for unlimited.
    pub max_volumes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_id_display() {
        let id = VolumeId("pvc-abc".into());
        assert_eq!(id.to_string(), "pvc-abc");
    }

    #[test]
    fn volume_id_validation() {
        assert!(VolumeId::from("pvc-1").validate().is_ok());
        assert!(VolumeId::from("pvc.with.dots").validate().is_ok());

        for bad in ["", ".", "..", "a/b", "../escape", "nul\0byte"] {
            let err = VolumeId::from(bad).validate().unwrap_err();
            assert!(matches!(err, CsiError::InvalidArgument(_)), "{bad:?}");
        }
    }

    #[test]
    fn supported_access_modes() {
        assert!(AccessMode::SingleNodeWriter.is_supported());
        assert!(AccessMode::SingleNodeReaderOnly.is_supported());
        assert!(AccessMode::MultiNodeReaderOnly.is_supported());
        assert!(!AccessMode::MultiNodeMultiWriter.is_supported());
        assert!(!AccessMode::Unknown.is_supported());
    }

    #[test]
    fn missing_access_mode_is_unknown() {
        let cap = VolumeCapability {
            access_type: None,
            access_mode: None,
        };
        assert_eq!(cap.mode(), AccessMode::Unknown);
    }

    #[test]
    fn volume_capability_default() {
        let cap = VolumeCapability::default();
        assert_eq!(cap.mode(), AccessMode::SingleNodeWriter);
        assert!(matches!(cap.access_type, Some(AccessType::Mount { .. })));
    }

    #[test]
    fn create_volume_request_default() {
        let req = CreateVolumeRequest::default();
        assert!(req.name.is_empty());
        assert!(req.capacity_range.is_none());
    }
}
