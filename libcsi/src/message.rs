//! CSI protocol messages.
//!
//! [`csi`] holds the `csi.v1` bindings generated by `tonic-build` from
//! `proto/csi.proto`.  The rest of this module converts between those wire
//! messages and the domain types in [`crate::types`], so the handler traits
//! never see protobuf structures.

use crate::types::*;

/// Generated `csi.v1` messages, service traits and clients.
#[allow(clippy::all, missing_docs)]
pub mod csi {
    tonic::include_proto!("csi.v1");
}

use csi::volume_capability::access_mode::Mode;

// ----- Access mode ---------------------------------------------------------

impl From<Mode> for AccessMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Unknown => Self::Unknown,
            Mode::SingleNodeWriter => Self::SingleNodeWriter,
            Mode::SingleNodeReaderOnly => Self::SingleNodeReaderOnly,
            Mode::MultiNodeReaderOnly => Self::MultiNodeReaderOnly,
            Mode::MultiNodeSingleWriter => Self::MultiNodeSingleWriter,
            Mode::MultiNodeMultiWriter => Self::MultiNodeMultiWriter,
            Mode::SingleNodeSingleWriter => Self::SingleNodeSingleWriter,
            Mode::SingleNodeMultiWriter => Self::SingleNodeMultiWriter,
        }
    }
}

impl From<AccessMode> for Mode {
    fn from(mode: AccessMode) -> Self {
        match mode {
            AccessMode::Unknown => Self::Unknown,
            AccessMode::SingleNodeWriter => Self::SingleNodeWriter,
            AccessMode::SingleNodeReaderOnly => Self::SingleNodeReaderOnly,
            AccessMode::MultiNodeReaderOnly => Self::MultiNodeReaderOnly,
            AccessMode::MultiNodeSingleWriter => Self::MultiNodeSingleWriter,
            AccessMode::MultiNodeMultiWriter => Self::MultiNodeMultiWriter,
            AccessMode::SingleNodeSingleWriter => Self::SingleNodeSingleWriter,
            AccessMode::SingleNodeMultiWriter => Self::SingleNodeMultiWriter,
        }
    }
}

// ----- Volume capability ---------------------------------------------------

impl From<csi::VolumeCapability> for VolumeCapability {
    fn from(cap: csi::VolumeCapability) -> Self {
        use csi::volume_capability::AccessType as Wire;

        let access_type = cap.access_type.map(|t| match t {
            Wire::Block(_) => AccessType::Block,
            Wire::Mount(m) => AccessType::Mount {
                fs_type: m.fs_type,
                mount_flags: m.mount_flags,
                volume_mount_group: m.volume_mount_group,
            },
        });
        let access_mode = cap
            .access_mode
            .map(|m| Mode::try_from(m.mode).map_or(AccessMode::Unknown, AccessMode::from));

        Self {
            access_type,
            access_mode,
        }
    }
}

impl From<VolumeCapability> for csi::VolumeCapability {
    fn from(cap: VolumeCapability) -> Self {
        use csi::volume_capability::{
            AccessMode as WireMode, AccessType as Wire, BlockVolume, MountVolume,
        };

        let access_type = cap.access_type.map(|t| match t {
            AccessType::Block => Wire::Block(BlockVolume {}),
            AccessType::Mount {
                fs_type,
                mount_flags,
                volume_mount_group,
            } => Wire::Mount(MountVolume {
                fs_type,
                mount_flags,
                volume_mount_group,
            }),
        });
        let access_mode = cap.access_mode.map(|m| WireMode {
            mode: Mode::from(m) as i32,
        });

        Self {
            access_type,
            access_mode,
        }
    }
}

impl From<ValidationOutcome> for csi::ValidateVolumeCapabilitiesResponse {
    fn from(outcome: ValidationOutcome) -> Self {
        match outcome {
            ValidationOutcome::Confirmed(caps) => Self {
                confirmed: Some(csi::validate_volume_capabilities_response::Confirmed {
                    volume_capabilities: caps.into_iter().map(Into::into).collect(),
                    ..Default::default()
                }),
                message: String::new(),
            },
            ValidationOutcome::Unsupported { message } => Self {
                confirmed: None,
                message,
            },
        }
    }
}

// ----- Controller ----------------------------------------------------------

impl From<csi::CreateVolumeRequest> for CreateVolumeRequest {
    fn from(req: csi::CreateVolumeRequest) -> Self {
        Self {
            name: req.name,
            capacity_range: req.capacity_range.map(|r| CapacityRange {
                required_bytes: r.required_bytes,
                limit_bytes: r.limit_bytes,
            }),
            volume_capabilities: req.volume_capabilities.into_iter().map(Into::into).collect(),
            parameters: req.parameters,
        }
    }
}

impl From<Volume> for csi::Volume {
    fn from(vol: Volume) -> Self {
        Self {
            capacity_bytes: i64::try_from(vol.capacity_bytes).unwrap_or(i64::MAX),
            volume_id: vol.volume_id.0,
            volume_context: vol.volume_context,
            content_source: None,
            accessible_topology: Vec::new(),
        }
    }
}

impl From<ControllerCapability> for csi::ControllerServiceCapability {
    fn from(cap: ControllerCapability) -> Self {
        use csi::controller_service_capability::{Rpc, Type, rpc::Type as RpcType};

        let rpc = match cap {
            ControllerCapability::CreateDeleteVolume => RpcType::CreateDeleteVolume,
        };
        Self {
            r#type: Some(Type::Rpc(Rpc { r#type: rpc as i32 })),
        }
    }
}

// ----- Node ----------------------------------------------------------------

impl From<csi::NodePublishVolumeRequest> for NodePublishVolumeRequest {
    fn from(req: csi::NodePublishVolumeRequest) -> Self {
        Self {
            volume_id: VolumeId(req.volume_id),
            target_path: req.target_path.into(),
            volume_capability: req.volume_capability.map(Into::into),
            read_only: req.readonly,
        }
    }
}

impl From<NodeCapability> for csi::NodeServiceCapability {
    fn from(cap: NodeCapability) -> Self {
        match cap {}
    }
}

impl From<NodeInfo> for csi::NodeGetInfoResponse {
    fn from(info: NodeInfo) -> Self {
        Self {
            node_id: info.node_id,
            max_volumes_per_node: i64::try_from(info.max_volumes).unwrap_or(i64::MAX),
            accessible_topology: None,
        }
    }
}

// ----- Identity ------------------------------------------------------------

impl From<PluginInfo> for csi::GetPluginInfoResponse {
    fn from(info: PluginInfo) -> Self {
        Self {
            name: info.name,
            vendor_version: info.vendor_version,
            manifest: Default::default(),
        }
    }
}

impl From<PluginCapability> for csi::PluginCapability {
    fn from(cap: PluginCapability) -> Self {
        use csi::plugin_capability::{Service, Type, service::Type as ServiceType};

        let service = match cap {
            PluginCapability::ControllerService => ServiceType::ControllerService,
        };
        Self {
            r#type: Some(Type::Service(Service {
                r#type: service as i32,
            })),
        }
    }
}
