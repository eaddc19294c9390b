//! gRPC integration tests
//!
//! These tests drive the full path: generated client → unix socket →
//! CsiServer → HostPathBackend, with an in-memory mounter standing in for
//! the host mount table.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use libcsi::backend::{HostPathBackend, PLUGIN_NAME};
use libcsi::message::csi;
use libcsi::mount::MemoryMounter;
use libcsi::{CsiClient, CsiServer, Endpoint};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tonic::Code;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;

fn init_logger() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// One plugin process serving on a socket inside a temp dir.
struct Plugin {
    tmp: tempfile::TempDir,
    socket: PathBuf,
    mounter: Arc<MemoryMounter>,
    client: CsiClient,
    shutdown: oneshot::Sender<()>,
    server: JoinHandle<Result<(), libcsi::CsiError>>,
}

impl Plugin {
    async fn start() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let socket = tmp.path().join("plugins/csi.sock");
        Self::start_at(tmp, socket).await
    }

    async fn start_at(tmp: tempfile::TempDir, socket: PathBuf) -> Self {
        init_logger();

        let mounter = Arc::new(MemoryMounter::new());
        let backend = Arc::new(HostPathBackend::with_mounter(
            tmp.path().join("volumes"),
            "node-a".to_owned(),
            mounter.clone(),
        ));
        backend.recover().await.unwrap();

        let endpoint = Endpoint::Unix(socket.clone());
        let server = CsiServer::bind(&endpoint, backend).await.unwrap();
        let (shutdown, rx) = oneshot::channel::<()>();
        let server = tokio::spawn(server.serve_with_shutdown(async move {
            let _ = rx.await;
        }));

        let client = CsiClient::connect(&endpoint).await.unwrap();
        Self {
            tmp,
            socket,
            mounter,
            client,
            shutdown,
            server,
        }
    }

    fn target(&self) -> String {
        self.tmp.path().join("pods/x/vol").to_string_lossy().into_owned()
    }

    fn volume_dir(&self, id: &str) -> PathBuf {
        self.tmp.path().join("volumes").join(id)
    }

    async fn stop(self) -> tempfile::TempDir {
        drop(self.client);
        self.shutdown.send(()).unwrap();
        self.server.await.unwrap().unwrap();
        self.tmp
    }
}

fn mount_cap(mode: csi::volume_capability::access_mode::Mode) -> csi::VolumeCapability {
    csi::VolumeCapability {
        access_type: Some(csi::volume_capability::AccessType::Mount(
            csi::volume_capability::MountVolume::default(),
        )),
        access_mode: Some(csi::volume_capability::AccessMode { mode: mode as i32 }),
    }
}

fn create_request(name: &str) -> csi::CreateVolumeRequest {
    csi::CreateVolumeRequest {
        name: name.into(),
        capacity_range: Some(csi::CapacityRange {
            required_bytes: 1 << 30,
            limit_bytes: 0,
        }),
        volume_capabilities: vec![mount_cap(
            csi::volume_capability::access_mode::Mode::SingleNodeWriter,
        )],
        ..Default::default()
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn identity_over_unix_socket() {
    let plugin = Plugin::start().await;
    let mut identity = plugin.client.identity();

    let info = identity
        .get_plugin_info(csi::GetPluginInfoRequest {})
        .await
        .unwrap()
        .into_inner();
    assert_eq!(info.name, PLUGIN_NAME);
    assert!(!info.vendor_version.is_empty());

    let probe = identity.probe(csi::ProbeRequest {}).await.unwrap().into_inner();
    assert_eq!(probe.ready, Some(true));
    assert!(plugin.client.probe().await.unwrap());

    let caps = identity
        .get_plugin_capabilities(csi::GetPluginCapabilitiesRequest {})
        .await
        .unwrap()
        .into_inner();
    assert_eq!(caps.capabilities.len(), 1);

    plugin.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn volume_lifecycle() {
    let plugin = Plugin::start().await;
    let mut controller = plugin.client.controller();
    let mut node = plugin.client.node();

    let volume = controller
        .create_volume(create_request("pvc-1"))
        .await
        .unwrap()
        .into_inner()
        .volume
        .unwrap();
    assert_eq!(volume.volume_id, "pvc-1");
    assert_eq!(volume.capacity_bytes, 1_073_741_824);
    assert!(volume.volume_context.is_empty());
    assert!(plugin.volume_dir("pvc-1").is_dir());

    let publish = csi::NodePublishVolumeRequest {
        volume_id: "pvc-1".into(),
        target_path: plugin.target(),
        volume_capability: Some(mount_cap(
            csi::volume_capability::access_mode::Mode::SingleNodeWriter,
        )),
        ..Default::default()
    };
    node.node_publish_volume(publish.clone()).await.unwrap();
    node.node_publish_volume(publish).await.unwrap();
    assert_eq!(plugin.mounter.len(), 1);
    let binding = plugin.mounter.binding(Path::new(&plugin.target())).unwrap();
    assert_eq!(binding.source, plugin.volume_dir("pvc-1"));
    assert!(!binding.read_only);

    node.node_unpublish_volume(csi::NodeUnpublishVolumeRequest {
        volume_id: "pvc-1".into(),
        target_path: plugin.target(),
    })
    .await
    .unwrap();
    assert!(plugin.mounter.is_empty());

    controller
        .delete_volume(csi::DeleteVolumeRequest {
            volume_id: "pvc-1".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(!plugin.volume_dir("pvc-1").exists());

    plugin.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn readonly_publish_binds_read_only() {
    let plugin = Plugin::start().await;
    let mut node = plugin.client.node();
    plugin
        .client
        .controller()
        .create_volume(create_request("pvc-ro"))
        .await
        .unwrap();

    node.node_publish_volume(csi::NodePublishVolumeRequest {
        volume_id: "pvc-ro".into(),
        target_path: plugin.target(),
        volume_capability: Some(mount_cap(
            csi::volume_capability::access_mode::Mode::SingleNodeReaderOnly,
        )),
        readonly: true,
        ..Default::default()
    })
    .await
    .unwrap();

    let binding = plugin.mounter.binding(Path::new(&plugin.target())).unwrap();
    assert_eq!(binding.source, plugin.volume_dir("pvc-ro"));
    assert!(binding.read_only);

    plugin.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_requests_map_to_invalid_argument() {
    let plugin = Plugin::start().await;
    let mut controller = plugin.client.controller();

    let status = controller
        .create_volume(create_request(""))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);

    let status = controller
        .delete_volume(csi::DeleteVolumeRequest::default())
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);

    let status = plugin
        .client
        .node()
        .node_publish_volume(csi::NodePublishVolumeRequest {
            volume_id: "pvc-1".into(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);

    plugin.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn validate_reports_unsupported_mode_without_error() {
    use csi::volume_capability::access_mode::Mode;

    let plugin = Plugin::start().await;
    let mut controller = plugin.client.controller();

    let confirmed = controller
        .validate_volume_capabilities(csi::ValidateVolumeCapabilitiesRequest {
            volume_id: "pvc-1".into(),
            volume_capabilities: vec![mount_cap(Mode::MultiNodeReaderOnly)],
            ..Default::default()
        })
        .await
        .unwrap()
        .into_inner();
    let echoed = confirmed.confirmed.unwrap().volume_capabilities;
    assert_eq!(echoed, vec![mount_cap(Mode::MultiNodeReaderOnly)]);

    let rejected = controller
        .validate_volume_capabilities(csi::ValidateVolumeCapabilitiesRequest {
            volume_id: "pvc-1".into(),
            volume_capabilities: vec![mount_cap(Mode::MultiNodeMultiWriter)],
            ..Default::default()
        })
        .await
        .unwrap()
        .into_inner();
    assert!(rejected.confirmed.is_none());
    assert!(!rejected.message.is_empty());

    plugin.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn unoffered_rpcs_are_unimplemented() {
    let plugin = Plugin::start().await;
    let mut controller = plugin.client.controller();
    let mut node = plugin.client.node();

    let status = controller
        .list_volumes(csi::ListVolumesRequest::default())
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Unimplemented);

    let status = controller
        .get_capacity(csi::GetCapacityRequest::default())
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Unimplemented);

    let status = controller
        .create_snapshot(csi::CreateSnapshotRequest::default())
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Unimplemented);

    let status = node
        .node_stage_volume(csi::NodeStageVolumeRequest::default())
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Unimplemented);

    let status = node
        .node_get_volume_stats(csi::NodeGetVolumeStatsRequest::default())
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Unimplemented);

    plugin.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn service_capabilities_and_node_info() {
    use csi::controller_service_capability::{Type, rpc::Type as RpcType};

    let plugin = Plugin::start().await;

    let caps = plugin
        .client
        .controller()
        .controller_get_capabilities(csi::ControllerGetCapabilitiesRequest {})
        .await
        .unwrap()
        .into_inner()
        .capabilities;
    assert_eq!(caps.len(), 1);
    let Some(Type::Rpc(rpc)) = &caps[0].r#type else {
        panic!("expected an RPC capability");
    };
    assert_eq!(rpc.r#type, RpcType::CreateDeleteVolume as i32);

    let mut node = plugin.client.node();
    let node_caps = node
        .node_get_capabilities(csi::NodeGetCapabilitiesRequest {})
        .await
        .unwrap()
        .into_inner();
    assert!(node_caps.capabilities.is_empty());

    let info = node
        .node_get_info(csi::NodeGetInfoRequest {})
        .await
        .unwrap()
        .into_inner();
    assert_eq!(info.node_id, "node-a");
    assert_eq!(info.max_volumes_per_node, 0);
    assert!(info.accessible_topology.is_none());

    plugin.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn stale_socket_is_replaced_and_removed_on_shutdown() {
    let tmp = tempfile::tempdir().unwrap();
    let socket = tmp.path().join("csi.sock");
    std::fs::write(&socket, b"left over from a crash").unwrap();

    let plugin = Plugin::start_at(tmp, socket.clone()).await;
    assert!(plugin.client.probe().await.unwrap());
    assert_eq!(plugin.socket, socket);

    let tmp = plugin.stop().await;
    assert!(!socket.exists());
    drop(tmp);
}

#[tokio::test(flavor = "multi_thread")]
async fn serves_over_tcp() {
    init_logger();
    let tmp = tempfile::tempdir().unwrap();
    let backend = Arc::new(HostPathBackend::with_mounter(
        tmp.path().join("volumes"),
        "node-a".to_owned(),
        Arc::new(MemoryMounter::new()),
    ));

    let server = CsiServer::bind(&"tcp://127.0.0.1:0".parse().unwrap(), backend)
        .await
        .unwrap();
    let endpoint = server.local_addr().unwrap();
    let (shutdown, rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(server.serve_with_shutdown(async move {
        let _ = rx.await;
    }));

    let client = CsiClient::connect(&endpoint).await.unwrap();
    assert!(client.probe().await.unwrap());

    drop(client);
    shutdown.send(()).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_methods_are_unimplemented() {
    init_logger();
    let tmp = tempfile::tempdir().unwrap();
    let backend = Arc::new(HostPathBackend::with_mounter(
        tmp.path().join("volumes"),
        "node-a".to_owned(),
        Arc::new(MemoryMounter::new()),
    ));

    let server = CsiServer::bind(&"tcp://127.0.0.1:0".parse().unwrap(), backend)
        .await
        .unwrap();
    let Endpoint::Tcp(addr) = server.local_addr().unwrap() else {
        panic!("expected a TCP endpoint");
    };
    let (shutdown, rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(server.serve_with_shutdown(async move {
        let _ = rx.await;
    }));

    let channel = tonic::transport::Channel::from_shared(format!("http://{addr}"))
        .unwrap()
        .connect()
        .await
        .unwrap();
    let mut grpc = tonic::client::Grpc::new(channel);
    grpc.ready().await.unwrap();
    let status = grpc
        .unary::<_, csi::ProbeResponse, _>(
            tonic::Request::new(csi::ProbeRequest {}),
            PathAndQuery::from_static("/csi.v1.Identity/Reload"),
            ProstCodec::default(),
        )
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Unimplemented);

    drop(grpc);
    shutdown.send(()).unwrap();
    handle.await.unwrap().unwrap();
}
