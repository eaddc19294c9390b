//! # libcsi: hostpath Container Storage Interface plugin for RK8s
//!
//! `libcsi` implements the [Container Storage Interface][csi] Identity,
//! Controller and Node services over gRPC (via [`tonic`]).  Volumes are
//! plain directories under a state root and are published into workloads
//! with bind mounts.  It follows the RK8s conventions: Tokio async runtime,
//! `tracing` for observability, `thiserror` for structured errors.
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |---|---|
//! | [`types`] | Core data model: `Volume`, `VolumeId`, capabilities, requests. |
//! | [`error`] | [`CsiError`] enum and its gRPC status mapping. |
//! | [`message`] | Generated `csi.v1` bindings and domain conversions. |
//! | [`identity`] | [`CsiIdentity`] trait: plugin discovery & health. |
//! | [`controller`] | [`CsiController`] trait: volume create/delete/validate. |
//! | [`node`] | [`CsiNode`] trait: publish, unpublish, node info. |
//! | [`store`] | Directory-per-volume store under the state root. |
//! | [`mount`] | Bind-mount management behind the [`mount::Mounter`] seam. |
//! | [`transport`] | gRPC server and client on unix sockets or TCP. |
//! | [`backend`] | The hostpath backend implementing all three traits. |
//!
//! [csi]: https://github.com/container-storage-interface/spec

pub mod backend;
pub mod controller;
pub mod error;
pub mod identity;
pub mod message;
pub mod mount;
pub mod node;
pub mod store;
pub mod transport;
pub mod types;

// Re-export the most commonly used items at crate root for convenience.
pub use backend::HostPathBackend;
pub use controller::CsiController;
pub use error::CsiError;
pub use identity::CsiIdentity;
pub use node::CsiNode;
pub use transport::{CsiClient, CsiServer, Endpoint};
pub use types::*;
