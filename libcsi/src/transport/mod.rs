//! gRPC transport for the CSI services.
//!
//! [`CsiServer`] binds the endpoint the CO configured and serves the
//! generated `csi.v1` services through the adapters in [`service`];
//! [`CsiClient`] talks to such a server.

pub mod client;
pub mod endpoint;
mod interceptor;
pub mod server;
pub mod service;

pub use client::CsiClient;
pub use endpoint::Endpoint;
pub use server::CsiServer;
