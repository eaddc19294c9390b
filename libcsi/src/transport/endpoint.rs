//! Listen/connect address parsing.
//!
//! The CO hands every CSI plugin a URI such as
//! `unix:///var/lib/kubelet/plugins/<name>/csi.sock`.  Only `unix://` and
//! `tcp://` are understood.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::CsiError;

/// Where the plugin listens, or where a client connects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Unix domain socket at the given filesystem path.
    Unix(PathBuf),
    /// TCP `host:port`.
    Tcp(String),
}

impl FromStr for Endpoint {
    type Err = CsiError;

    fn from_str(uri: &str) -> Result<Self, Self::Err> {
        if let Some(path) = uri.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(CsiError::InvalidEndpoint(format!("{uri}: empty socket path")));
            }
            return Ok(Self::Unix(PathBuf::from(path)));
        }
        if let Some(rest) = uri.strip_prefix("tcp://") {
            let authority = rest.split('/').next().unwrap_or_default();
            if authority.is_empty() {
                return Err(CsiError::InvalidEndpoint(format!("{uri}: empty address")));
            }
            return Ok(Self::Tcp(authority.to_owned()));
        }
        Err(CsiError::InvalidEndpoint(format!(
            "{uri}: scheme must be unix:// or tcp://"
        )))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix(path) => write!(f, "unix://{}", path.display()),
            Self::Tcp(addr) => write!(f, "tcp://{addr}"),
        }
    }
}
