//! rkcsi command line and environment configuration.
//!
//! Every flag can also be set through the environment:
//! - `RKCSI_ENDPOINT`: listen/connect URI, `unix://<path>` or `tcp://host:port`.
//! - `RKCSI_NODE_ID`: node identifier reported by `NodeGetInfo`.
//!   Defaults to the hostname.
//! - `RKCSI_STATE_DIR`: directory holding one sub-directory per volume.
//! - `RKCSI_LOG_FORMAT`: `text` or `json`.
//!
//! Log verbosity follows `RUST_LOG` and defaults to `info`.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use libcsi::Endpoint;

pub const DEFAULT_ENDPOINT: &str = "unix:///var/lib/kubelet/plugins/rk8s.hostpath.csi/csi.sock";
pub const DEFAULT_STATE_DIR: &str = "/var/lib/rk8s-csi/volumes";

#[derive(Parser, Debug)]
#[command(name = "rkcsi", version, about = "RK8s hostpath CSI plugin")]
pub struct Cli {
    #[command(flatten)]
    pub plugin: PluginArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Serve the Identity, Controller and Node services (default)
    Serve,
    /// Ask a running plugin whether it is ready; exits non-zero otherwise
    Probe,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Args, Debug, Clone)]
pub struct PluginArgs {
    /// CSI endpoint URI
    #[arg(long, env = "RKCSI_ENDPOINT", default_value = DEFAULT_ENDPOINT, global = true)]
    pub endpoint: String,

    /// Node identifier, defaults to the hostname
    #[arg(long, env = "RKCSI_NODE_ID", global = true)]
    pub node_id: Option<String>,

    /// Directory under which volume directories are created
    #[arg(long, env = "RKCSI_STATE_DIR", value_name = "DIR", default_value = DEFAULT_STATE_DIR, global = true)]
    pub state_dir: PathBuf,

    /// Log output format
    #[arg(long, env = "RKCSI_LOG_FORMAT", value_enum, default_value = "text", global = true)]
    pub log_format: LogFormat,
}

impl PluginArgs {
    pub fn endpoint(&self) -> Result<Endpoint> {
        self.endpoint
            .parse()
            .with_context(|| format!("invalid endpoint {:?}", self.endpoint))
    }

    /// The configured node id, or the hostname when none was given.
    pub fn node_id(&self) -> Result<String> {
        let node_id = match &self.node_id {
            Some(id) => id.clone(),
            None => nix::unistd::gethostname()
                .context("Failed to read hostname")?
                .into_string()
                .map_err(|raw| anyhow::anyhow!("hostname {raw:?} is not valid UTF-8"))?,
        };
        if node_id.is_empty() {
            bail!("node id must not be empty");
        }
        Ok(node_id)
    }
}
