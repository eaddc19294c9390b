mod config;

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use libcsi::{CsiClient, CsiServer, HostPathBackend};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{Cli, Command, LogFormat, PluginArgs};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.plugin.log_format);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&cli.plugin).await,
        Command::Probe => probe(&cli.plugin).await,
    }
}

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn serve(args: &PluginArgs) -> Result<()> {
    let endpoint = args.endpoint()?;
    let node_id = args.node_id()?;

    let backend = HostPathBackend::new(&args.state_dir, node_id.clone());
    backend
        .recover()
        .await
        .with_context(|| format!("Failed to prepare state dir {}", args.state_dir.display()))?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        %node_id,
        state_dir = %args.state_dir.display(),
        %endpoint,
        "starting rkcsi"
    );

    let server = CsiServer::bind(&endpoint, Arc::new(backend))
        .await
        .with_context(|| format!("Failed to listen on {endpoint}"))?;
    server.serve_with_shutdown(shutdown_signal()).await?;
    Ok(())
}

async fn probe(args: &PluginArgs) -> Result<()> {
    let endpoint = args.endpoint()?;
    let client = CsiClient::connect(&endpoint)
        .await
        .with_context(|| format!("Failed to connect to {endpoint}"))?;
    if !client.probe().await? {
        bail!("plugin at {endpoint} is not ready");
    }
    println!("ready");
    Ok(())
}

/// Resolves on the first SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
