//! codebench-daemon - serves a workspace over a Unix socket
//!
//! Clients list, read, write and delete workspace files, upload files,
//! install packages, and execute code snippets. Every path is confined to the
//! workspace root and every spawned interpreter runs under a timeout in its
//! own process group.

use anyhow::Result;
use clap::Parser;
use futures::StreamExt;
use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook_tokio::Signals;
use std::path::PathBuf;
use tokio::net::UnixListener;
use tracing_subscriber::EnvFilter;

mod config;
mod gateway;
mod server;

use config::DaemonConfig;
use gateway::Gateway;

#[derive(Parser)]
#[command(name = "codebench-daemon")]
#[command(author, version, about = "Workspace file and execution daemon")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Socket path (overrides config)
    #[arg(short, long)]
    socket: Option<PathBuf>,

    /// Workspace root (overrides config)
    #[arg(short, long)]
    workspace: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("codebench=info".parse()?))
        .init();

    tracing::info!("codebench-daemon starting");

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => DaemonConfig::load(path)?,
        None => DaemonConfig::default(),
    };
    if let Some(socket) = args.socket {
        config.socket_path = socket;
    }
    if let Some(root) = args.workspace {
        config.workspace.root = root;
    }

    let gateway = Gateway::new(config.workspace.clone())?;
    tracing::info!(
        root = %gateway.root().path().display(),
        socket = ?config.socket_path,
        exec_timeout = ?config.workspace.exec_timeout,
        install_timeout = ?config.workspace.install_timeout,
        "configuration loaded"
    );

    // Create socket directory if needed
    if let Some(parent) = config.socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Remove existing socket
    let _ = std::fs::remove_file(&config.socket_path);

    let listener = UnixListener::bind(&config.socket_path)?;
    tracing::info!(socket = ?config.socket_path, "listening");

    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    let handle = signals.handle();
    let shutdown = async move {
        if let Some(signal) = signals.next().await {
            tracing::info!(signal, "received signal");
        }
    };

    server::run(listener, gateway, shutdown).await?;

    handle.close();
    let _ = std::fs::remove_file(&config.socket_path);
    tracing::info!("codebench-daemon stopped");

    Ok(())
}
