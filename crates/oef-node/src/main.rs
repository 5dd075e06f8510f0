//! oef-node - Open Economic Framework node launcher.
//!
//! The server owns its own multi-threaded runtime, so `main` stays
//! synchronous: parse flags, load the configuration file, start the
//! server, then park on SIGINT in a small current-thread runtime.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use oef_node::{NodeConfig, Server};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// OEF node - agent discovery and dialogue relay
#[derive(Parser, Debug)]
#[command(name = "oef-node")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the node configuration file
    #[arg(short, long, default_value = "oef-node.toml")]
    config: PathBuf,

    /// TCP port agents connect to (overrides the config file)
    #[arg(long)]
    port: Option<u16>,

    /// Number of runtime worker threads (overrides the config file)
    #[arg(long)]
    threads: Option<usize>,

    /// Listen backlog (overrides the config file)
    #[arg(long)]
    backlog: Option<u32>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn load_config(args: &Args) -> Result<NodeConfig> {
    let mut config = if args.config.exists() {
        NodeConfig::from_file(&args.config).context("failed to load configuration")?
    } else {
        NodeConfig::default()
    };
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(threads) = args.threads {
        config.threads = threads;
    }
    if let Some(backlog) = args.backlog {
        config.backlog = backlog;
    }
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .context("invalid log level")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = load_config(&args)?;
    let mut server = Server::new(&config).context("failed to start server")?;
    server.run();
    info!(addr = %server.local_addr(), threads = config.threads, "oef-node started");

    let signals = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build signal runtime")?;
    signals
        .block_on(tokio::signal::ctrl_c())
        .context("failed to wait for SIGINT")?;

    info!("SIGINT received, stopping");
    server.stop();
    Ok(())
}
