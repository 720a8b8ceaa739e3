//! flow-node - a node for the BlockFlow sharded proof-of-work ledger.
//!
//! This is the main entry point for the flow-node binary.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

mod config;
mod node;

use config::NodeConfig;
use node::Node;

/// BlockFlow node implementation in Rust.
#[derive(Parser, Debug)]
#[command(name = "flow-node")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "flow-node.toml")]
    config: PathBuf,

    /// Data directory
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Enable mining
    #[arg(long)]
    mining: bool,

    /// Group to mine for
    #[arg(long)]
    main_group: Option<u32>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting flow node v{}", env!("CARGO_PKG_VERSION"));

    let config = NodeConfig::load(&args.config, &args)?;
    info!("Data directory: {:?}", config.data_dir);
    info!(
        "Groups: {}, broker [{}, {})",
        config.consensus.groups, config.broker.broker_from, config.broker.broker_until
    );

    let node = Node::new(config).await?;

    tokio::select! {
        result = node.run() => {
            if let Err(error) = result {
                tracing::error!("Node error: {error}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    node.shutdown().await;
    info!("Flow node stopped");
    Ok(())
}
