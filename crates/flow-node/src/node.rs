//! Node assembly: storage, handler mesh, miner, synchronizer.

use crate::config::NodeConfig;
use anyhow::{Context, Result};
use flow_core::WindowedMeanAdjustment;
use flow_handlers::AllHandlers;
use flow_mining::{FairMiner, MinerConfig, MinerMessage, SystemClock};
use flow_storage::{ChainStore, Database};
use flow_sync::Synchronizer;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

/// A running node.
pub struct Node {
    config: NodeConfig,
    handlers: AllHandlers,
    miner_control: mpsc::Sender<MinerMessage>,
    tasks: Vec<JoinHandle<()>>,
}

impl Node {
    /// Open storage and wire every subsystem.
    pub async fn new(config: NodeConfig) -> Result<Self> {
        let params = config.consensus_params()?;

        std::fs::create_dir_all(&config.data_dir).context("Failed to create data dir")?;
        let database = Database::open(config.data_dir.join("db"))?;
        let store = ChainStore::new(Arc::new(database), params.groups);

        let strategy = Box::new(WindowedMeanAdjustment::new(
            params.block_target_time_ms,
            params.retarget_window,
        ));
        let (handlers, mut tasks) = AllHandlers::build(params, store, strategy)?;

        let miner_config = MinerConfig {
            main_group: config.mining.main_group,
            nonce_step: config.mining.nonce_step,
            address_seed: config.address_seed()?,
        };
        let (miner_control, miner_rx) = mpsc::channel(8);
        let miner = FairMiner::new(miner_config, handlers.clone(), Arc::new(SystemClock));
        tasks.push(tokio::spawn(miner.run(miner_rx)));

        info!(
            node = %config.node_name,
            groups = config.consensus.groups,
            broker_from = config.broker.broker_from,
            broker_until = config.broker.broker_until,
            "Node assembled"
        );

        Ok(Self {
            config,
            handlers,
            miner_control,
            tasks,
        })
    }

    pub fn handlers(&self) -> &AllHandlers {
        &self.handlers
    }

    /// A synchronizer bound to this node's handler mesh; the network edge
    /// feeds it peer messages.
    pub fn synchronizer(&self) -> Synchronizer {
        Synchronizer::new(self.handlers.clone(), self.config.broker_config())
    }

    /// Run until shutdown is requested.
    pub async fn run(&self) -> Result<()> {
        if self.config.mining.enabled {
            self.miner_control
                .send(MinerMessage::Start)
                .await
                .context("Miner control channel closed")?;
            info!(main_group = self.config.mining.main_group, "Mining enabled");
        }

        // Handlers run until their mailboxes close at shutdown.
        std::future::pending::<()>().await;
        Ok(())
    }

    /// Stop mining and let handler tasks drain.
    pub async fn shutdown(mut self) {
        let _ = self.miner_control.send(MinerMessage::Stop).await;
        for task in self.tasks.drain(..) {
            task.abort();
        }
        info!("Node stopped");
    }
}
