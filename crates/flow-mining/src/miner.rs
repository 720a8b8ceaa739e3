//! The mining coordinator.
//!
//! One coordinator per node, owned by its main group. On `Start` it asks
//! the flow handler for a template per target group and dispatches each to
//! that group's sub-miner. Empty slices re-dispatch the same template, so
//! a harder target never starves its group; found blocks go to their chain
//! handler, and the `BlockAdded` event triggers a fresh template. `Stop`
//! returns to awaiting start and discards in-flight results on receipt.

use crate::addresses::{derive_group_addresses, GroupAddress};
use crate::clock::Clock;
use crate::sub_miner::{MiningResult, SubMiner};
use crate::template::BlockTemplate;
use crate::COINBASE_REWARD;
use flow_handlers::{AllHandlers, DataOrigin, NodeEvent};
use flow_types::{ChainIndex, GroupIndex, Transaction};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

/// Coordinator configuration.
#[derive(Clone, Debug)]
pub struct MinerConfig {
    /// The group this node mines for.
    pub main_group: u32,
    /// Nonces per sub-miner slice.
    pub nonce_step: u64,
    /// Seed for per-group reward address derivation.
    pub address_seed: [u8; 32],
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            main_group: 0,
            nonce_step: 20_000,
            address_seed: [0u8; 32],
        }
    }
}

/// Control messages for the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinerMessage {
    Start,
    Stop,
}

/// The fair mining coordinator.
pub struct FairMiner {
    config: MinerConfig,
    handlers: AllHandlers,
    clock: Arc<dyn Clock>,
    addresses: Vec<GroupAddress>,
    sub_miners: Vec<SubMiner>,
    task_txs: Vec<mpsc::Sender<BlockTemplate>>,
    /// Taken by `run`; present until then.
    result_rx: Option<mpsc::Receiver<MiningResult>>,
    counts: Arc<Vec<AtomicU64>>,
    running: bool,
}

impl FairMiner {
    /// Build the coordinator and spawn one sub-miner per target group.
    pub fn new(config: MinerConfig, handlers: AllHandlers, clock: Arc<dyn Clock>) -> Self {
        let groups = handlers.groups();
        let addresses = derive_group_addresses(config.address_seed, groups);

        let (result_tx, result_rx) = mpsc::channel(groups as usize * 2);
        let mut sub_miners = Vec::with_capacity(groups as usize);
        let mut task_txs = Vec::with_capacity(groups as usize);
        for to in 0..groups {
            let (task_tx, task_rx) = mpsc::channel(2);
            sub_miners.push(SubMiner::spawn(
                GroupIndex::new(to),
                groups,
                config.nonce_step,
                task_rx,
                result_tx.clone(),
            ));
            task_txs.push(task_tx);
        }

        Self {
            config,
            handlers,
            clock,
            addresses,
            sub_miners,
            task_txs,
            result_rx: Some(result_rx),
            counts: Arc::new((0..groups).map(|_| AtomicU64::new(0)).collect()),
            running: false,
        }
    }

    /// Shared handle to the per-target-group nonce counters; stays
    /// readable after `run` consumes the miner.
    pub fn counts_handle(&self) -> Arc<Vec<AtomicU64>> {
        Arc::clone(&self.counts)
    }

    /// Snapshot of the per-target-group nonce counts.
    pub fn mining_counts(&self) -> Vec<u64> {
        self.counts.iter().map(|c| c.load(Ordering::Relaxed)).collect()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Drive control messages, sub-miner results and node events.
    pub async fn run(mut self, mut control: mpsc::Receiver<MinerMessage>) {
        let mut events = self.handlers.subscribe();
        let mut result_rx = self.result_rx.take().expect("run is called once");
        info!(main_group = self.config.main_group, "Miner awaiting start");

        loop {
            tokio::select! {
                message = control.recv() => {
                    match message {
                        Some(MinerMessage::Start) => self.start().await,
                        Some(MinerMessage::Stop) => {
                            info!("Mining stopped");
                            self.running = false;
                        }
                        None => break,
                    }
                }
                result = result_rx.recv() => {
                    match result {
                        Some(result) => self.on_result(result).await,
                        None => break,
                    }
                }
                event = events.recv() => {
                    match event {
                        Ok(NodeEvent::BlockAdded { chain_index, .. }) => {
                            self.on_block_added(chain_index).await;
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Miner lagged on the event bus");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }

        for sub_miner in self.sub_miners.drain(..) {
            sub_miner.join();
        }
        info!("Miner shut down");
    }

    async fn start(&mut self) {
        if self.running {
            return;
        }
        info!(main_group = self.config.main_group, "Mining started");
        self.running = true;
        for to in 0..self.handlers.groups() {
            self.dispatch(GroupIndex::new(to)).await;
        }
    }

    /// Fetch a fresh template for `(main, to)` and hand it to the
    /// sub-miner.
    async fn dispatch(&mut self, to: GroupIndex) {
        let chain_index = ChainIndex::new(self.config.main_group, to.value());
        let Some(flow_template) = self.handlers.prepare_template(chain_index).await else {
            warn!(chain = %chain_index, "No template from flow handler");
            return;
        };
        let coinbase = Transaction::coinbase(
            COINBASE_REWARD,
            self.addresses[to.value() as usize].lock_hash,
        );
        let template = BlockTemplate::new(
            flow_template,
            coinbase,
            Vec::new(),
            self.clock.now_ms(),
        );
        self.send_task(to, template);
    }

    fn send_task(&self, to: GroupIndex, template: BlockTemplate) {
        // A full task queue means the sub-miner already has newer work
        // lined up; skipping keeps slices current.
        if self.task_txs[to.value() as usize].try_send(template).is_err() {
            debug!(to = %to, "Task queue full, skipping dispatch");
        }
    }

    async fn on_result(&mut self, result: MiningResult) {
        if !self.running {
            // stale slice from before a Stop
            return;
        }
        let to = result.chain_index.to;
        self.counts[to.value() as usize].fetch_add(result.mining_count, Ordering::Relaxed);

        match result.block {
            Some(block) => {
                info!(
                    chain = %result.chain_index,
                    hash = %block.hash(),
                    "Submitting mined block"
                );
                if !self
                    .handlers
                    .submit_block(block, DataOrigin::Mining)
                    .await
                {
                    warn!(chain = %result.chain_index, "Chain handler gone");
                }
                // the fresh template comes with the BlockAdded event
            }
            None => {
                // empty slice: keep scanning the same template
                self.send_task(to, result.template);
            }
        }
    }

    async fn on_block_added(&mut self, chain_index: ChainIndex) {
        // New tip on one of our chains: refresh that group's template.
        if self.running && chain_index.from.value() == self.config.main_group {
            self.dispatch(chain_index.to).await;
        }
    }
}
