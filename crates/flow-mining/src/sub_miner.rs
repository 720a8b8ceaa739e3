//! Sub-miner threads.
//!
//! One sub-miner serves one target group. It receives a template, picks a
//! random starting nonce, scans up to `nonce_step` consecutive nonces in a
//! plain bounded loop, and reports a `MiningResult` whether or not a block
//! was found; the coordinator decides what to mine next.

use crate::template::BlockTemplate;
use flow_types::{Block, ChainIndex, GroupIndex};
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Outcome of one nonce slice.
#[derive(Debug)]
pub struct MiningResult {
    /// The mined block, when a nonce in the slice won.
    pub block: Option<Block>,
    pub chain_index: ChainIndex,
    /// Nonces tried in this slice.
    pub mining_count: u64,
    /// The template the slice ran against, for re-dispatch.
    pub template: BlockTemplate,
}

/// A sub-miner bound to one target group, running on its own thread.
pub struct SubMiner {
    to: GroupIndex,
    handle: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
}

impl SubMiner {
    /// Spawn the worker thread for target group `to`.
    pub fn spawn(
        to: GroupIndex,
        groups: u32,
        nonce_step: u64,
        mut task_rx: mpsc::Receiver<BlockTemplate>,
        result_tx: mpsc::Sender<MiningResult>,
    ) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = Arc::clone(&running);

        let handle = thread::Builder::new()
            .name(format!("sub-miner-{}", to.value()))
            .spawn(move || {
                Self::worker_loop(
                    to,
                    groups,
                    nonce_step,
                    &mut task_rx,
                    &result_tx,
                    &running_clone,
                );
            })
            .expect("failed to spawn sub-miner thread");

        info!(to = %to, "Sub-miner spawned");
        Self {
            to,
            handle: Some(handle),
            running,
        }
    }

    fn worker_loop(
        to: GroupIndex,
        groups: u32,
        nonce_step: u64,
        task_rx: &mut mpsc::Receiver<BlockTemplate>,
        result_tx: &mpsc::Sender<MiningResult>,
        running: &AtomicBool,
    ) {
        while running.load(Ordering::Relaxed) {
            let Some(template) = task_rx.blocking_recv() else {
                break;
            };

            let start: u64 = rand::thread_rng().gen();
            let mut found = None;
            let mut tried = 0u64;

            for step in 0..nonce_step {
                if !running.load(Ordering::Relaxed) {
                    break;
                }
                tried = step + 1;
                let nonce = start.wrapping_add(step);
                if let Some(block) = template.check_nonce(nonce, groups) {
                    debug!(to = %to, nonce, tried, "Found valid block");
                    found = Some(block);
                    break;
                }
            }

            let result = MiningResult {
                block: found,
                chain_index: template.chain_index,
                mining_count: tried,
                template,
            };
            if result_tx.blocking_send(result).is_err() {
                warn!(to = %to, "Coordinator gone, sub-miner exiting");
                return;
            }
        }
        debug!(to = %to, "Sub-miner stopped");
    }

    pub fn to(&self) -> GroupIndex {
        self.to
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    /// Stop and wait for the worker thread.
    pub fn join(mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SubMiner {
    fn drop(&mut self) {
        self.stop();
    }
}
