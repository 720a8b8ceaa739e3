//! Test harness: flows, meshes, and deterministic mining helpers.

use flow_core::{AddResult, AddedBlock, BlockFlow, ConsensusParams, WindowedMeanAdjustment};
use flow_handlers::AllHandlers;
use flow_storage::{ChainStore, MemoryStore};
use flow_types::{Block, BlockHeader, ChainIndex, Hash};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Consensus parameters for a two-group test deployment with trivial
/// targets.
pub fn test_params() -> ConsensusParams {
    ConsensusParams::test_default()
}

/// A standalone `BlockFlow` over an in-memory store.
pub struct TestFlow {
    pub flow: BlockFlow,
}

impl TestFlow {
    pub fn new() -> Self {
        let params = test_params();
        let store = ChainStore::new(Arc::new(MemoryStore::new()), params.groups);
        let flow = BlockFlow::new(
            params.clone(),
            store,
            Box::new(WindowedMeanAdjustment::new(
                params.block_target_time_ms,
                params.retarget_window,
            )),
        )
        .expect("fresh flow");
        Self { flow }
    }

    /// Deterministically grind a block for `chain_index`: scan nonces from
    /// zero until one lands on the chain and meets the target.
    pub fn mine(&self, chain_index: ChainIndex, timestamp_ms: u64) -> Block {
        mine_on(&self.flow, chain_index, timestamp_ms)
    }

    /// Mine and install, panicking unless the block is accepted.
    pub fn mine_and_add(&mut self, chain_index: ChainIndex, timestamp_ms: u64) -> AddedBlock {
        let block = self.mine(chain_index, timestamp_ms);
        match self.flow.add_block(&block).expect("validation") {
            AddResult::Added(added) => added,
            other => panic!("expected Added, got {other:?}"),
        }
    }
}

impl Default for TestFlow {
    fn default() -> Self {
        Self::new()
    }
}

/// Grind a valid block against `flow`'s current best deps.
pub fn mine_on(flow: &BlockFlow, chain_index: ChainIndex, timestamp_ms: u64) -> Block {
    let deps = flow.get_best_deps(chain_index);
    let target = flow.next_target(chain_index);
    let mut header = BlockHeader {
        deps,
        tx_merkle_root: Hash::zero(),
        timestamp_ms,
        target,
        nonce: 0,
    };
    loop {
        let hash = header.hash();
        if ChainIndex::from_hash(&hash, flow.groups()) == chain_index && header.pow_valid() {
            return Block {
                header,
                transactions: Vec::new(),
            };
        }
        header.nonce += 1;
    }
}

/// A full handler mesh over an in-memory store, for async tests.
pub struct TestMesh {
    pub handlers: AllHandlers,
    pub tasks: Vec<JoinHandle<()>>,
}

impl TestMesh {
    pub fn start() -> Self {
        Self::start_with(test_params())
    }

    pub fn start_with(params: ConsensusParams) -> Self {
        let store = ChainStore::new(Arc::new(MemoryStore::new()), params.groups);
        let strategy = Box::new(WindowedMeanAdjustment::new(
            params.block_target_time_ms,
            params.retarget_window,
        ));
        let (handlers, tasks) = AllHandlers::build(params, store, strategy).expect("mesh");
        Self { handlers, tasks }
    }

    /// Grind a block against the mesh's current flow state.
    pub fn mine(&self, chain_index: ChainIndex, timestamp_ms: u64) -> Block {
        let flow = self.handlers.blockflow().read();
        mine_on(&flow, chain_index, timestamp_ms)
    }
}
