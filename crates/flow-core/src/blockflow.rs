//! The BlockFlow: every per-chain DAG plus the cross-chain bookkeeping.
//!
//! Each installed block caches a *flow view*: for every chain of the grid,
//! the newest block of that chain in its past cone. Views turn the two
//! expensive questions of the protocol into per-chain ancestry checks:
//!
//! - **Consistency**: two dependencies conflict exactly when their views
//!   disagree on some chain without one entry being the other's ancestor.
//! - **Weight**: per-chain heights are past-cone sizes, so the weight of a
//!   block is one plus the sum of the heights of its merged dep view.

use crate::chain::Chain;
use crate::error::{FlowResult, ValidationError};
use crate::genesis::genesis_block;
use crate::locators::{locator_heights, MAX_INVENTORY_PER_CHAIN};
use crate::params::ConsensusParams;
use crate::target::{TargetAdjustment, TargetSample};
use flow_types::{
    merkle_root, Block, BlockDeps, BlockHeader, ChainIndex, Codec, Hash, U256,
};
use flow_storage::{BlockState, ChainState, ChainStore, KVStore};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of feeding a block or header into the flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddResult {
    /// Installed; tips and weights updated.
    Added(AddedBlock),
    /// Hash already known; nothing to do.
    AlreadyPresent,
    /// One or more dependencies are unknown; the caller parks the item.
    MissingDeps(Vec<Hash>),
}

/// Details of a freshly installed block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedBlock {
    pub hash: Hash,
    pub chain_index: ChainIndex,
    pub height: u64,
    pub weight: u64,
}

/// The grid of chains.
pub struct BlockFlow {
    params: ConsensusParams,
    chains: Vec<Chain>,
    views: HashMap<Hash, Arc<Vec<Hash>>>,
    weights: HashMap<Hash, u64>,
    chain_of: HashMap<Hash, ChainIndex>,
    targets: HashMap<Hash, U256>,
    genesis_view: Arc<Vec<Hash>>,
    store: ChainStore,
    strategy: Box<dyn TargetAdjustment>,
    adds_since_prune: Vec<u64>,
}

impl BlockFlow {
    /// Build the flow with one genesis block per chain, persisting genesis
    /// state on first start.
    pub fn new(
        params: ConsensusParams,
        store: ChainStore,
        strategy: Box<dyn TargetAdjustment>,
    ) -> FlowResult<Self> {
        let groups = params.groups;
        let chain_count = (groups * groups) as usize;

        let mut chains = Vec::with_capacity(chain_count);
        let mut views = HashMap::new();
        let mut weights = HashMap::new();
        let mut chain_of = HashMap::new();
        let mut targets = HashMap::new();

        let genesis_hashes: Vec<Hash> = ChainIndex::all(groups)
            .map(|ci| genesis_block(ci, groups).hash())
            .collect();
        let genesis_view = Arc::new(genesis_hashes.clone());

        let first_start = !store.is_initialized()?;
        for chain_index in ChainIndex::all(groups) {
            let block = genesis_block(chain_index, groups);
            let hash = block.hash();
            chains.push(Chain::new(chain_index, hash, block.header.timestamp_ms));
            views.insert(hash, Arc::clone(&genesis_view));
            weights.insert(hash, 0);
            chain_of.insert(hash, chain_index);
            targets.insert(hash, block.header.target.clone());

            if first_start {
                let state = BlockState {
                    height: 0,
                    weight: 0,
                    chain_index,
                    parent: Hash::zero(),
                    timestamp_ms: block.header.timestamp_ms,
                };
                store.commit_block(&block, &state)?;
                store.set_chain_state(chain_index, &ChainState { tip: hash, height: 0 })?;
            }
        }
        if first_start {
            store.set_initialized()?;
            info!(groups, "Initialized genesis for {} chains", chain_count);
        }

        let mut flow = Self {
            params,
            chains,
            views,
            weights,
            chain_of,
            targets,
            genesis_view,
            store,
            strategy,
            adds_since_prune: vec![0; chain_count],
        };
        if !first_start {
            flow.reload()?;
        }
        Ok(flow)
    }

    /// Rebuild the in-memory index from persisted headers on restart.
    /// Weights order installs topologically: every dependency of a block
    /// has a strictly smaller weight, so one ascending pass resolves.
    fn reload(&mut self) -> FlowResult<()> {
        let mut persisted: Vec<(u64, Hash, BlockHeader)> = Vec::new();
        {
            let raw = self.store.raw();
            for (key, value) in raw.iter(flow_storage::ColumnFamily::Header)? {
                let Some(hash) = Hash::from_slice(&key) else {
                    continue;
                };
                if self.views.contains_key(&hash) {
                    continue; // genesis
                }
                let header = BlockHeader::decode_all(&value)
                    .map_err(flow_storage::StorageError::from)?;
                let state = self.store.require_block_state(&hash)?;
                persisted.push((state.weight, hash, header));
            }
        }
        persisted.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        let mut restored = 0usize;
        for (_, hash, header) in persisted {
            let body = self.store.get_block(&hash)?;
            match self.add_inner(&header, body.as_ref())? {
                AddResult::Added(_) | AddResult::AlreadyPresent => restored += 1,
                AddResult::MissingDeps(missing) => {
                    return Err(flow_storage::StorageError::Corruption(format!(
                        "persisted block {hash} missing {} deps",
                        missing.len()
                    ))
                    .into());
                }
            }
        }
        if restored > 0 {
            info!(restored, "Restored persisted chain state");
        }
        Ok(())
    }

    pub fn params(&self) -> &ConsensusParams {
        &self.params
    }

    pub fn groups(&self) -> u32 {
        self.params.groups
    }

    pub fn store(&self) -> &ChainStore {
        &self.store
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.views.contains_key(hash)
    }

    /// Weight of a known block.
    pub fn weight(&self, hash: &Hash) -> Option<u64> {
        self.weights.get(hash).copied()
    }

    /// Height of a known block on its own chain.
    pub fn height(&self, hash: &Hash) -> Option<u64> {
        let chain_index = self.chain_of.get(hash)?;
        self.chain(*chain_index).height_of(hash)
    }

    /// The chain a known block belongs to.
    pub fn chain_index_of(&self, hash: &Hash) -> Option<ChainIndex> {
        self.chain_of.get(hash).copied()
    }

    fn chain(&self, index: ChainIndex) -> &Chain {
        &self.chains[index.flat_index(self.params.groups)]
    }

    fn chain_mut(&mut self, index: ChainIndex) -> &mut Chain {
        let flat = index.flat_index(self.params.groups);
        &mut self.chains[flat]
    }

    /// The locally preferred tip of a chain: maximum weight, lexicographic
    /// hash as tie-break.
    pub fn best_tip(&self, index: ChainIndex) -> Hash {
        let chain = self.chain(index);
        chain
            .tips()
            .max_by(|a, b| {
                let wa = self.weights.get(a).copied().unwrap_or(0);
                let wb = self.weights.get(b).copied().unwrap_or(0);
                wa.cmp(&wb).then_with(|| b.cmp(a))
            })
            .unwrap_or_else(|| chain.genesis())
    }

    /// Merge one dependency's view into `view`, failing on any per-chain
    /// ancestry conflict.
    fn merge_one(&self, view: &mut [Hash], dep: &Hash) -> Result<(), ValidationError> {
        let dep_view = self
            .views
            .get(dep)
            .ok_or_else(|| ValidationError::BadDeps(format!("unknown dep {dep}")))?;

        for (flat, slot) in view.iter_mut().enumerate() {
            let candidate = dep_view[flat];
            if *slot == candidate {
                continue;
            }
            let chain = &self.chains[flat];
            let current_height = chain
                .height_of(slot)
                .ok_or_else(|| ValidationError::BadDeps(format!("view entry off-chain: {slot}")))?;
            let candidate_height = chain.height_of(&candidate).ok_or_else(|| {
                ValidationError::BadDeps(format!("view entry off-chain: {candidate}"))
            })?;

            if candidate_height > current_height {
                if !chain.is_ancestor(slot, &candidate) {
                    return Err(ValidationError::BadDeps(format!(
                        "conflicting views on chain {}",
                        chain.index()
                    )));
                }
                *slot = candidate;
            } else if !chain.is_ancestor(&candidate, slot) {
                return Err(ValidationError::BadDeps(format!(
                    "conflicting views on chain {}",
                    chain.index()
                )));
            }
        }
        Ok(())
    }

    /// Select the best dependency set for a new block on `chain_index`:
    /// per slot, the heaviest tip whose view merges consistently with what
    /// has been chosen so far; the accumulated view entry is the fallback.
    pub fn get_best_deps(&self, chain_index: ChainIndex) -> BlockDeps {
        let groups = self.params.groups;
        let slots = BlockDeps::slot_count(groups);
        let mut view = (*self.genesis_view).clone();
        let mut deps = Vec::with_capacity(slots);

        for slot in 0..slots {
            let dep_chain = BlockDeps::dep_chain(slot, chain_index, groups);
            let flat = dep_chain.flat_index(groups);

            let mut candidates: Vec<Hash> = self.chains[flat].tips().collect();
            candidates.sort_by(|a, b| {
                let wa = self.weights.get(a).copied().unwrap_or(0);
                let wb = self.weights.get(b).copied().unwrap_or(0);
                wb.cmp(&wa).then_with(|| a.cmp(b))
            });

            let mut chosen = view[flat];
            for candidate in candidates {
                let mut trial = view.clone();
                if self.merge_one(&mut trial, &candidate).is_ok() {
                    chosen = candidate;
                    view = trial;
                    break;
                }
            }
            deps.push(chosen);
        }

        BlockDeps::new(deps, groups).expect("slot count matches deployment")
    }

    /// Next mining target for a chain, from the retarget strategy over the
    /// canonical path, clamped into the allowed band.
    pub fn next_target(&self, chain_index: ChainIndex) -> U256 {
        let chain = self.chain(chain_index);
        let tip = self.best_tip(chain_index);
        let tip_height = chain.height_of(&tip).unwrap_or(0);

        let window = self.params.retarget_window.max(1) as u64;
        let from_height = tip_height.saturating_sub(window - 1);
        let mut samples = Vec::with_capacity(self.params.retarget_window);
        for height in from_height..=tip_height {
            if let Some(hash) = chain.ancestor_at_height(&tip, height) {
                samples.push(TargetSample {
                    timestamp_ms: chain.timestamp_of(&hash).unwrap_or(0),
                    target: self
                        .targets
                        .get(&hash)
                        .cloned()
                        .unwrap_or_else(U256::max_value),
                });
            }
        }
        self.params.clamp_target(self.strategy.next_target(&samples))
    }

    /// Validate and install a full block.
    pub fn add_block(&mut self, block: &Block) -> FlowResult<AddResult> {
        if merkle_root(&block.transactions) != block.header.tx_merkle_root {
            return Err(ValidationError::BadMerkleRoot.into());
        }
        self.add_inner(&block.header, Some(block))
    }

    /// Validate and install a header (non-related chains).
    pub fn add_header(&mut self, header: &BlockHeader) -> FlowResult<AddResult> {
        self.add_inner(header, None)
    }

    fn add_inner(&mut self, header: &BlockHeader, body: Option<&Block>) -> FlowResult<AddResult> {
        let groups = self.params.groups;
        let hash = header.hash();

        if self.views.contains_key(&hash) {
            return Ok(AddResult::AlreadyPresent);
        }

        let chain_index = ChainIndex::from_hash(&hash, groups);
        if header.deps.len() != BlockDeps::slot_count(groups) {
            return Err(ValidationError::BadDeps(format!(
                "expected {} deps, got {}",
                BlockDeps::slot_count(groups),
                header.deps.len()
            ))
            .into());
        }

        // Unknown deps park the item rather than failing it.
        let missing: Vec<Hash> = header
            .deps
            .as_slice()
            .iter()
            .filter(|dep| !self.views.contains_key(dep))
            .copied()
            .collect();
        if !missing.is_empty() {
            return Ok(AddResult::MissingDeps(missing));
        }

        // Every dep must sit on the chain its slot refers to.
        for (slot, dep) in header.deps.as_slice().iter().enumerate() {
            let expected = BlockDeps::dep_chain(slot, chain_index, groups);
            let actual = self.chain_of[dep];
            if actual != expected {
                return Err(ValidationError::BadDeps(format!(
                    "dep slot {slot} expects chain {expected}, hash is on {actual}"
                ))
                .into());
            }
        }

        // Proof of work: target within the allowed band, hash below it.
        if header.target > self.params.clamp_target(header.target.clone()) {
            return Err(ValidationError::BadPoW("target above allowed bound".into()).into());
        }
        if !header.pow_valid() {
            return Err(ValidationError::BadPoW("hash does not meet target".into()).into());
        }

        // Timestamp strictly increases along the chain.
        let parent = header.parent(chain_index, groups);
        let parent_ts = self
            .chain(chain_index)
            .timestamp_of(&parent)
            .ok_or(ValidationError::UnknownParent(parent))?;
        if header.timestamp_ms <= parent_ts {
            return Err(ValidationError::BadTimestamp {
                block_time: header.timestamp_ms,
                parent_time: parent_ts,
            }
            .into());
        }

        // Cross-chain consistency and weight, via the merged flow view.
        let mut view = (*self.genesis_view).clone();
        for dep in header.deps.as_slice() {
            self.merge_one(&mut view, dep)?;
        }
        let past_size: u64 = view
            .iter()
            .enumerate()
            .map(|(flat, entry)| self.chains[flat].height_of(entry).unwrap_or(0))
            .sum();
        let weight = 1 + past_size;

        let flat = chain_index.flat_index(groups);
        view[flat] = hash;

        let height = self
            .chain_mut(chain_index)
            .add(hash, parent, header.timestamp_ms)
            .ok_or(ValidationError::UnknownParent(parent))?;

        self.views.insert(hash, Arc::new(view));
        self.weights.insert(hash, weight);
        self.chain_of.insert(hash, chain_index);
        self.targets.insert(hash, header.target.clone());

        let state = BlockState {
            height,
            weight,
            chain_index,
            parent,
            timestamp_ms: header.timestamp_ms,
        };
        match body {
            Some(block) => self.store.commit_block(block, &state)?,
            None => self.store.commit_header(header, &state)?,
        }

        let best = self.best_tip(chain_index);
        if best == hash {
            self.store
                .set_chain_state(chain_index, &ChainState { tip: hash, height })?;
        }

        self.adds_since_prune[flat] += 1;
        if self.adds_since_prune[flat] >= self.params.tips_prune_interval {
            self.adds_since_prune[flat] = 0;
            let cutoff = header.timestamp_ms.saturating_sub(
                self.params.block_target_time_ms * self.params.tips_prune_interval,
            );
            let pruned = self.chain_mut(chain_index).prune_tips(cutoff, best);
            if pruned > 0 {
                debug!(chain = %chain_index, pruned, "Pruned dominated tips");
            }
        }

        debug!(
            hash = %hash,
            chain = %chain_index,
            height,
            weight,
            "Block installed"
        );

        Ok(AddResult::Added(AddedBlock {
            hash,
            chain_index,
            height,
            weight,
        }))
    }

    /// Per-chain skip-list locators along the canonical path, canonical
    /// chain order.
    pub fn get_sync_locators(&self) -> Vec<Vec<Hash>> {
        ChainIndex::all(self.params.groups)
            .map(|chain_index| {
                let chain = self.chain(chain_index);
                let tip = self.best_tip(chain_index);
                let tip_height = chain.height_of(&tip).unwrap_or(0);
                locator_heights(tip_height)
                    .into_iter()
                    .filter_map(|height| chain.ancestor_at_height(&tip, height))
                    .collect()
            })
            .collect()
    }

    /// For each chain, the canonical hashes above the first peer locator we
    /// recognize, oldest first. Empty everywhere means the peer is synced.
    pub fn get_sync_inventories(&self, locators: &[Vec<Hash>]) -> Vec<Vec<Hash>> {
        ChainIndex::all(self.params.groups)
            .enumerate()
            .map(|(flat, chain_index)| {
                let chain = self.chain(chain_index);
                let tip = self.best_tip(chain_index);
                let tip_height = chain.height_of(&tip).unwrap_or(0);

                let peer_locator = locators.get(flat).map(Vec::as_slice).unwrap_or(&[]);
                let shared_height = peer_locator
                    .iter()
                    .find_map(|hash| {
                        let height = chain.height_of(hash)?;
                        (chain.ancestor_at_height(&tip, height) == Some(*hash)).then_some(height)
                    })
                    .unwrap_or(0);

                ((shared_height + 1)..=tip_height)
                    .take(MAX_INVENTORY_PER_CHAIN)
                    .filter_map(|height| chain.ancestor_at_height(&tip, height))
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::WindowedMeanAdjustment;
    use flow_storage::MemoryStore;
    use flow_types::Transaction;

    fn new_flow() -> BlockFlow {
        let params = ConsensusParams::test_default();
        let store = ChainStore::new(Arc::new(MemoryStore::new()), params.groups);
        BlockFlow::new(
            params,
            store,
            Box::new(WindowedMeanAdjustment::new(1_000, 17)),
        )
        .unwrap()
    }

    /// Grind nonces until the block lands on `chain_index` and meets the
    /// trivial target.
    fn mine(flow: &BlockFlow, chain_index: ChainIndex, timestamp_ms: u64) -> Block {
        let deps = flow.get_best_deps(chain_index);
        let mut block = Block {
            header: BlockHeader {
                deps,
                tx_merkle_root: Hash::zero(),
                timestamp_ms,
                target: flow.next_target(chain_index),
                nonce: 0,
            },
            transactions: Vec::new(),
        };
        loop {
            let hash = block.hash();
            if ChainIndex::from_hash(&hash, flow.groups()) == chain_index
                && block.header.pow_valid()
            {
                return block;
            }
            block.header.nonce += 1;
        }
    }

    fn mine_and_add(flow: &mut BlockFlow, chain_index: ChainIndex, ts: u64) -> AddedBlock {
        let block = mine(flow, chain_index, ts);
        match flow.add_block(&block).unwrap() {
            AddResult::Added(added) => added,
            other => panic!("expected Added, got {other:?}"),
        }
    }

    #[test]
    fn test_sequential_two_group_weights() {
        let mut flow = new_flow();
        let order = [
            ChainIndex::new(0, 0),
            ChainIndex::new(1, 1),
            ChainIndex::new(0, 1),
            ChainIndex::new(0, 0),
        ];
        let weights: Vec<u64> = order
            .iter()
            .enumerate()
            .map(|(i, ci)| mine_and_add(&mut flow, *ci, 1_000 * (i as u64 + 1)).weight)
            .collect();
        assert_eq!(weights, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_parallel_two_group_weights() {
        let mut flow = new_flow();

        // Round one: mine all four blocks against the genesis-only view.
        let round1: Vec<Block> = ChainIndex::all(2).map(|ci| mine(&flow, ci, 1_000)).collect();
        for block in &round1 {
            match flow.add_block(block).unwrap() {
                AddResult::Added(added) => assert_eq!(added.weight, 1),
                other => panic!("unexpected {other:?}"),
            }
        }

        // Two more sequential-per-round passes.
        for round in 2..=3u64 {
            let blocks: Vec<Block> = ChainIndex::all(2)
                .map(|ci| mine(&flow, ci, 1_000 * round))
                .collect();
            let weights: Vec<u64> = blocks
                .iter()
                .map(|b| match flow.add_block(b).unwrap() {
                    AddResult::Added(added) => added.weight,
                    other => panic!("unexpected {other:?}"),
                })
                .collect();
            if round == 3 {
                assert_eq!(weights, vec![8, 8, 8, 8]);
            }
        }
    }

    #[test]
    fn test_fork_tolerance() {
        let mut flow = new_flow();
        let chain = ChainIndex::new(0, 0);

        let b11 = mine(&flow, chain, 1_000);
        let mut b12 = mine(&flow, chain, 1_000);
        // force a distinct competing block on the same deps
        while b12.hash() == b11.hash() {
            b12.header.timestamp_ms += 1;
            b12 = mine(&flow, chain, b12.header.timestamp_ms);
        }

        let w11 = match flow.add_block(&b11).unwrap() {
            AddResult::Added(a) => a.weight,
            other => panic!("unexpected {other:?}"),
        };
        let w12 = match flow.add_block(&b12).unwrap() {
            AddResult::Added(a) => a.weight,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!((w11, w12), (1, 1));

        let b13 = mine_and_add(&mut flow, chain, 2_000);
        assert_eq!(b13.weight, 2);
    }

    #[test]
    fn test_duplicate_add() {
        let mut flow = new_flow();
        let block = mine(&flow, ChainIndex::new(0, 0), 1_000);
        assert!(matches!(
            flow.add_block(&block).unwrap(),
            AddResult::Added(_)
        ));
        assert_eq!(flow.add_block(&block).unwrap(), AddResult::AlreadyPresent);
    }

    #[test]
    fn test_missing_deps_parks() {
        // Mine two chained blocks on one flow, feed only the child to a
        // fresh flow: it parks on the missing parent.
        let mut source = new_flow();
        let chain = ChainIndex::new(0, 0);
        let parent = mine(&source, chain, 1_000);
        assert!(matches!(
            source.add_block(&parent).unwrap(),
            AddResult::Added(_)
        ));
        let child = mine(&source, chain, 2_000);

        let mut fresh = new_flow();
        match fresh.add_block(&child).unwrap() {
            AddResult::MissingDeps(missing) => {
                assert!(missing.contains(&parent.hash()));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_bad_timestamp_rejected() {
        let mut flow = new_flow();
        let chain = ChainIndex::new(0, 0);
        mine_and_add(&mut flow, chain, 1_000);

        // A child whose timestamp equals its parent's is rejected.
        let block = mine(&flow, chain, 1_000);
        let err = flow.add_block(&block).unwrap_err();
        assert!(matches!(
            err,
            crate::FlowError::Validation(ValidationError::BadTimestamp { .. })
        ));
    }

    #[test]
    fn test_bad_merkle_root_rejected() {
        let mut flow = new_flow();
        let mut block = mine(&flow, ChainIndex::new(0, 0), 1_000);
        block
            .transactions
            .push(Transaction::coinbase(5, Hash::hash_blake2b(b"m")));
        let err = flow.add_block(&block).unwrap_err();
        assert!(matches!(
            err,
            crate::FlowError::Validation(ValidationError::BadMerkleRoot)
        ));
    }

    #[test]
    fn test_weight_monotone_along_chain() {
        let mut flow = new_flow();
        let chain = ChainIndex::new(1, 0);
        let mut previous = 0;
        for i in 1..=5u64 {
            let added = mine_and_add(&mut flow, chain, 1_000 * i);
            assert!(added.weight > previous);
            previous = added.weight;
        }
    }

    #[test]
    fn test_restart_restores_state() {
        let params = ConsensusParams::test_default();
        let store = ChainStore::new(Arc::new(MemoryStore::new()), params.groups);

        let tip = {
            let mut flow = BlockFlow::new(
                params.clone(),
                store.clone(),
                Box::new(WindowedMeanAdjustment::new(1_000, 17)),
            )
            .unwrap();
            for i in 1..=3u64 {
                let block = mine(&flow, ChainIndex::new(0, 0), 1_000 * i);
                flow.add_block(&block).unwrap();
            }
            flow.best_tip(ChainIndex::new(0, 0))
        };

        // reopen over the same store
        let flow = BlockFlow::new(
            params,
            store,
            Box::new(WindowedMeanAdjustment::new(1_000, 17)),
        )
        .unwrap();
        assert_eq!(flow.best_tip(ChainIndex::new(0, 0)), tip);
        assert_eq!(flow.weight(&tip), Some(3));
    }

    #[test]
    fn test_locator_inventory_exchange() {
        let mut flow = new_flow();
        for i in 1..=4u64 {
            mine_and_add(&mut flow, ChainIndex::new(0, 0), 1_000 * i);
        }

        let locators = flow.get_sync_locators();
        assert_eq!(locators.len(), 4);

        // A peer sharing our view gets empty inventories everywhere.
        let inventories = flow.get_sync_inventories(&locators);
        assert!(inventories.iter().all(Vec::is_empty));

        // A fresh peer (genesis-only locators) gets our full chain back.
        let fresh = new_flow();
        let fresh_locators = fresh.get_sync_locators();
        let inventories = flow.get_sync_inventories(&fresh_locators);
        assert_eq!(inventories[0].len(), 4);
        assert!(inventories[1].is_empty());
    }
}
