//! Per-chain handlers.
//!
//! One handler runs per chain: related chains (`broker.relates_to`)
//! receive full blocks, the rest only headers. The handler deduplicates by
//! hash, runs the cheap stateless checks against a read snapshot of the
//! flow, forwards survivors to the flow handler, and tracks the item state
//! machine `Received → Validating → (Accepted | Rejected | PendingParent)`.

use crate::messages::{
    AddOutcome, ChainMessage, DataOrigin, FlowMessage, ItemState, ValidatedItem,
};
use flow_core::BlockFlow;
use flow_types::{Block, BlockHeader, ChainIndex, Hash};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// A chain handler task.
pub struct ChainHandler {
    index: ChainIndex,
    /// Whether this broker stores full blocks for the chain.
    full: bool,
    blockflow: Arc<RwLock<BlockFlow>>,
    flow_tx: mpsc::Sender<FlowMessage>,
    states: HashMap<Hash, ItemState>,
}

impl ChainHandler {
    pub fn new(
        index: ChainIndex,
        full: bool,
        blockflow: Arc<RwLock<BlockFlow>>,
        flow_tx: mpsc::Sender<FlowMessage>,
    ) -> Self {
        Self {
            index,
            full,
            blockflow,
            flow_tx,
            states: HashMap::new(),
        }
    }

    pub async fn run(mut self, mut mailbox: mpsc::Receiver<ChainMessage>) {
        debug!(chain = %self.index, full = self.full, "Chain handler started");
        while let Some(message) = mailbox.recv().await {
            match message {
                ChainMessage::AddBlock { block, origin } => {
                    self.handle_block(block, origin).await;
                }
                ChainMessage::AddHeader { header, origin } => {
                    self.handle_header(header, origin).await;
                }
            }
        }
        debug!(chain = %self.index, "Chain handler stopped");
    }

    async fn handle_block(&mut self, block: Block, origin: DataOrigin) {
        if !self.full {
            // Non-related chains keep headers only.
            let header = block.header.clone();
            self.handle_header(header, origin).await;
            return;
        }
        let hash = block.hash();
        if !self.admit(hash) {
            return;
        }
        if !self.snapshot_checks(&block.header, &hash) {
            self.states.insert(hash, ItemState::Rejected);
            return;
        }
        self.forward(hash, ValidatedItem::Block(block), origin).await;
    }

    async fn handle_header(&mut self, header: BlockHeader, origin: DataOrigin) {
        let hash = header.hash();
        if !self.admit(hash) {
            return;
        }
        if !self.snapshot_checks(&header, &hash) {
            self.states.insert(hash, ItemState::Rejected);
            return;
        }
        self.forward(hash, ValidatedItem::Header(header), origin)
            .await;
    }

    /// Dedup: only the first sighting of a hash proceeds.
    fn admit(&mut self, hash: Hash) -> bool {
        match self.states.get(&hash) {
            // a parked item may be resubmitted once its parent resolves
            Some(ItemState::PendingParent) | None => {}
            Some(_) => {
                debug!(chain = %self.index, hash = %hash, "Duplicate ignored");
                return false;
            }
        }
        if self.blockflow.read().contains(&hash) {
            self.states.insert(hash, ItemState::Accepted);
            return false;
        }
        self.states.insert(hash, ItemState::Received);
        true
    }

    /// Cheap stateless validation against a read snapshot: right chain,
    /// proof of work. Full consistency is re-checked by the flow handler.
    fn snapshot_checks(&mut self, header: &BlockHeader, hash: &Hash) -> bool {
        self.states.insert(*hash, ItemState::Validating);

        let groups = self.blockflow.read().groups();
        if ChainIndex::from_hash(hash, groups) != self.index {
            warn!(chain = %self.index, hash = %hash, "Wrong chain for this handler");
            return false;
        }
        if !header.pow_valid() {
            warn!(chain = %self.index, hash = %hash, "PoW check failed");
            return false;
        }
        true
    }

    async fn forward(&mut self, hash: Hash, item: ValidatedItem, origin: DataOrigin) {
        let (reply_tx, reply_rx) = oneshot::channel();
        let message = FlowMessage::Install {
            item,
            origin,
            reply: reply_tx,
        };
        if self.flow_tx.send(message).await.is_err() {
            warn!(chain = %self.index, "Flow handler gone, dropping item");
            return;
        }

        let state = match reply_rx.await {
            Ok(Ok(AddOutcome::Added(added))) => {
                info!(
                    chain = %self.index,
                    hash = %added.hash,
                    height = added.height,
                    weight = added.weight,
                    "Accepted"
                );
                ItemState::Accepted
            }
            Ok(Ok(AddOutcome::AlreadyPresent)) => ItemState::Accepted,
            Ok(Ok(AddOutcome::Parked(missing))) => {
                debug!(
                    chain = %self.index,
                    hash = %hash,
                    missing = missing.len(),
                    "Pending parent"
                );
                ItemState::PendingParent
            }
            Ok(Err(validation)) => {
                warn!(chain = %self.index, hash = %hash, error = %validation, "Rejected");
                ItemState::Rejected
            }
            Err(_) => {
                warn!(chain = %self.index, hash = %hash, "No reply from flow handler");
                ItemState::Rejected
            }
        };
        self.states.insert(hash, state);
    }

    /// Current tracked state of an item, for tests and introspection.
    pub fn state_of(&self, hash: &Hash) -> Option<ItemState> {
        self.states.get(hash).copied()
    }
}
