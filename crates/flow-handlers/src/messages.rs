//! Message and event types of the handler mesh.

use flow_core::{AddedBlock, ValidationError};
use flow_types::{Block, BlockDeps, BlockHeader, ChainIndex, Hash, Transaction, U256};
use tokio::sync::oneshot;

/// Where an item came from; rejections are reported back to the source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataOrigin {
    /// Produced locally (tests, RPC edge).
    Local,
    /// Produced by the local miner.
    Mining,
    /// Received from a sync peer.
    Peer(u64),
}

/// A block or header that passed a chain handler's snapshot checks.
#[derive(Clone, Debug)]
pub enum ValidatedItem {
    Block(Block),
    Header(BlockHeader),
}

impl ValidatedItem {
    pub fn hash(&self) -> Hash {
        match self {
            ValidatedItem::Block(block) => block.hash(),
            ValidatedItem::Header(header) => header.hash(),
        }
    }

    pub fn header(&self) -> &BlockHeader {
        match self {
            ValidatedItem::Block(block) => &block.header,
            ValidatedItem::Header(header) => header,
        }
    }
}

/// Per-item lifecycle in a chain handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ItemState {
    Received,
    Validating,
    Accepted,
    Rejected,
    PendingParent,
}

/// Outcome of installing a validated item, reported to the chain handler.
#[derive(Debug)]
pub enum AddOutcome {
    Added(AddedBlock),
    AlreadyPresent,
    /// Parked in the orphan buffer behind the given missing dependencies.
    Parked(Vec<Hash>),
}

/// Mailbox messages of a chain handler.
#[derive(Debug)]
pub enum ChainMessage {
    AddBlock { block: Block, origin: DataOrigin },
    AddHeader { header: BlockHeader, origin: DataOrigin },
}

/// A mining template: best deps plus the retargeted difficulty.
#[derive(Clone, Debug)]
pub struct BlockFlowTemplate {
    pub chain_index: ChainIndex,
    pub deps: BlockDeps,
    pub target: U256,
}

/// Mailbox messages of the flow handler.
#[derive(Debug)]
pub enum FlowMessage {
    /// Compute a mining template for a chain.
    PrepareTemplate {
        chain_index: ChainIndex,
        reply: oneshot::Sender<BlockFlowTemplate>,
    },
    /// Install a validated item; the outcome goes back to the submitter.
    Install {
        item: ValidatedItem,
        origin: DataOrigin,
        reply: oneshot::Sender<Result<AddOutcome, ValidationError>>,
    },
    /// Current sync locators.
    Locators {
        reply: oneshot::Sender<Vec<Vec<Hash>>>,
    },
    /// Inventories answering a peer's locators.
    Inventories {
        locators: Vec<Vec<Hash>>,
        reply: oneshot::Sender<Vec<Vec<Hash>>>,
    },
}

/// Mailbox messages of the tx handler.
#[derive(Debug)]
pub enum TxMessage {
    Submit { tx: Transaction },
}

/// Events on the node-wide bus.
#[derive(Clone, Debug)]
pub enum NodeEvent {
    /// A block or header entered the flow; emitted in flow-handler order.
    BlockAdded {
        chain_index: ChainIndex,
        hash: Hash,
        height: u64,
        weight: u64,
        origin: DataOrigin,
    },
    /// A pending transaction appeared in an accepted block.
    TxConfirmed { tx_hash: Hash, block_hash: Hash },
}
