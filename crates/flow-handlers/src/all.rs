//! `AllHandlers`: construction and wiring of the whole mesh.
//!
//! Building the mesh creates the shared `BlockFlow`, one mailbox per
//! handler, and spawns every task. The returned value holds only typed
//! send-ends plus the event bus, so cycles exist at the reference layer
//! while each mailbox stays independently owned by its task.

use crate::chain_handler::ChainHandler;
use crate::flow_handler::FlowHandler;
use crate::messages::{
    AddOutcome, BlockFlowTemplate, ChainMessage, DataOrigin, FlowMessage, NodeEvent, TxMessage,
    ValidatedItem,
};
use crate::tx_handler::TxHandler;
use crate::{EVENT_BUS_CAPACITY, MAILBOX_CAPACITY};
use flow_core::{BlockFlow, ConsensusParams, FlowResult, TargetAdjustment, ValidationError};
use flow_storage::ChainStore;
use flow_types::{Block, BlockHeader, ChainIndex, Hash};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::info;

/// Send-ends of every handler in the mesh.
#[derive(Clone)]
pub struct AllHandlers {
    groups: u32,
    chain_txs: Vec<mpsc::Sender<ChainMessage>>,
    flow_tx: mpsc::Sender<FlowMessage>,
    tx_tx: mpsc::Sender<TxMessage>,
    events: broadcast::Sender<NodeEvent>,
    blockflow: Arc<RwLock<BlockFlow>>,
}

impl AllHandlers {
    /// Build the mesh and spawn every handler task.
    pub fn build(
        params: ConsensusParams,
        store: ChainStore,
        strategy: Box<dyn TargetAdjustment>,
    ) -> FlowResult<(AllHandlers, Vec<JoinHandle<()>>)> {
        let groups = params.groups;
        let broker = params.broker;
        let blockflow = Arc::new(RwLock::new(BlockFlow::new(
            params,
            store.clone(),
            strategy,
        )?));

        let (events, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        let (flow_tx, flow_rx) = mpsc::channel(MAILBOX_CAPACITY);
        let (tx_tx, tx_rx) = mpsc::channel(MAILBOX_CAPACITY);

        let mut tasks = Vec::new();
        let mut chain_txs = Vec::with_capacity((groups * groups) as usize);

        for chain_index in ChainIndex::all(groups) {
            let (chain_tx, chain_rx) = mpsc::channel(MAILBOX_CAPACITY);
            let handler = ChainHandler::new(
                chain_index,
                broker.relates_to(chain_index),
                Arc::clone(&blockflow),
                flow_tx.clone(),
            );
            tasks.push(tokio::spawn(handler.run(chain_rx)));
            chain_txs.push(chain_tx);
        }

        let flow_handler = FlowHandler::new(Arc::clone(&blockflow), events.clone());
        tasks.push(tokio::spawn(flow_handler.run(flow_rx)));

        let tx_handler = TxHandler::new(store, events.clone());
        tasks.push(tokio::spawn(tx_handler.run(tx_rx, events.subscribe())));

        info!(groups, handlers = tasks.len(), "Handler mesh started");

        Ok((
            AllHandlers {
                groups,
                chain_txs,
                flow_tx,
                tx_tx,
                events,
                blockflow,
            },
            tasks,
        ))
    }

    pub fn groups(&self) -> u32 {
        self.groups
    }

    /// Read access to the flow, for validators and tests.
    pub fn blockflow(&self) -> &Arc<RwLock<BlockFlow>> {
        &self.blockflow
    }

    /// Subscribe to the node event bus.
    pub fn subscribe(&self) -> broadcast::Receiver<NodeEvent> {
        self.events.subscribe()
    }

    /// The mailbox of one chain handler.
    pub fn chain(&self, index: ChainIndex) -> &mpsc::Sender<ChainMessage> {
        &self.chain_txs[index.flat_index(self.groups)]
    }

    /// Submit a block to its chain handler.
    pub async fn submit_block(&self, block: Block, origin: DataOrigin) -> bool {
        let index = block.chain_index(self.groups);
        self.chain(index)
            .send(ChainMessage::AddBlock { block, origin })
            .await
            .is_ok()
    }

    /// Submit a header to its chain handler.
    pub async fn submit_header(&self, header: BlockHeader, origin: DataOrigin) -> bool {
        let index = header.chain_index(self.groups);
        self.chain(index)
            .send(ChainMessage::AddHeader { header, origin })
            .await
            .is_ok()
    }

    /// Submit a transaction to the tx handler.
    pub async fn submit_tx(&self, tx: flow_types::Transaction) -> bool {
        self.tx_tx.send(TxMessage::Submit { tx }).await.is_ok()
    }

    /// Ask the flow handler for a mining template.
    pub async fn prepare_template(&self, chain_index: ChainIndex) -> Option<BlockFlowTemplate> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.flow_tx
            .send(FlowMessage::PrepareTemplate {
                chain_index,
                reply: reply_tx,
            })
            .await
            .ok()?;
        reply_rx.await.ok()
    }

    /// Install an item directly through the flow handler, bypassing the
    /// chain handlers. Used by the synchronizer for ordered batches.
    pub async fn install(
        &self,
        item: ValidatedItem,
        origin: DataOrigin,
    ) -> Option<Result<AddOutcome, ValidationError>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.flow_tx
            .send(FlowMessage::Install {
                item,
                origin,
                reply: reply_tx,
            })
            .await
            .ok()?;
        reply_rx.await.ok()
    }

    /// Current sync locators.
    pub async fn locators(&self) -> Option<Vec<Vec<Hash>>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.flow_tx
            .send(FlowMessage::Locators { reply: reply_tx })
            .await
            .ok()?;
        reply_rx.await.ok()
    }

    /// Inventories answering a peer's locators.
    pub async fn inventories(&self, locators: Vec<Vec<Hash>>) -> Option<Vec<Vec<Hash>>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.flow_tx
            .send(FlowMessage::Inventories {
                locators,
                reply: reply_tx,
            })
            .await
            .ok()?;
        reply_rx.await.ok()
    }
}
