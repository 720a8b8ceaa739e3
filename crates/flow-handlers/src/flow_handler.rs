//! The single serializer of DAG mutations.
//!
//! Cross-chain consistency checks need a globally consistent tips
//! snapshot, so every mutation funnels through this one task: items are
//! installed in arrival order, orphans resolve here, and `BlockAdded`
//! events leave in a total order. Chain handlers validated against a
//! possibly lagging snapshot; everything is re-checked here before commit.

use crate::messages::{AddOutcome, BlockFlowTemplate, DataOrigin, FlowMessage, NodeEvent, ValidatedItem};
use flow_core::{AddResult, BlockFlow, FlowError, OrphanPool, ValidationError};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

/// The flow handler task.
pub struct FlowHandler {
    blockflow: Arc<RwLock<BlockFlow>>,
    orphans: OrphanPool<(ValidatedItem, DataOrigin)>,
    events: broadcast::Sender<NodeEvent>,
}

impl FlowHandler {
    pub fn new(
        blockflow: Arc<RwLock<BlockFlow>>,
        events: broadcast::Sender<NodeEvent>,
    ) -> Self {
        let capacity = blockflow.read().params().orphan_capacity;
        Self {
            blockflow,
            orphans: OrphanPool::new(capacity),
            events,
        }
    }

    /// Drain the mailbox until every sender is gone.
    pub async fn run(mut self, mut mailbox: mpsc::Receiver<FlowMessage>) {
        info!("Flow handler started");
        while let Some(message) = mailbox.recv().await {
            self.handle(message);
        }
        info!("Flow handler stopped");
    }

    fn handle(&mut self, message: FlowMessage) {
        match message {
            FlowMessage::PrepareTemplate { chain_index, reply } => {
                let flow = self.blockflow.read();
                let template = BlockFlowTemplate {
                    chain_index,
                    deps: flow.get_best_deps(chain_index),
                    target: flow.next_target(chain_index),
                };
                drop(flow);
                let _ = reply.send(template);
            }
            FlowMessage::Install {
                item,
                origin,
                reply,
            } => {
                let outcome = self.install(item, origin);
                let _ = reply.send(outcome);
            }
            FlowMessage::Locators { reply } => {
                let _ = reply.send(self.blockflow.read().get_sync_locators());
            }
            FlowMessage::Inventories { locators, reply } => {
                let _ = reply.send(self.blockflow.read().get_sync_inventories(&locators));
            }
        }
    }

    fn install(
        &mut self,
        item: ValidatedItem,
        origin: DataOrigin,
    ) -> Result<AddOutcome, ValidationError> {
        let result = {
            let mut flow = self.blockflow.write();
            match &item {
                ValidatedItem::Block(block) => flow.add_block(block),
                ValidatedItem::Header(header) => flow.add_header(header),
            }
        };

        match result {
            Ok(AddResult::Added(added)) => {
                debug!(
                    hash = %added.hash,
                    chain = %added.chain_index,
                    weight = added.weight,
                    "Installed"
                );
                let _ = self.events.send(NodeEvent::BlockAdded {
                    chain_index: added.chain_index,
                    hash: added.hash,
                    height: added.height,
                    weight: added.weight,
                    origin,
                });
                self.resolve_orphans(added.hash);
                Ok(AddOutcome::Added(added))
            }
            Ok(AddResult::AlreadyPresent) => Ok(AddOutcome::AlreadyPresent),
            Ok(AddResult::MissingDeps(missing)) => {
                let first = missing[0];
                let hash = item.hash();
                if let Some((evicted, _)) = self.orphans.park(hash, (item, origin), first) {
                    warn!(
                        evicted = %evicted.hash(),
                        "Orphan buffer full, dropped oldest"
                    );
                }
                Ok(AddOutcome::Parked(missing))
            }
            Err(FlowError::Validation(validation)) => {
                warn!(hash = %item.hash(), error = %validation, "Rejected");
                Err(validation)
            }
            Err(FlowError::Storage(storage)) => {
                // Corruption is fatal by policy; IO failures drop the item
                // and the peer retries through sync.
                error!(error = %storage, "Storage failure while installing");
                Err(ValidationError::UnknownParent(item.hash()))
            }
        }
    }

    /// Re-run items that were waiting on a freshly installed hash. A
    /// resolved item can itself unlock more, so keep a work queue.
    fn resolve_orphans(&mut self, resolved: flow_types::Hash) {
        let mut queue = vec![resolved];
        while let Some(hash) = queue.pop() {
            for (item, origin) in self.orphans.resolve(&hash) {
                let child = item.hash();
                match self.install(item, origin) {
                    Ok(AddOutcome::Added(added)) => {
                        debug!(hash = %added.hash, "Orphan resolved");
                        queue.push(added.hash);
                    }
                    Ok(AddOutcome::Parked(_)) => {
                        debug!(hash = %child, "Orphan still waiting on another dep");
                    }
                    Ok(AddOutcome::AlreadyPresent) => {}
                    Err(validation) => {
                        warn!(hash = %child, error = %validation, "Orphan rejected");
                    }
                }
            }
        }
    }
}
