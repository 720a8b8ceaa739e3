//! The transaction handler.
//!
//! Owns the pending pool: deduplicates submissions by hash, persists them
//! under the `PendingTx` column family, promotes structurally sound ones to
//! `ReadyTx` for the miner's templates, and publishes `TxConfirmed` when an
//! accepted block carries a pending transaction.

use crate::messages::{NodeEvent, TxMessage};
use flow_storage::{ChainStore, ColumnFamily, KVStore};
use flow_types::{Codec, Hash, Transaction};
use std::collections::HashMap;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

/// The tx handler task.
pub struct TxHandler {
    store: ChainStore,
    pending: HashMap<Hash, Transaction>,
    events: broadcast::Sender<NodeEvent>,
}

impl TxHandler {
    pub fn new(store: ChainStore, events: broadcast::Sender<NodeEvent>) -> Self {
        Self {
            store,
            pending: HashMap::new(),
            events,
        }
    }

    /// Drive the mailbox and the event bus together.
    pub async fn run(
        mut self,
        mut mailbox: mpsc::Receiver<TxMessage>,
        mut events: broadcast::Receiver<NodeEvent>,
    ) {
        debug!("Tx handler started");
        loop {
            tokio::select! {
                message = mailbox.recv() => {
                    match message {
                        Some(TxMessage::Submit { tx }) => self.submit(tx),
                        None => break,
                    }
                }
                event = events.recv() => {
                    match event {
                        Ok(NodeEvent::BlockAdded { hash, .. }) => self.confirm_in_block(&hash),
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Tx handler lagged on the event bus");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }
        debug!("Tx handler stopped");
    }

    fn submit(&mut self, tx: Transaction) {
        let hash = tx.hash();
        if self.pending.contains_key(&hash) {
            debug!(tx = %hash, "Duplicate transaction ignored");
            return;
        }

        // Structural checks: a non-coinbase transaction must spend inputs
        // and carry at least one signature.
        if !tx.is_coinbase() && tx.signatures.is_empty() {
            warn!(tx = %hash, "Unsigned transaction dropped");
            return;
        }
        if tx.unsigned.outputs.is_empty() {
            warn!(tx = %hash, "Transaction without outputs dropped");
            return;
        }

        let encoded = tx.encode();
        let raw = self.store.raw();
        if let Err(error) = raw.put(ColumnFamily::PendingTx, hash.as_bytes(), &encoded) {
            warn!(tx = %hash, %error, "Failed to persist pending tx");
            return;
        }
        // Execution-level validation happens at block execution; anything
        // structurally sound is template-ready.
        if let Err(error) = raw.put(ColumnFamily::ReadyTx, hash.as_bytes(), &encoded) {
            warn!(tx = %hash, %error, "Failed to mark tx ready");
        }

        info!(tx = %hash, "Transaction pending");
        self.pending.insert(hash, tx);
    }

    fn confirm_in_block(&mut self, block_hash: &Hash) {
        let block = match self.store.get_block(block_hash) {
            Ok(Some(block)) => block,
            Ok(None) => return, // header-only chains carry no tx bodies
            Err(error) => {
                warn!(block = %block_hash, %error, "Failed to read block for confirmation");
                return;
            }
        };

        for tx in &block.transactions {
            let tx_hash = tx.hash();
            if self.pending.remove(&tx_hash).is_some() {
                let raw = self.store.raw();
                let _ = raw.delete(ColumnFamily::PendingTx, tx_hash.as_bytes());
                let _ = raw.delete(ColumnFamily::ReadyTx, tx_hash.as_bytes());
                info!(tx = %tx_hash, block = %block_hash, "Transaction confirmed");
                let _ = self.events.send(NodeEvent::TxConfirmed {
                    tx_hash,
                    block_hash: *block_hash,
                });
            }
        }
    }

    /// Transactions currently ready for inclusion in templates.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
