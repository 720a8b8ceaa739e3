//! The per-peer broker state machine and the synchronizer driving it.
//!
//! Per peer: `Handshaking → Exchanging → {Syncing, Synced}`. While
//! `Syncing`, the broker periodically publishes its locators; a response
//! that is empty on every chain flips the session to `Synced`, anything
//! else queues ordered fetches through the handler mesh. Disconnects drop
//! the session and its pending inventories. Protocol violations score the
//! peer down until the caller disconnects it.

use crate::error::{SyncError, SyncResult};
use crate::protocol::{SyncMessage, PROTOCOL_VERSION};
use flow_handlers::{AllHandlers, DataOrigin, ValidatedItem};
use flow_types::{BrokerConfig, ChainIndex, Hash};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Session states of one peer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BrokerState {
    Handshaking,
    Exchanging,
    Syncing,
    Synced,
}

/// Peers at or below this score should be disconnected by the caller.
pub const PEER_SCORE_FLOOR: i32 = -3;

struct PeerSession {
    state: BrokerState,
    score: i32,
    /// Peer's broker range, learned in the handshake.
    broker: Option<BrokerConfig>,
}

impl PeerSession {
    fn new() -> Self {
        Self {
            state: BrokerState::Handshaking,
            score: 0,
            broker: None,
        }
    }
}

/// Drives every peer session against the local handler mesh.
pub struct Synchronizer {
    handlers: AllHandlers,
    broker: BrokerConfig,
    sessions: HashMap<u64, PeerSession>,
}

impl Synchronizer {
    pub fn new(handlers: AllHandlers, broker: BrokerConfig) -> Self {
        Self {
            handlers,
            broker,
            sessions: HashMap::new(),
        }
    }

    /// Register a connected peer; returns our handshake.
    pub fn add_peer(&mut self, peer: u64) -> SyncMessage {
        info!(peer, "Peer connected, handshaking");
        self.sessions.insert(peer, PeerSession::new());
        SyncMessage::Handshake {
            version: PROTOCOL_VERSION,
            groups: self.broker.groups,
            broker_from: self.broker.broker_from,
            broker_until: self.broker.broker_until,
        }
    }

    /// Drop a peer and its pending state.
    pub fn remove_peer(&mut self, peer: u64) {
        if self.sessions.remove(&peer).is_some() {
            info!(peer, "Peer disconnected, session dropped");
        }
    }

    pub fn state_of(&self, peer: u64) -> Option<BrokerState> {
        self.sessions.get(&peer).map(|session| session.state)
    }

    pub fn score_of(&self, peer: u64) -> Option<i32> {
        self.sessions.get(&peer).map(|session| session.score)
    }

    /// Whether every known peer is synced.
    pub fn is_synced(&self) -> bool {
        !self.sessions.is_empty()
            && self
                .sessions
                .values()
                .all(|session| session.state == BrokerState::Synced)
    }

    /// Periodic driver: publish our locators to every syncing peer.
    pub async fn tick(&mut self) -> SyncResult<Vec<(u64, SyncMessage)>> {
        let syncing: Vec<u64> = self
            .sessions
            .iter()
            .filter(|(_, session)| {
                matches!(session.state, BrokerState::Syncing | BrokerState::Synced)
            })
            .map(|(peer, _)| *peer)
            .collect();
        if syncing.is_empty() {
            return Ok(Vec::new());
        }

        let locators = self
            .handlers
            .locators()
            .await
            .ok_or(SyncError::HandlersGone)?;
        Ok(syncing
            .into_iter()
            .map(|peer| {
                (
                    peer,
                    SyncMessage::SyncRequest {
                        locators: locators.clone(),
                    },
                )
            })
            .collect())
    }

    /// Process one inbound message; returns the replies for that peer.
    /// A protocol violation scores the peer down and drops the message.
    pub async fn handle_message(
        &mut self,
        peer: u64,
        message: SyncMessage,
    ) -> SyncResult<Vec<SyncMessage>> {
        if !self.sessions.contains_key(&peer) {
            return Err(SyncError::Protocol {
                peer,
                reason: "message from unknown peer".into(),
            });
        }

        let result = match message {
            SyncMessage::Handshake {
                version,
                groups,
                broker_from,
                broker_until,
            } => self.on_handshake(peer, version, groups, broker_from, broker_until).await,
            SyncMessage::SyncRequest { locators } => self.on_sync_request(peer, locators).await,
            SyncMessage::SyncResponse { inventories } => {
                self.on_sync_response(peer, inventories).await
            }
            SyncMessage::BlockRequest { hashes } => self.on_block_request(peer, hashes),
            SyncMessage::HeaderRequest { hashes } => self.on_header_request(peer, hashes),
            SyncMessage::BlockResponse { blocks } => self.on_block_response(peer, blocks).await,
            SyncMessage::HeaderResponse { headers } => {
                self.on_header_response(peer, headers).await
            }
        };

        if result.is_err() {
            if let Some(session) = self.sessions.get_mut(&peer) {
                session.score -= 1;
                warn!(peer, score = session.score, "Peer scored down");
            }
        }
        result
    }

    async fn on_handshake(
        &mut self,
        peer: u64,
        version: u32,
        groups: u32,
        broker_from: u32,
        broker_until: u32,
    ) -> SyncResult<Vec<SyncMessage>> {
        if version != PROTOCOL_VERSION || groups != self.broker.groups {
            return Err(SyncError::Protocol {
                peer,
                reason: format!("incompatible handshake: version {version}, groups {groups}"),
            });
        }
        if broker_from >= broker_until || broker_until > groups {
            return Err(SyncError::Protocol {
                peer,
                reason: "invalid broker range".into(),
            });
        }

        let session = self.sessions.get_mut(&peer).expect("checked above");
        session.broker = Some(BrokerConfig {
            groups,
            broker_from,
            broker_until,
        });
        session.state = BrokerState::Exchanging;
        debug!(peer, "Handshake complete, exchanging locators");

        let locators = self
            .handlers
            .locators()
            .await
            .ok_or(SyncError::HandlersGone)?;
        Ok(vec![SyncMessage::SyncRequest { locators }])
    }

    async fn on_sync_request(
        &mut self,
        peer: u64,
        locators: Vec<Vec<Hash>>,
    ) -> SyncResult<Vec<SyncMessage>> {
        let chain_count = (self.broker.groups * self.broker.groups) as usize;
        if locators.len() != chain_count {
            return Err(SyncError::Protocol {
                peer,
                reason: format!(
                    "locator vector has {} chains, expected {chain_count}",
                    locators.len()
                ),
            });
        }
        let inventories = self
            .handlers
            .inventories(locators)
            .await
            .ok_or(SyncError::HandlersGone)?;
        Ok(vec![SyncMessage::SyncResponse { inventories }])
    }

    async fn on_sync_response(
        &mut self,
        peer: u64,
        inventories: Vec<Vec<Hash>>,
    ) -> SyncResult<Vec<SyncMessage>> {
        let chain_count = (self.broker.groups * self.broker.groups) as usize;
        if inventories.len() != chain_count {
            return Err(SyncError::Protocol {
                peer,
                reason: format!(
                    "inventory vector has {} chains, expected {chain_count}",
                    inventories.len()
                ),
            });
        }

        let all_empty = inventories.iter().all(Vec::is_empty);
        let session = self.sessions.get_mut(&peer).expect("checked in handle");
        if all_empty {
            if session.state != BrokerState::Synced {
                info!(peer, "Synced with peer");
            }
            session.state = BrokerState::Synced;
            return Ok(Vec::new());
        }
        session.state = BrokerState::Syncing;

        // Fetch bodies for related chains, headers for the rest, in
        // canonical chain order.
        let mut block_hashes = Vec::new();
        let mut header_hashes = Vec::new();
        for (flat, chain_inventory) in inventories.into_iter().enumerate() {
            let chain_index = ChainIndex::from_flat_index(flat, self.broker.groups);
            if self.broker.relates_to(chain_index) {
                block_hashes.extend(chain_inventory);
            } else {
                header_hashes.extend(chain_inventory);
            }
        }

        debug!(
            peer,
            blocks = block_hashes.len(),
            headers = header_hashes.len(),
            "Fetching missing items"
        );
        let mut replies = Vec::new();
        if !block_hashes.is_empty() {
            replies.push(SyncMessage::BlockRequest {
                hashes: block_hashes,
            });
        }
        if !header_hashes.is_empty() {
            replies.push(SyncMessage::HeaderRequest {
                hashes: header_hashes,
            });
        }
        Ok(replies)
    }

    fn on_block_request(&self, peer: u64, hashes: Vec<Hash>) -> SyncResult<Vec<SyncMessage>> {
        let flow = self.handlers.blockflow().read();
        let mut blocks = Vec::with_capacity(hashes.len());
        for hash in hashes {
            match flow.store().get_block(&hash) {
                Ok(Some(block)) => blocks.push(block),
                Ok(None) => debug!(peer, hash = %hash, "Requested block unknown"),
                Err(error) => {
                    warn!(peer, hash = %hash, %error, "Failed to read block");
                }
            }
        }
        Ok(vec![SyncMessage::BlockResponse { blocks }])
    }

    fn on_header_request(&self, peer: u64, hashes: Vec<Hash>) -> SyncResult<Vec<SyncMessage>> {
        let flow = self.handlers.blockflow().read();
        let mut headers = Vec::with_capacity(hashes.len());
        for hash in hashes {
            match flow.store().get_header(&hash) {
                Ok(Some(header)) => headers.push(header),
                Ok(None) => debug!(peer, hash = %hash, "Requested header unknown"),
                Err(error) => {
                    warn!(peer, hash = %hash, %error, "Failed to read header");
                }
            }
        }
        Ok(vec![SyncMessage::HeaderResponse { headers }])
    }

    async fn on_block_response(
        &mut self,
        peer: u64,
        blocks: Vec<flow_types::Block>,
    ) -> SyncResult<Vec<SyncMessage>> {
        // Install in arrival order through the flow handler, awaiting each
        // outcome: inventories are ordered parent-first, so the orphan
        // buffer stays quiet and the follow-up locator request sees the
        // batch applied.
        for block in blocks {
            let outcome = self
                .handlers
                .install(ValidatedItem::Block(block), DataOrigin::Peer(peer))
                .await
                .ok_or(SyncError::HandlersGone)?;
            if let Err(validation) = outcome {
                return Err(SyncError::Protocol {
                    peer,
                    reason: format!("invalid block in response: {validation}"),
                });
            }
        }
        // After ingesting a batch, ask again; an empty response will flip
        // the session to Synced.
        let locators = self
            .handlers
            .locators()
            .await
            .ok_or(SyncError::HandlersGone)?;
        Ok(vec![SyncMessage::SyncRequest { locators }])
    }

    async fn on_header_response(
        &mut self,
        peer: u64,
        headers: Vec<flow_types::BlockHeader>,
    ) -> SyncResult<Vec<SyncMessage>> {
        for header in headers {
            let outcome = self
                .handlers
                .install(ValidatedItem::Header(header), DataOrigin::Peer(peer))
                .await
                .ok_or(SyncError::HandlersGone)?;
            if let Err(validation) = outcome {
                return Err(SyncError::Protocol {
                    peer,
                    reason: format!("invalid header in response: {validation}"),
                });
            }
        }
        Ok(Vec::new())
    }
}
