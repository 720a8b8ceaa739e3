//! # flow-sync
//!
//! Inter-clique synchronization above the message boundary. Brokers
//! exchange per-chain skip-list locators, answer with per-chain
//! inventories, and fetch missing bodies (blocks for related chains,
//! headers otherwise) through the chain handlers, in order.
//!
//! Transport below the message boundary is out of scope: the synchronizer
//! consumes and produces [`SyncMessage`] values and the caller moves the
//! bytes.

mod error;
mod protocol;
mod synchronizer;

pub use error::{SyncError, SyncResult};
pub use protocol::{SyncMessage, PROTOCOL_VERSION};
pub use synchronizer::{BrokerState, Synchronizer, PEER_SCORE_FLOOR};
