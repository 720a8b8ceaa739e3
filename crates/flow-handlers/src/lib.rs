//! # flow-handlers
//!
//! The actor-style handler mesh. Every handler is a tokio task owning its
//! mailbox and logically single-threaded over it:
//!
//! - one chain handler per chain (blocks for related chains, headers for
//!   the rest), doing snapshot validation and dedup
//! - one flow handler serializing every DAG mutation and publishing
//!   `BlockAdded` in a total order
//! - one tx handler owning the pending transaction pool
//!
//! Handlers hold only the send-ends of each other's mailboxes; replies
//! travel over request-scoped oneshot channels, never by blocking.

mod all;
mod chain_handler;
mod flow_handler;
mod messages;
mod tx_handler;

pub use all::AllHandlers;
pub use chain_handler::ChainHandler;
pub use flow_handler::FlowHandler;
pub use messages::{
    AddOutcome, BlockFlowTemplate, ChainMessage, DataOrigin, FlowMessage, ItemState, NodeEvent,
    TxMessage, ValidatedItem,
};
pub use tx_handler::TxHandler;

/// Mailbox depth for every handler.
pub(crate) const MAILBOX_CAPACITY: usize = 256;
/// Event bus depth; slow subscribers miss old events rather than block.
pub(crate) const EVENT_BUS_CAPACITY: usize = 1024;
