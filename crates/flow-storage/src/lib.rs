//! # flow-storage
//!
//! Storage layer for the flow node.
//!
//! The consensus core only ever sees the [`KVStore`] trait: a column-family
//! keyed byte store with atomic batch writes. Two implementations are
//! provided, a RocksDB-backed [`Database`] and an in-memory [`MemoryStore`]
//! for tests. On top of the raw store sit:
//!
//! - [`ChainStore`]: append-only block/header store with a per-chain height
//!   index and chain-state cursor
//! - [`SparseMerkleTrie`] / [`WorldState`]: the authenticated key-value
//!   structure backing contract and asset state
//!
//! ## Column families
//!
//! `All`, `Block`, `Header`, `Trie`, `Log`, `PendingTx`, `ReadyTx`, `Broker`.
//! Metadata records are distinguished by single-byte key postfixes, see
//! [`keys`].

mod batch;
mod chain_store;
mod database;
mod error;
pub mod keys;
mod kv;
mod memory;
mod smt;
mod world;

pub use batch::WriteBatch;
pub use chain_store::{BlockState, ChainState, ChainStore};
pub use database::Database;
pub use error::{StorageError, StorageResult};
pub use kv::{ColumnFamily, KVStore};
pub use memory::MemoryStore;
pub use smt::SparseMerkleTrie;
pub use world::{AccountState, WorldState};
