//! The key-value abstraction the core sees.

use crate::batch::WriteBatch;
use crate::error::StorageResult;

/// Column families for organizing data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnFamily {
    /// Node-wide metadata and anything without a dedicated family.
    All,
    /// Full block bodies indexed by block hash.
    Block,
    /// Block headers indexed by block hash.
    Header,
    /// Content-addressed sparse-Merkle-trie nodes.
    Trie,
    /// Event log records.
    Log,
    /// Transactions awaiting validation.
    PendingTx,
    /// Validated transactions ready for templates.
    ReadyTx,
    /// Broker bookkeeping.
    Broker,
}

impl ColumnFamily {
    /// Get the string name of the column family.
    pub fn name(&self) -> &'static str {
        match self {
            ColumnFamily::All => "all",
            ColumnFamily::Block => "block",
            ColumnFamily::Header => "header",
            ColumnFamily::Trie => "trie",
            ColumnFamily::Log => "log",
            ColumnFamily::PendingTx => "pending_tx",
            ColumnFamily::ReadyTx => "ready_tx",
            ColumnFamily::Broker => "broker",
        }
    }

    /// Get all column families.
    pub fn all() -> &'static [ColumnFamily] {
        &[
            ColumnFamily::All,
            ColumnFamily::Block,
            ColumnFamily::Header,
            ColumnFamily::Trie,
            ColumnFamily::Log,
            ColumnFamily::PendingTx,
            ColumnFamily::ReadyTx,
            ColumnFamily::Broker,
        ]
    }
}

/// Storage trait for abstracting database operations.
///
/// This is the entire storage surface the consensus core depends on, which
/// also makes testing with the in-memory implementation trivial.
pub trait KVStore: Send + Sync {
    /// Get a value by key from a column family.
    fn get(&self, cf: ColumnFamily, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;

    /// Put a key-value pair into a column family.
    fn put(&self, cf: ColumnFamily, key: &[u8], value: &[u8]) -> StorageResult<()>;

    /// Delete a key from a column family.
    fn delete(&self, cf: ColumnFamily, key: &[u8]) -> StorageResult<()>;

    /// Check if a key exists in a column family.
    fn contains(&self, cf: ColumnFamily, key: &[u8]) -> StorageResult<bool> {
        Ok(self.get(cf, key)?.is_some())
    }

    /// Execute a batch of writes atomically: either every operation lands
    /// or none does.
    fn write_batch(&self, batch: WriteBatch) -> StorageResult<()>;

    /// Iterate a column family in key order.
    fn iter(
        &self,
        cf: ColumnFamily,
    ) -> StorageResult<Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + '_>>;
}
