//! In-memory store for tests and header-only brokers.

use crate::batch::OperationKind;
use crate::error::StorageResult;
use crate::kv::{ColumnFamily, KVStore};
use crate::WriteBatch;
use parking_lot::RwLock;
use std::collections::BTreeMap;

type Table = BTreeMap<Vec<u8>, Vec<u8>>;

/// A `KVStore` over per-family `BTreeMap`s. Batches are applied under one
/// write lock, giving the same atomicity the database provides.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<BTreeMap<&'static str, Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KVStore for MemoryStore {
    fn get(&self, cf: ColumnFamily, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        Ok(self
            .tables
            .read()
            .get(cf.name())
            .and_then(|table| table.get(key).cloned()))
    }

    fn put(&self, cf: ColumnFamily, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.tables
            .write()
            .entry(cf.name())
            .or_default()
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, cf: ColumnFamily, key: &[u8]) -> StorageResult<()> {
        if let Some(table) = self.tables.write().get_mut(cf.name()) {
            table.remove(key);
        }
        Ok(())
    }

    fn write_batch(&self, batch: WriteBatch) -> StorageResult<()> {
        let mut tables = self.tables.write();
        for op in batch.operations {
            let table = tables.entry(op.cf.name()).or_default();
            match op.kind {
                OperationKind::Put { value } => {
                    table.insert(op.key, value);
                }
                OperationKind::Delete => {
                    table.remove(&op.key);
                }
            }
        }
        Ok(())
    }

    fn iter(
        &self,
        cf: ColumnFamily,
    ) -> StorageResult<Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + '_>> {
        let collected: Vec<_> = self
            .tables
            .read()
            .get(cf.name())
            .map(|table| {
                table
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        Ok(Box::new(collected.into_iter()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_basic() {
        let store = MemoryStore::new();
        store.put(ColumnFamily::All, b"k", b"v").unwrap();
        assert_eq!(store.get(ColumnFamily::All, b"k").unwrap(), Some(b"v".to_vec()));
        assert!(store.contains(ColumnFamily::All, b"k").unwrap());

        // families are isolated
        assert_eq!(store.get(ColumnFamily::Block, b"k").unwrap(), None);

        store.delete(ColumnFamily::All, b"k").unwrap();
        assert_eq!(store.get(ColumnFamily::All, b"k").unwrap(), None);
    }

    #[test]
    fn test_memory_store_batch() {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch.put(ColumnFamily::Trie, b"a".as_slice(), b"1".as_slice());
        batch.put(ColumnFamily::Trie, b"b".as_slice(), b"2".as_slice());
        batch.delete(ColumnFamily::Trie, b"a".as_slice());
        store.write_batch(batch).unwrap();

        assert_eq!(store.get(ColumnFamily::Trie, b"a").unwrap(), None);
        assert_eq!(store.get(ColumnFamily::Trie, b"b").unwrap(), Some(b"2".to_vec()));
    }
}
