//! RocksDB database implementation.

use crate::batch::OperationKind;
use crate::error::{StorageError, StorageResult};
use crate::kv::{ColumnFamily, KVStore};
use crate::WriteBatch;
use parking_lot::RwLock;
use rocksdb::{
    BlockBasedOptions, Cache, ColumnFamilyDescriptor, DBWithThreadMode, MultiThreaded, Options,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// RocksDB database wrapper.
pub struct Database {
    db: Arc<RwLock<DBWithThreadMode<MultiThreaded>>>,
}

impl Database {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let path = path.as_ref();
        info!("Opening database at {:?}", path);

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_max_open_files(256);
        opts.set_keep_log_file_num(1);
        opts.set_max_total_wal_size(64 * 1024 * 1024);
        opts.set_write_buffer_size(64 * 1024 * 1024);
        opts.set_max_background_jobs(4);

        // Shared block cache across all column families keeps read memory
        // bounded regardless of family count.
        let block_cache = Cache::new_lru_cache(128 * 1024 * 1024);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = ColumnFamily::all()
            .iter()
            .map(|cf| {
                let mut cf_opts = Options::default();
                cf_opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
                cf_opts.set_write_buffer_size(32 * 1024 * 1024);

                let mut block_opts = BlockBasedOptions::default();
                block_opts.set_block_cache(&block_cache);
                block_opts.set_cache_index_and_filter_blocks(true);
                cf_opts.set_block_based_table_factory(&block_opts);

                ColumnFamilyDescriptor::new(cf.name(), cf_opts)
            })
            .collect();

        let db =
            DBWithThreadMode::<MultiThreaded>::open_cf_descriptors(&opts, path, cf_descriptors)?;

        debug!("Database opened successfully");

        Ok(Self {
            db: Arc::new(RwLock::new(db)),
        })
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> StorageResult<()> {
        let db = self.db.read();
        for cf in ColumnFamily::all() {
            if let Some(handle) = db.cf_handle(cf.name()) {
                db.flush_cf(&handle)?;
            }
        }
        Ok(())
    }
}

impl KVStore for Database {
    fn get(&self, cf: ColumnFamily, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        let db = self.db.read();
        let handle = db
            .cf_handle(cf.name())
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(cf.name().to_string()))?;

        Ok(db.get_cf(&handle, key)?)
    }

    fn put(&self, cf: ColumnFamily, key: &[u8], value: &[u8]) -> StorageResult<()> {
        let db = self.db.read();
        let handle = db
            .cf_handle(cf.name())
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(cf.name().to_string()))?;

        db.put_cf(&handle, key, value)?;
        Ok(())
    }

    fn delete(&self, cf: ColumnFamily, key: &[u8]) -> StorageResult<()> {
        let db = self.db.read();
        let handle = db
            .cf_handle(cf.name())
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(cf.name().to_string()))?;

        db.delete_cf(&handle, key)?;
        Ok(())
    }

    fn write_batch(&self, batch: WriteBatch) -> StorageResult<()> {
        let db = self.db.read();
        let mut rocks_batch = rocksdb::WriteBatch::default();

        for op in batch.operations {
            let handle = db
                .cf_handle(op.cf.name())
                .ok_or_else(|| StorageError::ColumnFamilyNotFound(op.cf.name().to_string()))?;

            match op.kind {
                OperationKind::Put { value } => {
                    rocks_batch.put_cf(&handle, &op.key, &value);
                }
                OperationKind::Delete => {
                    rocks_batch.delete_cf(&handle, &op.key);
                }
            }
        }

        // WAL provides durability, the fsync can wait.
        let mut write_opts = rocksdb::WriteOptions::default();
        write_opts.disable_wal(false);
        write_opts.set_sync(false);

        db.write_opt(rocks_batch, &write_opts)?;
        Ok(())
    }

    fn iter(
        &self,
        cf: ColumnFamily,
    ) -> StorageResult<Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + '_>> {
        let db = self.db.read();
        let handle = db
            .cf_handle(cf.name())
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(cf.name().to_string()))?;

        let collected: Vec<_> = db
            .iterator_cf(&handle, rocksdb::IteratorMode::Start)
            .filter_map(|r| r.ok())
            .map(|(k, v)| (k.to_vec(), v.to_vec()))
            .collect();

        Ok(Box::new(collected.into_iter()))
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
        }
    }
}
