//! Per-chain block and header storage.
//!
//! Append-only: bodies and headers are keyed by hash and never rewritten.
//! Alongside each entity lives a `BlockState` record (height, weight, chain,
//! parent link), a per-chain height index mapping `(chain, height)` to the
//! hashes at that height (forks make this a list), and a chain-state cursor
//! holding the current canonical tip.

use crate::error::{StorageError, StorageResult};
use crate::keys;
use crate::kv::{ColumnFamily, KVStore};
use crate::WriteBatch;
use flow_types::{Block, BlockHeader, ChainIndex, Codec, CodecResult, Hash, Reader};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Backoff schedule for transient I/O failures; corruption never retries.
const IO_RETRY_BACKOFF: [Duration; 3] = [
    Duration::from_millis(5),
    Duration::from_millis(20),
    Duration::from_millis(80),
];

fn with_io_retries<T>(mut operation: impl FnMut() -> StorageResult<T>) -> StorageResult<T> {
    let mut attempt = 0;
    loop {
        match operation() {
            Err(StorageError::IOFailure(reason)) if attempt < IO_RETRY_BACKOFF.len() => {
                warn!(attempt, %reason, "Transient storage failure, retrying");
                std::thread::sleep(IO_RETRY_BACKOFF[attempt]);
                attempt += 1;
            }
            other => return other,
        }
    }
}

/// Consensus bookkeeping stored next to each block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockState {
    pub height: u64,
    pub weight: u64,
    pub chain_index: ChainIndex,
    pub parent: Hash,
    pub timestamp_ms: u64,
}

impl Codec for BlockState {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        self.height.encode_to(buf);
        self.weight.encode_to(buf);
        self.chain_index.encode_to(buf);
        self.parent.encode_to(buf);
        self.timestamp_ms.encode_to(buf);
    }

    fn decode(reader: &mut Reader<'_>) -> CodecResult<Self> {
        Ok(Self {
            height: u64::decode(reader)?,
            weight: u64::decode(reader)?,
            chain_index: ChainIndex::decode(reader)?,
            parent: Hash::decode(reader)?,
            timestamp_ms: u64::decode(reader)?,
        })
    }
}

/// The canonical cursor of one chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainState {
    pub tip: Hash,
    pub height: u64,
}

impl Codec for ChainState {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        self.tip.encode_to(buf);
        self.height.encode_to(buf);
    }

    fn decode(reader: &mut Reader<'_>) -> CodecResult<Self> {
        Ok(Self {
            tip: Hash::decode(reader)?,
            height: u64::decode(reader)?,
        })
    }
}

/// Block and header store over the raw KV engine.
#[derive(Clone)]
pub struct ChainStore {
    store: Arc<dyn KVStore>,
    groups: u32,
}

impl ChainStore {
    pub fn new(store: Arc<dyn KVStore>, groups: u32) -> Self {
        Self { store, groups }
    }

    pub fn groups(&self) -> u32 {
        self.groups
    }

    /// Persist a full block with its state record, extending the height
    /// index, in one atomic batch. Transient I/O failures retry with
    /// bounded backoff; a failed batch leaves no partial state behind.
    pub fn commit_block(&self, block: &Block, state: &BlockState) -> StorageResult<()> {
        let hash = block.hash();
        with_io_retries(|| {
            let mut batch = WriteBatch::with_capacity(4);
            batch.put(ColumnFamily::Block, keys::entity(&hash), block.encode());
            self.stage_header(&mut batch, &hash, &block.header, state)?;
            self.store.write_batch(batch)
        })?;
        debug!(hash = %hash, height = state.height, "Block committed");
        Ok(())
    }

    /// Persist a header-only entity (non-related chains).
    pub fn commit_header(&self, header: &BlockHeader, state: &BlockState) -> StorageResult<()> {
        let hash = header.hash();
        with_io_retries(|| {
            let mut batch = WriteBatch::with_capacity(3);
            self.stage_header(&mut batch, &hash, header, state)?;
            self.store.write_batch(batch)
        })?;
        debug!(hash = %hash, height = state.height, "Header committed");
        Ok(())
    }

    fn stage_header(
        &self,
        batch: &mut WriteBatch,
        hash: &Hash,
        header: &BlockHeader,
        state: &BlockState,
    ) -> StorageResult<()> {
        batch.put(ColumnFamily::Header, keys::entity(hash), header.encode());
        batch.put(ColumnFamily::All, keys::block_state(hash), state.encode());

        let height_key = keys::height(state.chain_index, self.groups, state.height);
        let mut hashes = self.hashes_at(state.chain_index, state.height)?;
        if !hashes.contains(hash) {
            hashes.push(*hash);
        }
        batch.put(ColumnFamily::All, height_key, hashes.encode());
        Ok(())
    }

    pub fn get_block(&self, hash: &Hash) -> StorageResult<Option<Block>> {
        match self.store.get(ColumnFamily::Block, &keys::entity(hash))? {
            Some(bytes) => Ok(Some(Block::decode_all(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn get_header(&self, hash: &Hash) -> StorageResult<Option<BlockHeader>> {
        match self.store.get(ColumnFamily::Header, &keys::entity(hash))? {
            Some(bytes) => Ok(Some(BlockHeader::decode_all(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn contains(&self, hash: &Hash) -> StorageResult<bool> {
        self.store.contains(ColumnFamily::Header, &keys::entity(hash))
    }

    pub fn get_block_state(&self, hash: &Hash) -> StorageResult<Option<BlockState>> {
        match self.store.get(ColumnFamily::All, &keys::block_state(hash))? {
            Some(bytes) => Ok(Some(BlockState::decode_all(&bytes)?)),
            None => Ok(None),
        }
    }

    /// State record that must exist; missing means corruption upstream.
    pub fn require_block_state(&self, hash: &Hash) -> StorageResult<BlockState> {
        self.get_block_state(hash)?
            .ok_or_else(|| StorageError::NotFound(format!("block state for {hash}")))
    }

    /// All hashes recorded at a height of one chain (forks yield several).
    pub fn hashes_at(&self, chain: ChainIndex, height: u64) -> StorageResult<Vec<Hash>> {
        match self
            .store
            .get(ColumnFamily::All, &keys::height(chain, self.groups, height))?
        {
            Some(bytes) => Ok(Vec::<Hash>::decode_all(&bytes)?),
            None => Ok(Vec::new()),
        }
    }

    pub fn set_chain_state(&self, chain: ChainIndex, state: &ChainState) -> StorageResult<()> {
        self.store.put(
            ColumnFamily::All,
            &keys::chain_state(chain, self.groups),
            &state.encode(),
        )
    }

    pub fn get_chain_state(&self, chain: ChainIndex) -> StorageResult<Option<ChainState>> {
        match self
            .store
            .get(ColumnFamily::All, &keys::chain_state(chain, self.groups))?
        {
            Some(bytes) => Ok(Some(ChainState::decode_all(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Pin the world-state root produced by executing a block.
    pub fn set_trie_hash(&self, block: &Hash, root: &Hash) -> StorageResult<()> {
        self.store
            .put(ColumnFamily::All, &keys::trie_hash(block), root.as_bytes())
    }

    pub fn get_trie_hash(&self, block: &Hash) -> StorageResult<Option<Hash>> {
        Ok(self
            .store
            .get(ColumnFamily::All, &keys::trie_hash(block))?
            .and_then(|bytes| Hash::from_slice(&bytes)))
    }

    pub fn is_initialized(&self) -> StorageResult<bool> {
        self.store.contains(ColumnFamily::All, &keys::is_initialized())
    }

    pub fn set_initialized(&self) -> StorageResult<()> {
        self.store.put(ColumnFamily::All, &keys::is_initialized(), &[1])
    }

    /// Access to the raw store, for the trie and handler layers sharing the
    /// same engine.
    pub fn raw(&self) -> Arc<dyn KVStore> {
        Arc::clone(&self.store)
    }
}
