//! Key construction.
//!
//! Record kinds within a column family are distinguished by a single byte
//! appended to the key, so that records for one entity share a prefix and
//! range scans over an entity stay contiguous.

use flow_types::{ChainIndex, Hash};

/// Key postfix bytes.
pub const IS_INITIALIZED: u8 = 0;
pub const BLOCK_STATE: u8 = 1;
pub const TRIE_HASH: u8 = 2;
pub const HEIGHT: u8 = 3;
pub const CHAIN_STATE: u8 = 4;
pub const DB_VERSION: u8 = 5;
pub const BOOTSTRAP_INFO: u8 = 6;

/// Key for the raw body of a block or header: the bare hash.
pub fn entity(hash: &Hash) -> Vec<u8> {
    hash.as_bytes().to_vec()
}

/// Key for the state record (height, weight, chain) of a block.
pub fn block_state(hash: &Hash) -> Vec<u8> {
    postfixed(hash.as_bytes(), BLOCK_STATE)
}

/// Key for the world-state root pinned by a block.
pub fn trie_hash(hash: &Hash) -> Vec<u8> {
    postfixed(hash.as_bytes(), TRIE_HASH)
}

/// Key for the hash list at a height of one chain.
pub fn height(chain: ChainIndex, groups: u32, height: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(4 + 8 + 1);
    key.extend_from_slice(&(chain.flat_index(groups) as u32).to_be_bytes());
    key.extend_from_slice(&height.to_be_bytes());
    key.push(HEIGHT);
    key
}

/// Key for the chain-state cursor (current tip and height) of one chain.
pub fn chain_state(chain: ChainIndex, groups: u32) -> Vec<u8> {
    let mut key = Vec::with_capacity(4 + 1);
    key.extend_from_slice(&(chain.flat_index(groups) as u32).to_be_bytes());
    key.push(CHAIN_STATE);
    key
}

/// Key for the node-initialized marker.
pub fn is_initialized() -> Vec<u8> {
    vec![IS_INITIALIZED]
}

/// Key for the schema version record.
pub fn db_version() -> Vec<u8> {
    vec![DB_VERSION]
}

/// Key for bootstrap metadata.
pub fn bootstrap_info() -> Vec<u8> {
    vec![BOOTSTRAP_INFO]
}

fn postfixed(prefix: &[u8], postfix: u8) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + 1);
    key.extend_from_slice(prefix);
    key.push(postfix);
    key
}
