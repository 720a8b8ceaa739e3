//! Deterministic genesis blocks.
//!
//! Every chain of the grid starts from its own genesis block: empty
//! transaction list, zero deps, timestamp zero, and the chain's flat index
//! as nonce so the `G²` hashes are distinct. Genesis blocks are installed
//! directly, never mined, and carry weight zero.

use flow_types::{Block, BlockDeps, BlockHeader, ChainIndex, Hash, U256};

/// The genesis block of `chain` in a `groups`-group deployment.
pub fn genesis_block(chain: ChainIndex, groups: u32) -> Block {
    let deps = vec![Hash::zero(); BlockDeps::slot_count(groups)];
    Block {
        header: BlockHeader {
            deps: BlockDeps::new(deps, groups).expect("slot count matches"),
            tx_merkle_root: Hash::zero(),
            timestamp_ms: 0,
            target: U256::max_value(),
            nonce: chain.flat_index(groups) as u64,
        },
        transactions: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genesis_distinct_per_chain() {
        let a = genesis_block(ChainIndex::new(0, 0), 2).hash();
        let b = genesis_block(ChainIndex::new(0, 1), 2).hash();
        assert_ne!(a, b);
    }

    #[test]
    fn test_genesis_deterministic() {
        let a = genesis_block(ChainIndex::new(1, 1), 2).hash();
        let b = genesis_block(ChainIndex::new(1, 1), 2).hash();
        assert_eq!(a, b);
    }
}
