//! Block headers, dependency sets, and blocks.
//!
//! A header on chain `(from, to)` of a `G`-group deployment carries
//! `2G − 1` dependency hashes in canonical order: for each foreign group
//! `g ≠ from` (ascending) the tip of the intra-group chain `(g, g)`, then
//! the tips of the `G` outbound chains `(from, 0..G)`. The `(from, to)`
//! entry is the intra-chain parent.
//!
//! Block wire format: `header ‖ tx_count ‖ tx₀ ‖ … ‖ tx_{n−1}`, where the
//! header is the deps prefix followed by the 32-byte Merkle root, 16-byte
//! timestamp, 32-byte target and 32-byte nonce.

use crate::codec::{self, Codec, CodecError, CodecResult, Reader};
use crate::group::{ChainIndex, GroupIndex};
use crate::hash::Hash;
use crate::numeric::U256;
use crate::transaction::Transaction;

/// The dependency hashes of a header, `2G − 1` entries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockDeps {
    deps: Vec<Hash>,
}

impl BlockDeps {
    /// Number of dependency slots for a `groups`-group deployment.
    pub fn slot_count(groups: u32) -> usize {
        (2 * groups - 1) as usize
    }

    /// Wrap a dependency vector; the length must match the deployment.
    pub fn new(deps: Vec<Hash>, groups: u32) -> Option<Self> {
        (deps.len() == Self::slot_count(groups)).then_some(Self { deps })
    }

    /// Unchecked constructor for decode paths that validate later.
    pub fn from_vec(deps: Vec<Hash>) -> Self {
        Self { deps }
    }

    pub fn len(&self) -> usize {
        self.deps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deps.is_empty()
    }

    pub fn as_slice(&self) -> &[Hash] {
        &self.deps
    }

    /// Slot holding the intra-group tip of foreign group `g`.
    pub fn in_dep_index(chain: ChainIndex, g: GroupIndex) -> usize {
        debug_assert_ne!(g, chain.from);
        if g < chain.from {
            g.value() as usize
        } else {
            (g.value() - 1) as usize
        }
    }

    /// Slot holding the tip of outbound chain `(from, to)`.
    pub fn out_dep_index(groups: u32, to: GroupIndex) -> usize {
        (groups - 1 + to.value()) as usize
    }

    /// The chain a given slot refers to, for a header on `chain`.
    pub fn dep_chain(slot: usize, chain: ChainIndex, groups: u32) -> ChainIndex {
        let intra = (groups - 1) as usize;
        if slot < intra {
            let g = slot as u32;
            let g = if g < chain.from.value() { g } else { g + 1 };
            ChainIndex::new(g, g)
        } else {
            ChainIndex::new(chain.from.value(), (slot - intra) as u32)
        }
    }

    /// The intra-chain parent of a header on `chain`.
    pub fn parent(&self, chain: ChainIndex, groups: u32) -> Hash {
        self.deps[Self::out_dep_index(groups, chain.to)]
    }

    /// The dependency in a given slot.
    pub fn get(&self, slot: usize) -> Hash {
        self.deps[slot]
    }
}

/// A block header. The block hash is the header hash, and the chain a block
/// belongs to is derived from that hash, so mining grinds for both the
/// target and the chain position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockHeader {
    pub deps: BlockDeps,
    pub tx_merkle_root: Hash,
    pub timestamp_ms: u64,
    pub target: U256,
    pub nonce: u64,
}

impl BlockHeader {
    /// Blake2b over the canonical encoding.
    pub fn hash(&self) -> Hash {
        Hash::hash_blake2b(&self.encode())
    }

    /// The chain this header belongs to, derived from its hash.
    pub fn chain_index(&self, groups: u32) -> ChainIndex {
        ChainIndex::from_hash(&self.hash(), groups)
    }

    /// Whether the header hash meets its declared target.
    pub fn pow_valid(&self) -> bool {
        let hash = self.hash();
        U256::from_bytes_be(hash.as_bytes()) < self.target
    }

    /// Intra-chain parent for a header known to live on `chain`.
    pub fn parent(&self, chain: ChainIndex, groups: u32) -> Hash {
        self.deps.parent(chain, groups)
    }
}

impl Codec for BlockHeader {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        codec::put_length(buf, self.deps.len());
        for dep in self.deps.as_slice() {
            dep.encode_to(buf);
        }
        self.tx_merkle_root.encode_to(buf);
        codec::put_u128(buf, u128::from(self.timestamp_ms));
        self.target.encode_to(buf);
        // nonce occupies a full 32-byte word on the wire, low bytes significant
        buf.extend_from_slice(&[0u8; 24]);
        codec::put_u64(buf, self.nonce);
    }

    fn decode(reader: &mut Reader<'_>) -> CodecResult<Self> {
        let dep_count = reader.take_length()?;
        let mut deps = Vec::with_capacity(dep_count.min(64));
        for _ in 0..dep_count {
            deps.push(Hash::decode(reader)?);
        }
        let tx_merkle_root = Hash::decode(reader)?;
        let timestamp_raw = reader.take_u128()?;
        let timestamp_ms = u64::try_from(timestamp_raw)
            .map_err(|_| CodecError::InvalidValue("timestamp out of range".into()))?;
        let target = U256::decode(reader)?;
        let padding = reader.take(24)?;
        if padding.iter().any(|b| *b != 0) {
            return Err(CodecError::InvalidValue("nonce padding not zero".into()));
        }
        let nonce = reader.take_u64()?;
        Ok(Self {
            deps: BlockDeps::from_vec(deps),
            tx_merkle_root,
            timestamp_ms,
            target,
            nonce,
        })
    }
}

/// A block: header plus transaction list. The block hash is the header hash.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    pub fn chain_index(&self, groups: u32) -> ChainIndex {
        self.header.chain_index(groups)
    }
}

impl Codec for Block {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        self.header.encode_to(buf);
        self.transactions.encode_to(buf);
    }

    fn decode(reader: &mut Reader<'_>) -> CodecResult<Self> {
        Ok(Self {
            header: BlockHeader::decode(reader)?,
            transactions: Vec::decode(reader)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::merkle_root;

    fn sample_header(groups: u32, nonce: u64) -> BlockHeader {
        let deps: Vec<Hash> = (0..BlockDeps::slot_count(groups))
            .map(|i| Hash::hash_blake2b(&[i as u8]))
            .collect();
        BlockHeader {
            deps: BlockDeps::new(deps, groups).unwrap(),
            tx_merkle_root: merkle_root(&[]),
            timestamp_ms: 1_700_000_000_000,
            target: U256::max_value(),
            nonce,
        }
    }

    #[test]
    fn test_dep_slot_layout() {
        let groups = 3;
        let chain = ChainIndex::new(1, 2);

        // foreign intra-group slots come first, ascending
        assert_eq!(
            BlockDeps::dep_chain(0, chain, groups),
            ChainIndex::new(0, 0)
        );
        assert_eq!(
            BlockDeps::dep_chain(1, chain, groups),
            ChainIndex::new(2, 2)
        );
        // then the outbound chains of the from-group
        assert_eq!(
            BlockDeps::dep_chain(2, chain, groups),
            ChainIndex::new(1, 0)
        );
        assert_eq!(
            BlockDeps::dep_chain(4, chain, groups),
            ChainIndex::new(1, 2)
        );

        // parent slot maps back to the chain itself
        assert_eq!(BlockDeps::out_dep_index(groups, chain.to), 4);
        assert_eq!(BlockDeps::in_dep_index(chain, GroupIndex::new(0)), 0);
        assert_eq!(BlockDeps::in_dep_index(chain, GroupIndex::new(2)), 1);
    }

    #[test]
    fn test_dep_count() {
        assert_eq!(BlockDeps::slot_count(2), 3);
        assert_eq!(BlockDeps::slot_count(4), 7);
    }

    #[test]
    fn test_header_roundtrip() {
        let header = sample_header(2, 42);
        let encoded = header.encode();
        assert_eq!(BlockHeader::decode_all(&encoded).unwrap(), header);
    }

    #[test]
    fn test_header_hash_covers_nonce() {
        let a = sample_header(2, 1);
        let b = sample_header(2, 2);
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn test_block_roundtrip() {
        let block = Block {
            header: sample_header(2, 7),
            transactions: vec![Transaction::coinbase(50, Hash::hash_blake2b(b"miner"))],
        };
        let encoded = block.encode();
        assert_eq!(Block::decode_all(&encoded).unwrap(), block);
    }

    #[test]
    fn test_pow_trivial_target() {
        // max target accepts everything except the all-ones hash
        let header = sample_header(2, 3);
        assert!(header.pow_valid());
    }
}
