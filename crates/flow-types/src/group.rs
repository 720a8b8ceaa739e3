//! Group math: group indices, the chain grid, broker ranges.

use crate::codec::{Codec, CodecResult, Reader};
use crate::hash::Hash;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a group, in `[0, G)`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupIndex(u32);

impl GroupIndex {
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for GroupIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for GroupIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GroupIndex({})", self.0)
    }
}

/// Identifies one of the `G²` chains of the ledger grid.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChainIndex {
    pub from: GroupIndex,
    pub to: GroupIndex,
}

impl ChainIndex {
    pub const fn new(from: u32, to: u32) -> Self {
        Self {
            from: GroupIndex::new(from),
            to: GroupIndex::new(to),
        }
    }

    /// Canonical row-major position, `from · G + to`.
    pub fn flat_index(&self, groups: u32) -> usize {
        (self.from.value() * groups + self.to.value()) as usize
    }

    /// Inverse of [`flat_index`](Self::flat_index).
    pub fn from_flat_index(index: usize, groups: u32) -> Self {
        let index = index as u32;
        Self::new(index / groups, index % groups)
    }

    /// The chain a block hash belongs to: the trailing two bytes of the
    /// hash, big-endian, modulo `G²`. Mining must therefore grind for both
    /// the target and the chain position.
    pub fn from_hash(hash: &Hash, groups: u32) -> Self {
        let bytes = hash.as_bytes();
        let tail = u32::from(bytes[30]) << 8 | u32::from(bytes[31]);
        Self::from_flat_index((tail % (groups * groups)) as usize, groups)
    }

    /// Whether this is an intra-group chain `(g, g)`.
    pub fn is_intra_group(&self) -> bool {
        self.from == self.to
    }

    /// Every chain of the grid in canonical order.
    pub fn all(groups: u32) -> impl Iterator<Item = ChainIndex> {
        (0..groups).flat_map(move |from| (0..groups).map(move |to| ChainIndex::new(from, to)))
    }
}

impl fmt::Display for ChainIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.from, self.to)
    }
}

impl fmt::Debug for ChainIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChainIndex({}, {})", self.from, self.to)
    }
}

impl Codec for ChainIndex {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        self.from.value().encode_to(buf);
        self.to.value().encode_to(buf);
    }

    fn decode(reader: &mut Reader<'_>) -> CodecResult<Self> {
        let from = u32::decode(reader)?;
        let to = u32::decode(reader)?;
        Ok(Self::new(from, to))
    }
}

/// A broker's slice of the group space: the half-open range
/// `[broker_from, broker_until)` of a deployment with `groups` groups.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerConfig {
    pub groups: u32,
    pub broker_from: u32,
    pub broker_until: u32,
}

impl BrokerConfig {
    /// A single broker hosting every group.
    pub fn single(groups: u32) -> Self {
        Self {
            groups,
            broker_from: 0,
            broker_until: groups,
        }
    }

    /// Whether this broker owns `group`.
    pub fn contains_group(&self, group: GroupIndex) -> bool {
        (self.broker_from..self.broker_until).contains(&group.value())
    }

    /// Whether this broker stores full blocks for `chain_index`. Chains it
    /// does not relate to are stored header-only.
    pub fn relates_to(&self, chain_index: ChainIndex) -> bool {
        self.contains_group(chain_index.from) || self.contains_group(chain_index.to)
    }

    /// Groups owned by this broker.
    pub fn group_range(&self) -> impl Iterator<Item = GroupIndex> {
        (self.broker_from..self.broker_until).map(GroupIndex::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_index_roundtrip() {
        let groups = 3;
        for (position, chain) in ChainIndex::all(groups).enumerate() {
            assert_eq!(chain.flat_index(groups), position);
            assert_eq!(ChainIndex::from_flat_index(position, groups), chain);
        }
    }

    #[test]
    fn test_chain_from_hash_in_range() {
        let groups = 4;
        for seed in 0u8..32 {
            let hash = Hash::hash_blake2b(&[seed]);
            let chain = ChainIndex::from_hash(&hash, groups);
            assert!(chain.from.value() < groups);
            assert!(chain.to.value() < groups);
        }
    }

    #[test]
    fn test_relates_to() {
        let broker = BrokerConfig {
            groups: 4,
            broker_from: 1,
            broker_until: 2,
        };

        assert!(broker.relates_to(ChainIndex::new(1, 3)));
        assert!(broker.relates_to(ChainIndex::new(0, 1)));
        assert!(broker.relates_to(ChainIndex::new(1, 1)));
        assert!(!broker.relates_to(ChainIndex::new(0, 3)));
        assert!(!broker.relates_to(ChainIndex::new(2, 2)));
    }

    #[test]
    fn test_single_broker_relates_to_everything() {
        let broker = BrokerConfig::single(3);
        for chain in ChainIndex::all(3) {
            assert!(broker.relates_to(chain));
        }
    }
}
