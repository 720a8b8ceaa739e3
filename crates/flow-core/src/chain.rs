//! One chain of the grid: a DAG of headers sharing a `ChainIndex`.
//!
//! Forks are allowed; every entry records its intra-chain parent, height
//! and timestamp. The tip set holds the leaves, and the canonical path of
//! the chain descends from its best tip by parent links.

use flow_types::{ChainIndex, Hash};
use std::collections::{HashMap, HashSet};

#[derive(Clone, Debug)]
struct ChainEntry {
    parent: Hash,
    height: u64,
    timestamp_ms: u64,
}

/// In-memory index of one chain.
pub struct Chain {
    index: ChainIndex,
    genesis: Hash,
    entries: HashMap<Hash, ChainEntry>,
    tips: HashSet<Hash>,
}

impl Chain {
    /// A chain holding only its genesis block.
    pub fn new(index: ChainIndex, genesis: Hash, genesis_timestamp_ms: u64) -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            genesis,
            ChainEntry {
                parent: Hash::zero(),
                height: 0,
                timestamp_ms: genesis_timestamp_ms,
            },
        );
        let mut tips = HashSet::new();
        tips.insert(genesis);
        Self {
            index,
            genesis,
            entries,
            tips,
        }
    }

    pub fn index(&self) -> ChainIndex {
        self.index
    }

    pub fn genesis(&self) -> Hash {
        self.genesis
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.entries.contains_key(hash)
    }

    pub fn height_of(&self, hash: &Hash) -> Option<u64> {
        self.entries.get(hash).map(|e| e.height)
    }

    pub fn parent_of(&self, hash: &Hash) -> Option<Hash> {
        self.entries.get(hash).map(|e| e.parent)
    }

    pub fn timestamp_of(&self, hash: &Hash) -> Option<u64> {
        self.entries.get(hash).map(|e| e.timestamp_ms)
    }

    /// Number of non-genesis blocks.
    pub fn block_count(&self) -> usize {
        self.entries.len() - 1
    }

    /// Current tip set.
    pub fn tips(&self) -> impl Iterator<Item = Hash> + '_ {
        self.tips.iter().copied()
    }

    /// Install a header whose parent is already present. The parent stops
    /// being a tip, the new block becomes one.
    pub fn add(&mut self, hash: Hash, parent: Hash, timestamp_ms: u64) -> Option<u64> {
        if self.entries.contains_key(&hash) {
            return self.height_of(&hash);
        }
        let height = self.entries.get(&parent)?.height + 1;
        self.entries.insert(
            hash,
            ChainEntry {
                parent,
                height,
                timestamp_ms,
            },
        );
        self.tips.remove(&parent);
        self.tips.insert(hash);
        Some(height)
    }

    /// Whether `ancestor` lies on the parent path of `descendant`
    /// (inclusive: a block is its own ancestor).
    pub fn is_ancestor(&self, ancestor: &Hash, descendant: &Hash) -> bool {
        let Some(target_height) = self.height_of(ancestor) else {
            return false;
        };
        match self.ancestor_at_height(descendant, target_height) {
            Some(found) => found == *ancestor,
            None => false,
        }
    }

    /// The block at `height` on the parent path of `from`.
    pub fn ancestor_at_height(&self, from: &Hash, height: u64) -> Option<Hash> {
        let mut cursor = *from;
        let mut cursor_height = self.height_of(&cursor)?;
        if height > cursor_height {
            return None;
        }
        while cursor_height > height {
            cursor = self.parent_of(&cursor)?;
            cursor_height -= 1;
        }
        Some(cursor)
    }

    /// Drop dominated stale tips: tips older than `cutoff_ms` survive only
    /// if no other tip reaches at least their height. The best tip is never
    /// pruned, and the tip set never becomes empty.
    pub fn prune_tips(&mut self, cutoff_ms: u64, best_tip: Hash) -> usize {
        let max_height = self
            .tips
            .iter()
            .filter_map(|t| self.height_of(t))
            .max()
            .unwrap_or(0);

        let stale: Vec<Hash> = self
            .tips
            .iter()
            .filter(|tip| {
                **tip != best_tip
                    && self.timestamp_of(tip).is_some_and(|ts| ts < cutoff_ms)
                    && self.height_of(tip).is_some_and(|h| h < max_height)
            })
            .copied()
            .collect();

        for tip in &stale {
            self.tips.remove(tip);
        }
        stale.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(label: u8) -> Hash {
        Hash::hash_blake2b(&[label])
    }

    fn chain() -> Chain {
        Chain::new(ChainIndex::new(0, 0), hash(0), 0)
    }

    #[test]
    fn test_linear_growth() {
        let mut c = chain();
        assert_eq!(c.add(hash(1), hash(0), 10), Some(1));
        assert_eq!(c.add(hash(2), hash(1), 20), Some(2));

        assert_eq!(c.height_of(&hash(2)), Some(2));
        assert_eq!(c.parent_of(&hash(2)), Some(hash(1)));
        assert_eq!(c.tips().collect::<Vec<_>>(), vec![hash(2)]);
    }

    #[test]
    fn test_missing_parent_rejected() {
        let mut c = chain();
        assert_eq!(c.add(hash(2), hash(1), 10), None);
    }

    #[test]
    fn test_forks_keep_both_tips() {
        let mut c = chain();
        c.add(hash(1), hash(0), 10);
        c.add(hash(2), hash(0), 10);

        let mut tips: Vec<Hash> = c.tips().collect();
        tips.sort();
        let mut expected = vec![hash(1), hash(2)];
        expected.sort();
        assert_eq!(tips, expected);
    }

    #[test]
    fn test_ancestry() {
        let mut c = chain();
        c.add(hash(1), hash(0), 10);
        c.add(hash(2), hash(1), 20);
        c.add(hash(3), hash(0), 10); // fork

        assert!(c.is_ancestor(&hash(0), &hash(2)));
        assert!(c.is_ancestor(&hash(1), &hash(2)));
        assert!(c.is_ancestor(&hash(2), &hash(2)));
        assert!(!c.is_ancestor(&hash(3), &hash(2)));
        assert!(!c.is_ancestor(&hash(2), &hash(1)));

        assert_eq!(c.ancestor_at_height(&hash(2), 1), Some(hash(1)));
        assert_eq!(c.ancestor_at_height(&hash(2), 0), Some(hash(0)));
        assert_eq!(c.ancestor_at_height(&hash(1), 2), None);
    }

    #[test]
    fn test_prune_dominated_stale_tips() {
        let mut c = chain();
        c.add(hash(1), hash(0), 10);
        c.add(hash(2), hash(1), 20);
        c.add(hash(3), hash(0), 5); // stale dominated fork

        let pruned = c.prune_tips(15, hash(2));
        assert_eq!(pruned, 1);
        assert_eq!(c.tips().collect::<Vec<_>>(), vec![hash(2)]);
        // pruned from the tip set, not from the chain
        assert!(c.contains(&hash(3)));
    }
}
