//! Content-addressed sparse Merkle trie.
//!
//! A binary trie over the 256 bits of the key digest with path compression:
//! a leaf may sit at any depth, and the all-zero hash denotes an empty
//! subtree. Nodes are immutable and stored by the hash of their encoding in
//! the `Trie` column family, so every historical root stays readable until
//! its nodes are pruned.
//!
//! Canonical form: a branch never has an empty subtree on both sides, and a
//! branch whose only descendant is a single leaf is collapsed to that leaf.
//! Two tries holding the same entries therefore always share one root.

use crate::error::{StorageError, StorageResult};
use crate::kv::{ColumnFamily, KVStore};
use flow_types::{Codec, CodecError, CodecResult, Hash, Reader};
use std::sync::Arc;

const TAG_LEAF: u8 = 0;
const TAG_BRANCH: u8 = 1;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Node {
    Leaf { key: Hash, value: Vec<u8> },
    Branch { left: Hash, right: Hash },
}

impl Node {
    fn hash(&self) -> Hash {
        Hash::hash_blake2b(&self.encode())
    }
}

impl Codec for Node {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        match self {
            Node::Leaf { key, value } => {
                buf.push(TAG_LEAF);
                key.encode_to(buf);
                flow_types::put_bytes(buf, value);
            }
            Node::Branch { left, right } => {
                buf.push(TAG_BRANCH);
                left.encode_to(buf);
                right.encode_to(buf);
            }
        }
    }

    fn decode(reader: &mut Reader<'_>) -> CodecResult<Self> {
        match reader.take_u8()? {
            TAG_LEAF => Ok(Node::Leaf {
                key: Hash::decode(reader)?,
                value: reader.take_bytes()?,
            }),
            TAG_BRANCH => Ok(Node::Branch {
                left: Hash::decode(reader)?,
                right: Hash::decode(reader)?,
            }),
            other => Err(CodecError::InvalidTag(other)),
        }
    }
}

/// The trie: a root hash plus the shared node store.
#[derive(Clone)]
pub struct SparseMerkleTrie {
    store: Arc<dyn KVStore>,
    root: Hash,
}

impl SparseMerkleTrie {
    /// An empty trie over `store`; the empty root is the zero hash.
    pub fn empty(store: Arc<dyn KVStore>) -> Self {
        Self {
            store,
            root: Hash::zero(),
        }
    }

    /// Reopen a trie at a known root.
    pub fn at_root(store: Arc<dyn KVStore>, root: Hash) -> Self {
        Self { store, root }
    }

    /// The current root.
    pub fn root(&self) -> Hash {
        self.root
    }

    /// Look up the value stored under `key`.
    pub fn get(&self, key: &Hash) -> StorageResult<Option<Vec<u8>>> {
        let mut cursor = self.root;
        let mut depth = 0usize;
        loop {
            if cursor.is_zero() {
                return Ok(None);
            }
            match self.load(&cursor)? {
                Node::Leaf { key: leaf_key, value } => {
                    return Ok((leaf_key == *key).then_some(value));
                }
                Node::Branch { left, right } => {
                    cursor = if key.bit(depth) { right } else { left };
                    depth += 1;
                }
            }
        }
    }

    /// Insert or replace the value under `key`, producing a new root.
    pub fn put(&mut self, key: &Hash, value: Vec<u8>) -> StorageResult<Hash> {
        let root = self.root;
        self.root = self.insert_at(&root, 0, key, value)?;
        Ok(self.root)
    }

    /// Remove the entry under `key` if present, producing a new root.
    pub fn remove(&mut self, key: &Hash) -> StorageResult<Hash> {
        let root = self.root;
        self.root = self.remove_at(&root, 0, key)?;
        Ok(self.root)
    }

    fn load(&self, hash: &Hash) -> StorageResult<Node> {
        let bytes = self
            .store
            .get(ColumnFamily::Trie, hash.as_bytes())?
            .ok_or_else(|| StorageError::Corruption(format!("missing trie node {hash}")))?;
        Ok(Node::decode_all(&bytes)?)
    }

    fn persist(&self, node: &Node) -> StorageResult<Hash> {
        let hash = node.hash();
        self.store
            .put(ColumnFamily::Trie, hash.as_bytes(), &node.encode())?;
        Ok(hash)
    }

    fn insert_at(
        &self,
        subtree: &Hash,
        depth: usize,
        key: &Hash,
        value: Vec<u8>,
    ) -> StorageResult<Hash> {
        if subtree.is_zero() {
            return self.persist(&Node::Leaf { key: *key, value });
        }

        match self.load(subtree)? {
            Node::Leaf {
                key: leaf_key,
                value: leaf_value,
            } => {
                if leaf_key == *key {
                    return self.persist(&Node::Leaf { key: *key, value });
                }
                // Split: build branches from the first diverging bit back up.
                let mut diverge = depth;
                while key.bit(diverge) == leaf_key.bit(diverge) {
                    diverge += 1;
                }
                let new_leaf = self.persist(&Node::Leaf { key: *key, value })?;
                let old_leaf = self.persist(&Node::Leaf {
                    key: leaf_key,
                    value: leaf_value,
                })?;

                let mut cursor = if key.bit(diverge) {
                    self.persist(&Node::Branch {
                        left: old_leaf,
                        right: new_leaf,
                    })?
                } else {
                    self.persist(&Node::Branch {
                        left: new_leaf,
                        right: old_leaf,
                    })?
                };
                for level in (depth..diverge).rev() {
                    cursor = if key.bit(level) {
                        self.persist(&Node::Branch {
                            left: Hash::zero(),
                            right: cursor,
                        })?
                    } else {
                        self.persist(&Node::Branch {
                            left: cursor,
                            right: Hash::zero(),
                        })?
                    };
                }
                Ok(cursor)
            }
            Node::Branch { left, right } => {
                let node = if key.bit(depth) {
                    Node::Branch {
                        left,
                        right: self.insert_at(&right, depth + 1, key, value)?,
                    }
                } else {
                    Node::Branch {
                        left: self.insert_at(&left, depth + 1, key, value)?,
                        right,
                    }
                };
                self.persist(&node)
            }
        }
    }

    fn remove_at(&self, subtree: &Hash, depth: usize, key: &Hash) -> StorageResult<Hash> {
        if subtree.is_zero() {
            return Ok(Hash::zero());
        }
        match self.load(subtree)? {
            Node::Leaf { key: leaf_key, .. } => {
                if leaf_key == *key {
                    Ok(Hash::zero())
                } else {
                    Ok(*subtree)
                }
            }
            Node::Branch { left, right } => {
                let (left, right) = if key.bit(depth) {
                    (left, self.remove_at(&right, depth + 1, key)?)
                } else {
                    (self.remove_at(&left, depth + 1, key)?, right)
                };

                // Restore canonical form: collapse a branch whose single
                // remaining descendant is a leaf.
                if left.is_zero() && right.is_zero() {
                    return Ok(Hash::zero());
                }
                if left.is_zero() {
                    if let Node::Leaf { .. } = self.load(&right)? {
                        return Ok(right);
                    }
                }
                if right.is_zero() {
                    if let Node::Leaf { .. } = self.load(&left)? {
                        return Ok(left);
                    }
                }
                self.persist(&Node::Branch { left, right })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn trie() -> SparseMerkleTrie {
        SparseMerkleTrie::empty(Arc::new(MemoryStore::new()))
    }

    fn key(label: &str) -> Hash {
        Hash::hash_blake2b(label.as_bytes())
    }

    #[test]
    fn test_empty_root_is_zero() {
        assert_eq!(trie().root(), Hash::zero());
    }

    #[test]
    fn test_put_get() {
        let mut t = trie();
        t.put(&key("a"), b"1".to_vec()).unwrap();
        t.put(&key("b"), b"2".to_vec()).unwrap();

        assert_eq!(t.get(&key("a")).unwrap(), Some(b"1".to_vec()));
        assert_eq!(t.get(&key("b")).unwrap(), Some(b"2".to_vec()));
        assert_eq!(t.get(&key("c")).unwrap(), None);
    }

    #[test]
    fn test_replace_changes_root() {
        let mut t = trie();
        let r1 = t.put(&key("a"), b"1".to_vec()).unwrap();
        let r2 = t.put(&key("a"), b"2".to_vec()).unwrap();
        assert_ne!(r1, r2);
        assert_eq!(t.get(&key("a")).unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn test_insertion_order_independent() {
        let entries = ["a", "b", "c", "d", "e"];

        let mut forward = trie();
        for label in entries {
            forward.put(&key(label), label.as_bytes().to_vec()).unwrap();
        }

        let mut backward = trie();
        for label in entries.iter().rev() {
            backward.put(&key(label), label.as_bytes().to_vec()).unwrap();
        }

        assert_eq!(forward.root(), backward.root());
    }

    #[test]
    fn test_remove_restores_previous_root() {
        let mut t = trie();
        t.put(&key("a"), b"1".to_vec()).unwrap();
        let root_one = t.root();

        t.put(&key("b"), b"2".to_vec()).unwrap();
        t.remove(&key("b")).unwrap();

        assert_eq!(t.root(), root_one);
        assert_eq!(t.get(&key("b")).unwrap(), None);
    }

    #[test]
    fn test_remove_all_is_empty() {
        let mut t = trie();
        t.put(&key("a"), b"1".to_vec()).unwrap();
        t.put(&key("b"), b"2".to_vec()).unwrap();
        t.remove(&key("a")).unwrap();
        t.remove(&key("b")).unwrap();
        assert_eq!(t.root(), Hash::zero());
    }

    #[test]
    fn test_old_roots_stay_readable() {
        let store: Arc<dyn KVStore> = Arc::new(MemoryStore::new());
        let mut t = SparseMerkleTrie::empty(Arc::clone(&store));
        let old_root = t.put(&key("a"), b"1".to_vec()).unwrap();
        t.put(&key("a"), b"2".to_vec()).unwrap();

        let old = SparseMerkleTrie::at_root(store, old_root);
        assert_eq!(old.get(&key("a")).unwrap(), Some(b"1".to_vec()));
    }
}
