//! World state: accounts on the sparse Merkle trie.
//!
//! Keys are hashes of asset or contract ids; values are [`AccountState`]
//! records. Mutations are staged in an overlay so a failed transaction can
//! discard its writes without touching the trie; `commit` flushes the
//! overlay and returns the new root, which the block header pins.

use crate::error::StorageResult;
use crate::kv::KVStore;
use crate::smt::SparseMerkleTrie;
use flow_types::{put_bytes, put_u64, Codec, CodecError, CodecResult, Hash, Reader};
use std::collections::HashMap;
use std::sync::Arc;

const TAG_ASSET: u8 = 0;
const TAG_CONTRACT: u8 = 1;

/// One account record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccountState {
    /// A spendable asset output.
    Asset {
        amount: u64,
        tokens: Vec<(Hash, u64)>,
    },
    /// A deployed contract: immutable code plus its current field image,
    /// both kept as canonical encodings so this crate stays independent of
    /// the VM's value types.
    Contract { code: Vec<u8>, fields: Vec<u8> },
}

impl Codec for AccountState {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        match self {
            AccountState::Asset { amount, tokens } => {
                buf.push(TAG_ASSET);
                put_u64(buf, *amount);
                flow_types::put_length(buf, tokens.len());
                for (id, token_amount) in tokens {
                    id.encode_to(buf);
                    put_u64(buf, *token_amount);
                }
            }
            AccountState::Contract { code, fields } => {
                buf.push(TAG_CONTRACT);
                put_bytes(buf, code);
                put_bytes(buf, fields);
            }
        }
    }

    fn decode(reader: &mut Reader<'_>) -> CodecResult<Self> {
        match reader.take_u8()? {
            TAG_ASSET => {
                let amount = reader.take_u64()?;
                let token_count = reader.take_length()?;
                let mut tokens = Vec::with_capacity(token_count.min(64));
                for _ in 0..token_count {
                    let id = Hash::decode(reader)?;
                    let token_amount = reader.take_u64()?;
                    tokens.push((id, token_amount));
                }
                Ok(AccountState::Asset { amount, tokens })
            }
            TAG_CONTRACT => Ok(AccountState::Contract {
                code: reader.take_bytes()?,
                fields: reader.take_bytes()?,
            }),
            other => Err(CodecError::InvalidTag(other)),
        }
    }
}

/// The mutable world state used during block execution.
pub struct WorldState {
    trie: SparseMerkleTrie,
    /// Staged mutations; `None` marks a deletion.
    staged: HashMap<Hash, Option<AccountState>>,
}

impl WorldState {
    /// A fresh world state over an empty trie.
    pub fn empty(store: Arc<dyn KVStore>) -> Self {
        Self {
            trie: SparseMerkleTrie::empty(store),
            staged: HashMap::new(),
        }
    }

    /// Reopen at a known root.
    pub fn at_root(store: Arc<dyn KVStore>, root: Hash) -> Self {
        Self {
            trie: SparseMerkleTrie::at_root(store, root),
            staged: HashMap::new(),
        }
    }

    /// The last committed root; staged writes are not reflected.
    pub fn root(&self) -> Hash {
        self.trie.root()
    }

    /// Read an account, observing staged writes first.
    pub fn get_account(&self, key: &Hash) -> StorageResult<Option<AccountState>> {
        if let Some(staged) = self.staged.get(key) {
            return Ok(staged.clone());
        }
        match self.trie.get(key)? {
            Some(bytes) => Ok(Some(AccountState::decode_all(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Stage an account write.
    pub fn set_account(&mut self, key: Hash, account: AccountState) {
        self.staged.insert(key, Some(account));
    }

    /// Stage an account removal.
    pub fn remove_account(&mut self, key: Hash) {
        self.staged.insert(key, None);
    }

    /// Whether any writes are staged.
    pub fn has_staged(&self) -> bool {
        !self.staged.is_empty()
    }

    /// Discard staged writes, restoring the committed view. Called when a
    /// transaction aborts.
    pub fn discard(&mut self) {
        self.staged.clear();
    }

    /// Flush staged writes into the trie and return the new root. Keys are
    /// applied in sorted order so the resulting node set is deterministic.
    pub fn commit(&mut self) -> StorageResult<Hash> {
        let mut staged: Vec<_> = self.staged.drain().collect();
        staged.sort_by(|(a, _), (b, _)| a.cmp(b));
        for (key, entry) in staged {
            match entry {
                Some(account) => {
                    self.trie.put(&key, account.encode())?;
                }
                None => {
                    self.trie.remove(&key)?;
                }
            }
        }
        Ok(self.trie.root())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn world() -> WorldState {
        WorldState::empty(Arc::new(MemoryStore::new()))
    }

    fn asset(amount: u64) -> AccountState {
        AccountState::Asset {
            amount,
            tokens: Vec::new(),
        }
    }

    #[test]
    fn test_staged_reads() {
        let mut w = world();
        let key = Hash::hash_blake2b(b"acct");

        w.set_account(key, asset(10));
        assert_eq!(w.get_account(&key).unwrap(), Some(asset(10)));
        // root unchanged until commit
        assert_eq!(w.root(), Hash::zero());
    }

    #[test]
    fn test_discard_rolls_back() {
        let mut w = world();
        let key = Hash::hash_blake2b(b"acct");
        w.set_account(key, asset(10));
        let committed = w.commit().unwrap();

        w.set_account(key, asset(99));
        w.discard();

        assert_eq!(w.get_account(&key).unwrap(), Some(asset(10)));
        assert_eq!(w.root(), committed);
    }

    #[test]
    fn test_commit_deterministic() {
        let mut a = world();
        let mut b = world();
        let k1 = Hash::hash_blake2b(b"one");
        let k2 = Hash::hash_blake2b(b"two");

        a.set_account(k1, asset(1));
        a.set_account(k2, asset(2));

        b.set_account(k2, asset(2));
        b.set_account(k1, asset(1));

        assert_eq!(a.commit().unwrap(), b.commit().unwrap());
    }

    #[test]
    fn test_contract_roundtrip() {
        let mut w = world();
        let key = Hash::hash_blake2b(b"contract");
        let record = AccountState::Contract {
            code: vec![1, 2, 3],
            fields: vec![4, 5],
        };
        w.set_account(key, record.clone());
        w.commit().unwrap();
        assert_eq!(w.get_account(&key).unwrap(), Some(record));
    }

    #[test]
    fn test_removal() {
        let mut w = world();
        let key = Hash::hash_blake2b(b"gone");
        w.set_account(key, asset(1));
        w.commit().unwrap();

        w.remove_account(key);
        assert_eq!(w.get_account(&key).unwrap(), None);
        let root = w.commit().unwrap();
        assert_eq!(root, Hash::zero());
    }
}
