//! Transactions and their wire format.
//!
//! The transaction hash covers only the unsigned part, so adding signatures
//! never changes the id. A coinbase transaction has no inputs.

use crate::codec::{self, Codec, CodecResult, Reader};
use crate::crypto::Signature;
use crate::hash::Hash;

/// Reference to a spendable output.
///
/// Wire order puts the 4-byte short key first so the storage layer can do
/// trie prefix lookups on the leading bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TxOutputPoint {
    /// Prefix key derived from the owning address, used for trie scans.
    pub short_key: u32,
    /// Hash of the transaction that created the output.
    pub tx_hash: Hash,
    /// Position of the output within that transaction.
    pub output_index: u32,
}

impl Codec for TxOutputPoint {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        codec::put_u32(buf, self.short_key);
        self.tx_hash.encode_to(buf);
        codec::put_u32(buf, self.output_index);
    }

    fn decode(reader: &mut Reader<'_>) -> CodecResult<Self> {
        Ok(Self {
            short_key: reader.take_u32()?,
            tx_hash: Hash::decode(reader)?,
            output_index: reader.take_u32()?,
        })
    }
}

/// A created output: an amount locked to an address hash, with optional
/// token balances riding along.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxOutput {
    pub amount: u64,
    /// Blake2b hash of the receiving public key (or contract id).
    pub lock_hash: Hash,
    /// `(token id, amount)` pairs carried by this output.
    pub tokens: Vec<(Hash, u64)>,
}

impl TxOutput {
    pub fn plain(amount: u64, lock_hash: Hash) -> Self {
        Self {
            amount,
            lock_hash,
            tokens: Vec::new(),
        }
    }

    /// Short key for trie prefix lookups: leading 4 bytes of the lock hash.
    pub fn short_key(&self) -> u32 {
        let bytes = self.lock_hash.as_bytes();
        u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

impl Codec for TxOutput {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        codec::put_u64(buf, self.amount);
        self.lock_hash.encode_to(buf);
        codec::put_length(buf, self.tokens.len());
        for (id, amount) in &self.tokens {
            id.encode_to(buf);
            codec::put_u64(buf, *amount);
        }
    }

    fn decode(reader: &mut Reader<'_>) -> CodecResult<Self> {
        let amount = reader.take_u64()?;
        let lock_hash = Hash::decode(reader)?;
        let token_count = reader.take_length()?;
        let mut tokens = Vec::with_capacity(token_count.min(64));
        for _ in 0..token_count {
            let id = Hash::decode(reader)?;
            let amount = reader.take_u64()?;
            tokens.push((id, amount));
        }
        Ok(Self {
            amount,
            lock_hash,
            tokens,
        })
    }
}

/// The signed-over part of a transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnsignedTransaction {
    pub inputs: Vec<TxOutputPoint>,
    pub outputs: Vec<TxOutput>,
}

impl UnsignedTransaction {
    /// The transaction id.
    pub fn hash(&self) -> Hash {
        Hash::hash_blake2b(&self.encode())
    }
}

impl Codec for UnsignedTransaction {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        self.inputs.encode_to(buf);
        self.outputs.encode_to(buf);
    }

    fn decode(reader: &mut Reader<'_>) -> CodecResult<Self> {
        Ok(Self {
            inputs: Vec::decode(reader)?,
            outputs: Vec::decode(reader)?,
        })
    }
}

/// A full transaction: unsigned body plus one signature per distinct signer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub unsigned: UnsignedTransaction,
    pub signatures: Vec<Signature>,
}

impl Transaction {
    /// A coinbase paying `amount` to `lock_hash`; no inputs, no signatures.
    pub fn coinbase(amount: u64, lock_hash: Hash) -> Self {
        Self {
            unsigned: UnsignedTransaction {
                inputs: Vec::new(),
                outputs: vec![TxOutput::plain(amount, lock_hash)],
            },
            signatures: Vec::new(),
        }
    }

    pub fn is_coinbase(&self) -> bool {
        self.unsigned.inputs.is_empty()
    }

    /// The transaction id: hash of the unsigned part only.
    pub fn hash(&self) -> Hash {
        self.unsigned.hash()
    }
}

impl Codec for Transaction {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        self.unsigned.encode_to(buf);
        self.signatures.encode_to(buf);
    }

    fn decode(reader: &mut Reader<'_>) -> CodecResult<Self> {
        Ok(Self {
            unsigned: UnsignedTransaction::decode(reader)?,
            signatures: Vec::decode(reader)?,
        })
    }
}

/// Binary Merkle root over transaction ids; odd layers duplicate the last
/// node, the empty set hashes to zero.
pub fn merkle_root(transactions: &[Transaction]) -> Hash {
    if transactions.is_empty() {
        return Hash::zero();
    }

    let mut nodes: Vec<Hash> = transactions.iter().map(Transaction::hash).collect();
    while nodes.len() > 1 {
        if nodes.len() % 2 != 0 {
            nodes.push(*nodes.last().expect("non-empty"));
        }
        nodes = nodes
            .chunks(2)
            .map(|pair| {
                let mut buf = Vec::with_capacity(64);
                buf.extend_from_slice(pair[0].as_bytes());
                buf.extend_from_slice(pair[1].as_bytes());
                Hash::hash_blake2b(&buf)
            })
            .collect();
    }
    nodes[0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::SecretKey;

    fn sample_tx() -> Transaction {
        let key = SecretKey::from_seed([9u8; 32]);
        let unsigned = UnsignedTransaction {
            inputs: vec![TxOutputPoint {
                short_key: 0xaabbccdd,
                tx_hash: Hash::hash_blake2b(b"prev"),
                output_index: 1,
            }],
            outputs: vec![TxOutput {
                amount: 500,
                lock_hash: key.public_key().address(),
                tokens: vec![(Hash::hash_blake2b(b"token"), 7)],
            }],
        };
        let signature = key.sign(&unsigned.hash());
        Transaction {
            unsigned,
            signatures: vec![signature],
        }
    }

    #[test]
    fn test_tx_hash_ignores_signatures() {
        let tx = sample_tx();
        let mut stripped = tx.clone();
        stripped.signatures.clear();
        assert_eq!(tx.hash(), stripped.hash());
    }

    #[test]
    fn test_output_point_wire_order() {
        let point = TxOutputPoint {
            short_key: 0x01020304,
            tx_hash: Hash::hash_blake2b(b"tx"),
            output_index: 9,
        };
        let encoded = point.encode();
        // short key occupies the first four bytes for prefix lookups
        assert_eq!(&encoded[..4], &[1, 2, 3, 4]);
        assert_eq!(encoded.len(), 4 + 32 + 4);
        assert_eq!(TxOutputPoint::decode_all(&encoded).unwrap(), point);
    }

    #[test]
    fn test_transaction_roundtrip() {
        let tx = sample_tx();
        let encoded = tx.encode();
        assert_eq!(Transaction::decode_all(&encoded).unwrap(), tx);
    }

    #[test]
    fn test_coinbase_has_no_inputs() {
        let coinbase = Transaction::coinbase(100, Hash::hash_blake2b(b"miner"));
        assert!(coinbase.is_coinbase());
        assert!(coinbase.signatures.is_empty());
    }

    #[test]
    fn test_merkle_root() {
        assert_eq!(merkle_root(&[]), Hash::zero());

        let single = vec![sample_tx()];
        assert_eq!(merkle_root(&single), single[0].hash());

        // odd count duplicates the last leaf
        let coinbase = Transaction::coinbase(1, Hash::zero());
        let three = vec![sample_tx(), coinbase.clone(), coinbase];
        let root1 = merkle_root(&three);
        let root2 = merkle_root(&three);
        assert_eq!(root1, root2);
        assert_ne!(root1, Hash::zero());
    }
}
