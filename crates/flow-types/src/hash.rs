//! 32-byte digests.
//!
//! Chain data (blocks, transactions, trie nodes) is hashed with Blake2b-256;
//! the VM additionally exposes Keccak-256 to contracts. Equality and ordering
//! are plain byte comparisons.

use crate::codec::{Codec, CodecError, CodecResult, Reader};
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use sha3::Keccak256;
use std::fmt;

/// Length of every digest in bytes.
pub const HASH_LENGTH: usize = 32;

/// A 32-byte digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash([u8; HASH_LENGTH]);

impl Hash {
    /// Wrap raw digest bytes.
    pub const fn new(bytes: [u8; HASH_LENGTH]) -> Self {
        Self(bytes)
    }

    /// The all-zero digest, used as the empty-trie root and genesis parent.
    pub const fn zero() -> Self {
        Self([0u8; HASH_LENGTH])
    }

    /// Build from a slice; fails unless exactly 32 bytes.
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        let bytes: [u8; HASH_LENGTH] = slice.try_into().ok()?;
        Some(Self(bytes))
    }

    /// Blake2b-256 of arbitrary bytes.
    pub fn hash_blake2b(data: &[u8]) -> Self {
        let mut hasher = Blake2b::<U32>::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// Keccak-256 of arbitrary bytes.
    pub fn hash_keccak256(data: &[u8]) -> Self {
        let mut hasher = Keccak256::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; HASH_LENGTH] {
        &self.0
    }

    /// Whether this is the all-zero digest.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; HASH_LENGTH]
    }

    /// Number of leading zero bits, used by the difficulty floor check.
    pub fn leading_zero_bits(&self) -> u32 {
        let mut count = 0;
        for byte in self.0 {
            if byte == 0 {
                count += 8;
            } else {
                count += byte.leading_zeros();
                break;
            }
        }
        count
    }

    /// Bit at `index` (0 = most significant), used by the trie key walk.
    pub fn bit(&self, index: usize) -> bool {
        let byte = self.0[index / 8];
        (byte >> (7 - index % 8)) & 1 == 1
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({}..)", hex::encode(&self.0[..4]))
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Codec for Hash {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.0);
    }

    fn decode(reader: &mut Reader<'_>) -> CodecResult<Self> {
        let bytes = reader.take(HASH_LENGTH)?;
        Self::from_slice(bytes).ok_or(CodecError::UnexpectedEof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blake2b_deterministic() {
        let a = Hash::hash_blake2b(b"flow");
        let b = Hash::hash_blake2b(b"flow");
        assert_eq!(a, b);
        assert_ne!(a, Hash::hash_blake2b(b"flo"));
    }

    #[test]
    fn test_keccak_differs_from_blake2b() {
        assert_ne!(Hash::hash_keccak256(b"flow"), Hash::hash_blake2b(b"flow"));
    }

    #[test]
    fn test_leading_zero_bits() {
        assert_eq!(Hash::zero().leading_zero_bits(), 256);

        let mut bytes = [0u8; 32];
        bytes[0] = 0b0001_0000;
        assert_eq!(Hash::new(bytes).leading_zero_bits(), 3);

        bytes[0] = 0xff;
        assert_eq!(Hash::new(bytes).leading_zero_bits(), 0);
    }

    #[test]
    fn test_bit_indexing() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0b1000_0000;
        bytes[1] = 0b0000_0001;
        let h = Hash::new(bytes);

        assert!(h.bit(0));
        assert!(!h.bit(1));
        assert!(h.bit(15));
    }

    #[test]
    fn test_codec_roundtrip() {
        let h = Hash::hash_blake2b(b"roundtrip");
        let encoded = h.encode();
        assert_eq!(Hash::decode_all(&encoded).unwrap(), h);
    }
}
