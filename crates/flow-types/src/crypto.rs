//! ed25519 keys and signatures.
//!
//! Signatures always cover a 32-byte digest, never raw payloads. Group
//! assignment of a public key is the first byte of its Blake2b digest modulo
//! the group count, so key generation can grind for a target group.

use crate::codec::{Codec, CodecError, CodecResult, Reader};
use crate::group::GroupIndex;
use crate::hash::Hash;
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;

/// A signing key.
pub struct SecretKey(SigningKey);

/// A verification key.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(VerifyingKey);

/// A detached signature over a 32-byte digest.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(ed25519_dalek::Signature);

impl SecretKey {
    /// Generate from the OS entropy source.
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        Self(SigningKey::from_bytes(&seed))
    }

    /// Deterministic key from a 32-byte seed. Used for per-group address
    /// derivation and tests.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self(SigningKey::from_bytes(&seed))
    }

    /// The corresponding public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.verifying_key())
    }

    /// Sign a digest.
    pub fn sign(&self, digest: &Hash) -> Signature {
        Signature(self.0.sign(digest.as_bytes()))
    }
}

impl PublicKey {
    /// Raw 32-byte key.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// Parse from raw bytes; rejects non-canonical points.
    pub fn from_bytes(bytes: &[u8; 32]) -> Option<Self> {
        VerifyingKey::from_bytes(bytes).ok().map(Self)
    }

    /// Verify a signature over a digest.
    pub fn verify(&self, digest: &Hash, signature: &Signature) -> bool {
        self.0.verify(digest.as_bytes(), &signature.0).is_ok()
    }

    /// Blake2b digest of the key, used as an address.
    pub fn address(&self) -> Hash {
        Hash::hash_blake2b(&self.to_bytes())
    }
}

impl Signature {
    /// Raw 64-byte signature.
    pub fn to_bytes(&self) -> [u8; 64] {
        self.0.to_bytes()
    }

    /// Parse from raw bytes.
    pub fn from_bytes(bytes: &[u8; 64]) -> Self {
        Self(ed25519_dalek::Signature::from_bytes(bytes))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({}..)", hex::encode(&self.to_bytes()[..4]))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}..)", hex::encode(&self.to_bytes()[..4]))
    }
}

impl Codec for PublicKey {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.to_bytes());
    }

    fn decode(reader: &mut Reader<'_>) -> CodecResult<Self> {
        let bytes: [u8; 32] = reader.take(32)?.try_into().unwrap();
        Self::from_bytes(&bytes)
            .ok_or_else(|| CodecError::InvalidValue("non-canonical public key".into()))
    }
}

impl Codec for Signature {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.to_bytes());
    }

    fn decode(reader: &mut Reader<'_>) -> CodecResult<Self> {
        let bytes: [u8; 64] = reader.take(64)?.try_into().unwrap();
        Ok(Self::from_bytes(&bytes))
    }
}

/// Deterministic group of a public key: first byte of Blake2b(key) mod G.
pub fn public_key_to_group(key: &PublicKey, groups: u32) -> GroupIndex {
    let digest = Hash::hash_blake2b(&key.to_bytes());
    GroupIndex::new(u32::from(digest.as_bytes()[0]) % groups)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify() {
        let key = SecretKey::from_seed([7u8; 32]);
        let digest = Hash::hash_blake2b(b"payload");
        let sig = key.sign(&digest);

        assert!(key.public_key().verify(&digest, &sig));
        assert!(!key
            .public_key()
            .verify(&Hash::hash_blake2b(b"other"), &sig));
    }

    #[test]
    fn test_group_assignment_stable() {
        let key = SecretKey::from_seed([1u8; 32]).public_key();
        let g1 = public_key_to_group(&key, 4);
        let g2 = public_key_to_group(&key, 4);
        assert_eq!(g1, g2);
        assert!(g1.value() < 4);
    }

    #[test]
    fn test_signature_roundtrip() {
        let key = SecretKey::from_seed([3u8; 32]);
        let sig = key.sign(&Hash::zero());
        let encoded = sig.encode();
        assert_eq!(Signature::decode_all(&encoded).unwrap(), sig);
    }
}
