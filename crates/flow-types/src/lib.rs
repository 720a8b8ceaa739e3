//! # flow-types
//!
//! Core primitives shared by every crate in the flow node:
//!
//! - `Hash`: 32-byte digests (Blake2b-256 for chain data, Keccak-256 for the VM)
//! - ed25519 keys and signatures with deterministic group assignment
//! - The canonical binary codec (compact varint lengths, big-endian integers,
//!   length-prefixed composites)
//! - Bounds-checked 256-bit integers used by the VM and difficulty targets
//! - Group math: `GroupIndex`, `ChainIndex`, `BrokerConfig`
//! - Ledger entities: headers, blocks, deps, transactions

mod block;
mod codec;
mod crypto;
mod group;
mod hash;
mod numeric;
mod transaction;

pub use block::{Block, BlockDeps, BlockHeader};
pub use codec::{
    put_bytes, put_length, put_u128, put_u16, put_u32, put_u64, put_varint, Codec, CodecError,
    CodecResult, Reader,
};
pub use crypto::{public_key_to_group, PublicKey, SecretKey, Signature};
pub use group::{BrokerConfig, ChainIndex, GroupIndex};
pub use hash::{Hash, HASH_LENGTH};
pub use numeric::{I256, U256};
pub use transaction::{
    merkle_root, Transaction, TxOutput, TxOutputPoint, UnsignedTransaction,
};
