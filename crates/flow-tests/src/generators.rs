//! Proptest strategies and deterministic builders for core types.

use flow_types::{
    Block, BlockDeps, BlockHeader, Hash, SecretKey, Signature, Transaction, TxOutput,
    TxOutputPoint, UnsignedTransaction, U256,
};
use proptest::prelude::*;

/// Arbitrary 32-byte digests.
pub fn arb_hash() -> impl Strategy<Value = Hash> {
    prop::array::uniform32(any::<u8>()).prop_map(Hash::new)
}

/// Arbitrary output points.
pub fn arb_output_point() -> impl Strategy<Value = TxOutputPoint> {
    (any::<u32>(), arb_hash(), 0u32..16).prop_map(|(short_key, tx_hash, output_index)| {
        TxOutputPoint {
            short_key,
            tx_hash,
            output_index,
        }
    })
}

/// Arbitrary outputs with up to two tokens.
pub fn arb_output() -> impl Strategy<Value = TxOutput> {
    (
        1u64..=1_000_000_000,
        arb_hash(),
        prop::collection::vec((arb_hash(), 1u64..1_000_000), 0..2),
    )
        .prop_map(|(amount, lock_hash, tokens)| TxOutput {
            amount,
            lock_hash,
            tokens,
        })
}

/// Arbitrary signatures (valid curve points over arbitrary digests).
pub fn arb_signature() -> impl Strategy<Value = Signature> {
    (prop::array::uniform32(any::<u8>()), arb_hash()).prop_map(|(seed, digest)| {
        SecretKey::from_seed(seed).sign(&digest)
    })
}

/// Arbitrary transactions.
pub fn arb_transaction() -> impl Strategy<Value = Transaction> {
    (
        prop::collection::vec(arb_output_point(), 0..4),
        prop::collection::vec(arb_output(), 1..4),
        prop::collection::vec(arb_signature(), 0..3),
    )
        .prop_map(|(inputs, outputs, signatures)| Transaction {
            unsigned: UnsignedTransaction { inputs, outputs },
            signatures,
        })
}

/// Arbitrary headers of a two-group deployment.
pub fn arb_header() -> impl Strategy<Value = BlockHeader> {
    (
        prop::collection::vec(arb_hash(), BlockDeps::slot_count(2)),
        arb_hash(),
        1u64..=u64::MAX / 2,
        any::<u64>(),
        any::<u64>(),
    )
        .prop_map(|(deps, tx_merkle_root, timestamp_ms, target_seed, nonce)| BlockHeader {
            deps: BlockDeps::new(deps, 2).expect("slot count"),
            tx_merkle_root,
            timestamp_ms,
            target: U256::from_u64(target_seed),
            nonce,
        })
}

/// Arbitrary blocks with consistent Merkle roots.
pub fn arb_block() -> impl Strategy<Value = Block> {
    (arb_header(), prop::collection::vec(arb_transaction(), 0..3)).prop_map(
        |(mut header, transactions)| {
            header.tx_merkle_root = flow_types::merkle_root(&transactions);
            Block {
                header,
                transactions,
            }
        },
    )
}
