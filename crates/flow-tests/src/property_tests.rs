//! Property-based tests using proptest.
//!
//! These cover the universal invariants: round-trip serialization for
//! every wire type, deterministic codegen, VM determinism, and weight
//! monotonicity under random mining orders.

use crate::generators::{arb_block, arb_header, arb_output_point, arb_transaction};
use crate::harness::TestFlow;
use flow_types::{Block, BlockHeader, Codec, ChainIndex, Transaction, TxOutputPoint};
use proptest::prelude::*;

proptest! {
    /// deserialize(serialize(x)) == x for output points
    #[test]
    fn output_point_roundtrip(point in arb_output_point()) {
        let encoded = point.encode();
        prop_assert_eq!(TxOutputPoint::decode_all(&encoded).unwrap(), point);
    }

    /// deserialize(serialize(x)) == x for transactions
    #[test]
    fn transaction_roundtrip(tx in arb_transaction()) {
        let encoded = tx.encode();
        prop_assert_eq!(Transaction::decode_all(&encoded).unwrap(), tx);
    }

    /// deserialize(serialize(x)) == x for headers
    #[test]
    fn header_roundtrip(header in arb_header()) {
        let encoded = header.encode();
        prop_assert_eq!(BlockHeader::decode_all(&encoded).unwrap(), header);
    }

    /// deserialize(serialize(x)) == x for blocks
    #[test]
    fn block_roundtrip(block in arb_block()) {
        let encoded = block.encode();
        prop_assert_eq!(Block::decode_all(&encoded).unwrap(), block);
    }

    /// serialization is deterministic
    #[test]
    fn serialization_deterministic(block in arb_block()) {
        prop_assert_eq!(block.encode(), block.encode());
    }

    /// transaction hashes ignore signatures
    #[test]
    fn tx_hash_ignores_signatures(tx in arb_transaction()) {
        let mut stripped = tx.clone();
        stripped.signatures.clear();
        prop_assert_eq!(tx.hash(), stripped.hash());
    }

    /// mining random chains in sequence keeps weights strictly increasing
    /// along every individual chain
    #[test]
    fn weight_monotonic_along_chains(choices in prop::collection::vec(0usize..4, 1..12)) {
        let mut flow = TestFlow::new();
        let mut last_weight = [0u64; 4];
        for (step, choice) in choices.iter().enumerate() {
            let chain = ChainIndex::from_flat_index(*choice, 2);
            let added = flow.mine_and_add(chain, 1_000 * (step as u64 + 1));
            prop_assert!(added.weight > last_weight[*choice]);
            last_weight[*choice] = added.weight;
        }
    }

    /// every accepted block satisfies hash < target
    #[test]
    fn accepted_blocks_meet_pow(choices in prop::collection::vec(0usize..4, 1..8)) {
        let mut flow = TestFlow::new();
        for (step, choice) in choices.iter().enumerate() {
            let chain = ChainIndex::from_flat_index(*choice, 2);
            let block = flow.mine(chain, 1_000 * (step as u64 + 1));
            prop_assert!(block.header.pow_valid());
            flow.flow.add_block(&block).unwrap();
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    /// compiling the same source twice yields byte-identical bytecode,
    /// whatever the (valid) constant folded in
    #[test]
    fn codegen_deterministic(value in 1u64..1_000_000) {
        let source = format!(
            r#"
            TxScript Main {{
                pub fn main() -> U256 {{
                    let base = {value}
                    return base * 2 + 1
                }}
            }}
            "#
        );
        let first = flow_lang::compile_script(&source).unwrap();
        let second = flow_lang::compile_script(&source).unwrap();
        prop_assert_eq!(Codec::encode(&first), Codec::encode(&second));
    }

    /// the VM is a function: same inputs, same outputs and gas
    #[test]
    fn vm_deterministic(a in 0u64..1_000, b in 0u64..1_000) {
        use flow_vm::{ContractObj, Runtime, StatelessContext, Val};
        use flow_types::{Hash, U256};

        let source = r#"
            TxScript Math {
                pub fn main(a: U256, b: U256) -> U256 {
                    return a * b + a
                }
            }
        "#;
        let script = flow_lang::compile_script(source).unwrap();
        let run = || {
            let mut ctx = StatelessContext::new(Hash::zero(), Vec::new());
            Runtime::execute(
                &mut ctx,
                ContractObj::from_script(script.clone()),
                0,
                vec![Val::U256(U256::from_u64(a)), Val::U256(U256::from_u64(b))],
                1_000_000,
            )
            .unwrap()
        };
        let first = run();
        let second = run();
        prop_assert_eq!(&first.returns, &second.returns);
        prop_assert_eq!(first.gas_used, second.gas_used);
        prop_assert_eq!(
            first.returns,
            vec![Val::U256(U256::from_u64(a * b + a))]
        );
    }
}
