//! End-to-end compiler tests: compile source, execute on the VM, check
//! results and gas behavior.

use flow_lang::{compile_contract, compile_script};
use flow_storage::{MemoryStore, WorldState};
use flow_types::{Hash, SecretKey, U256};
use flow_vm::{
    ContractObj, ExecutionError, Runtime, StatefulContext, StatelessContext, Val,
};
use std::sync::Arc;

fn u256(value: u64) -> Val {
    Val::U256(U256::from_u64(value))
}

#[test]
fn test_contract_arithmetic_with_field() {
    // square(x) + square(a) with field x = 1 and argument a = 2 is 5
    let source = r#"
        TxContract Foo(x: U256) {
            pub fn add(a: U256) -> U256 { return square(x) + square(a) }
            fn square(n) -> U256 { return n * n }
        }
    "#;
    let contract = compile_contract(source).unwrap();

    let obj = ContractObj::from_contract(
        Hash::hash_blake2b(b"foo"),
        Arc::new(contract),
        vec![u256(1)],
    );
    let mut ctx = StatelessContext::new(Hash::hash_blake2b(b"tx"), Vec::new());
    let result = Runtime::execute(&mut ctx, obj, 0, vec![u256(2)], 1_000_000).unwrap();

    assert_eq!(result.returns, vec![u256(5)]);
}

#[test]
fn test_fibonacci_recursion_and_stable_gas() {
    let source = r#"
        TxContract Fib(unused: U256) {
            pub fn fib(n: U256) -> U256 {
                if n < 2 { return n }
                return fib(n - 1) + fib(n - 2)
            }
        }
    "#;
    let contract = compile_contract(source).unwrap();

    let run = || {
        let obj = ContractObj::from_contract(
            Hash::hash_blake2b(b"fib"),
            Arc::new(contract.clone()),
            vec![u256(0)],
        );
        let mut ctx = StatelessContext::new(Hash::hash_blake2b(b"tx"), Vec::new());
        Runtime::execute(&mut ctx, obj, 0, vec![u256(10)], 10_000_000).unwrap()
    };

    let first = run();
    let second = run();
    assert_eq!(first.returns, vec![u256(55)]);
    assert_eq!(second.returns, vec![u256(55)]);
    assert_eq!(first.gas_used, second.gas_used);
}

#[test]
fn test_asset_script_signature_check() {
    // hash the pubkey (binding it into the script) then verify the
    // transaction signature against it
    let source = r#"
        AssetScript Unlock {
            pub fn unlock(pk: ByteVec) -> ByteVec {
                let digest = blake2b!(pk)
                verifyTxSignature!(pk)
                return digest
            }
        }
    "#;
    let script = compile_script(source).unwrap();

    let key = SecretKey::from_seed([42u8; 32]);
    let tx_hash = Hash::hash_blake2b(b"spending-tx");
    let pk_bytes = key.public_key().to_bytes().to_vec();

    // valid pre-pushed signature succeeds
    let mut ctx = StatelessContext::new(tx_hash, vec![key.sign(&tx_hash)]);
    let result = Runtime::execute(
        &mut ctx,
        ContractObj::from_script(script.clone()),
        0,
        vec![Val::ByteVec(pk_bytes.clone())],
        1_000_000,
    )
    .unwrap();
    assert_eq!(
        result.returns,
        vec![Val::ByteVec(
            Hash::hash_blake2b(&pk_bytes).as_bytes().to_vec()
        )]
    );

    // an empty signature stack underflows
    let mut ctx = StatelessContext::new(tx_hash, Vec::new());
    let err = Runtime::execute(
        &mut ctx,
        ContractObj::from_script(script),
        0,
        vec![Val::ByteVec(pk_bytes)],
        1_000_000,
    )
    .unwrap_err();
    assert_eq!(err, ExecutionError::StackUnderflow);
}

#[test]
fn test_while_loop() {
    let source = r#"
        TxScript Sum {
            pub fn main(n: U256) -> U256 {
                let total = 0
                let i = 1
                while i <= n {
                    total = total + i
                    i = i + 1
                }
                return total
            }
        }
    "#;
    let script = compile_script(source).unwrap();
    let mut ctx = StatelessContext::new(Hash::zero(), Vec::new());
    let result = Runtime::execute(
        &mut ctx,
        ContractObj::from_script(script),
        0,
        vec![u256(10)],
        1_000_000,
    )
    .unwrap();
    assert_eq!(result.returns, vec![u256(55)]);
}

#[test]
fn test_nested_array_access_and_copy() {
    let source = r#"
        TxScript Arrays {
            pub fn main() -> U256 {
                let grid = [[1, 2], [3, 4]]
                let copy = [[0; 2]; 2]
                copy = grid
                copy[0][1] = 9
                return copy[0][1] + copy[1][0] + grid[0][1]
            }
        }
    "#;
    let script = compile_script(source).unwrap();
    let mut ctx = StatelessContext::new(Hash::zero(), Vec::new());
    let result = Runtime::execute(
        &mut ctx,
        ContractObj::from_script(script),
        0,
        vec![],
        1_000_000,
    )
    .unwrap();
    // 9 + 3 + 2: the copy is by value, the source is untouched
    assert_eq!(result.returns, vec![u256(14)]);
}

#[test]
fn test_stateful_field_persistence() {
    let source = r#"
        TxContract Counter(count: U256) {
            pub fn bump() -> U256 {
                count = count + 1
                return count
            }
        }
    "#;
    let contract = compile_contract(source).unwrap();
    let mut world = WorldState::empty(Arc::new(MemoryStore::new()));
    let address = Hash::hash_blake2b(b"counter");
    flow_vm::deploy_contract(&mut world, address, &contract, vec![u256(0)]).unwrap();

    for expected in 1..=3u64 {
        let mut ctx = StatefulContext::new(
            Hash::hash_blake2b(&expected.to_be_bytes()),
            Vec::new(),
            &mut world,
            None,
        );
        let (loaded, fields) = {
            use flow_vm::Context;
            ctx.load_contract(&address).unwrap()
        };
        let obj = ContractObj::from_contract(address, loaded, fields);
        let result = Runtime::execute(&mut ctx, obj, 0, vec![], 1_000_000).unwrap();
        assert_eq!(result.returns, vec![u256(expected)]);
        world.commit().unwrap();
    }
}

#[test]
fn test_failed_execution_leaves_state_untouched() {
    let source = r#"
        TxContract Counter(count: U256) {
            pub fn overflowing() -> U256 {
                count = count + 1
                return count / 0
            }
        }
    "#;
    let contract = compile_contract(source).unwrap();
    let mut world = WorldState::empty(Arc::new(MemoryStore::new()));
    let address = Hash::hash_blake2b(b"counter");
    flow_vm::deploy_contract(&mut world, address, &contract, vec![u256(7)]).unwrap();
    let root_before = world.commit().unwrap();

    {
        let mut ctx = StatefulContext::new(Hash::zero(), Vec::new(), &mut world, None);
        let (loaded, fields) = {
            use flow_vm::Context;
            ctx.load_contract(&address).unwrap()
        };
        let obj = ContractObj::from_contract(address, loaded, fields);
        let err = Runtime::execute(&mut ctx, obj, 0, vec![], 1_000_000).unwrap_err();
        assert_eq!(err, ExecutionError::ArithmeticError);
    }

    // aborted transaction: staged writes discarded, root unchanged
    world.discard();
    assert_eq!(world.commit().unwrap(), root_before);
}
