//! Execution contexts.
//!
//! The stateless context carries only the transaction hash and its
//! signature stack; asset scripts run against it. The stateful context
//! adds world state (contract loading, field persistence, on-chain asset
//! pulls) and the entry balance for payable calls. Stateful operations in
//! a stateless context fail rather than silently no-op.

use crate::balance::BalanceState;
use crate::contract::{contract_key, Contract};
use crate::error::{ExeResult, ExecutionError};
use crate::val::Val;
use flow_storage::{AccountState, WorldState};
use flow_types::{Codec, Hash, Signature, U256};
use std::sync::Arc;

/// What the execution loop needs from its surroundings.
pub trait Context {
    /// Hash of the executing transaction.
    fn tx_hash(&self) -> Hash;

    /// Pop the next pre-pushed signature; empty stack is a stack underflow.
    fn pop_signature(&mut self) -> ExeResult<Signature>;

    /// Event hook; the core layer only records.
    fn log(&mut self, values: Vec<Val>);

    /// Take the balance provided for the entry call, if any.
    fn take_entry_balance(&mut self) -> Option<BalanceState> {
        None
    }

    /// Load a contract and its current fields.
    fn load_contract(&mut self, _address: &Hash) -> ExeResult<(Arc<Contract>, Vec<Val>)> {
        Err(ExecutionError::ExpectedStatefulContext)
    }

    /// Move the contract's on-chain asset into the VM, if it holds one.
    fn pull_contract_asset(&mut self, _address: &Hash) -> ExeResult<Option<U256>> {
        Err(ExecutionError::ExpectedStatefulContext)
    }

    /// Persist a contract's mutated fields.
    fn save_contract_fields(&mut self, _address: &Hash, _fields: &[Val]) -> ExeResult<()> {
        Err(ExecutionError::ExpectedStatefulContext)
    }
}

/// Context for asset scripts: signatures and the transaction id only.
pub struct StatelessContext {
    tx_hash: Hash,
    signatures: Vec<Signature>,
    pub logs: Vec<Vec<Val>>,
}

impl StatelessContext {
    /// `signatures` in push order; the VM pops from the end.
    pub fn new(tx_hash: Hash, signatures: Vec<Signature>) -> Self {
        Self {
            tx_hash,
            signatures,
            logs: Vec::new(),
        }
    }
}

impl Context for StatelessContext {
    fn tx_hash(&self) -> Hash {
        self.tx_hash
    }

    fn pop_signature(&mut self) -> ExeResult<Signature> {
        self.signatures.pop().ok_or(ExecutionError::StackUnderflow)
    }

    fn log(&mut self, values: Vec<Val>) {
        self.logs.push(values);
    }
}

/// Context for scripts and contract calls that touch world state.
pub struct StatefulContext<'a> {
    tx_hash: Hash,
    signatures: Vec<Signature>,
    world: &'a mut WorldState,
    entry_balance: Option<BalanceState>,
    pub logs: Vec<Vec<Val>>,
}

impl<'a> StatefulContext<'a> {
    pub fn new(
        tx_hash: Hash,
        signatures: Vec<Signature>,
        world: &'a mut WorldState,
        entry_balance: Option<BalanceState>,
    ) -> Self {
        Self {
            tx_hash,
            signatures,
            world,
            entry_balance,
            logs: Vec::new(),
        }
    }

    pub fn world(&mut self) -> &mut WorldState {
        self.world
    }
}

impl Context for StatefulContext<'_> {
    fn tx_hash(&self) -> Hash {
        self.tx_hash
    }

    fn pop_signature(&mut self) -> ExeResult<Signature> {
        self.signatures.pop().ok_or(ExecutionError::StackUnderflow)
    }

    fn log(&mut self, values: Vec<Val>) {
        self.logs.push(values);
    }

    fn take_entry_balance(&mut self) -> Option<BalanceState> {
        self.entry_balance.take()
    }

    fn load_contract(&mut self, address: &Hash) -> ExeResult<(Arc<Contract>, Vec<Val>)> {
        let key = contract_key(address);
        match self.world.get_account(&key)? {
            Some(AccountState::Contract { code, fields }) => {
                let contract = Contract::decode_all(&code)
                    .map_err(|e| ExecutionError::InvalidBytecode(e.to_string()))?;
                let fields = Vec::<Val>::decode_all(&fields)
                    .map_err(|e| ExecutionError::InvalidBytecode(e.to_string()))?;
                Ok((Arc::new(contract), fields))
            }
            _ => Err(ExecutionError::InvalidContractAddress),
        }
    }

    fn pull_contract_asset(&mut self, address: &Hash) -> ExeResult<Option<U256>> {
        // The asset riding with a contract lives under a sibling key so the
        // contract record itself stays untouched by balance flow.
        let asset_key = Hash::hash_blake2b(&[address.as_bytes().as_slice(), b"/asset"].concat());
        match self.world.get_account(&asset_key)? {
            Some(AccountState::Asset { amount, .. }) => {
                self.world.remove_account(asset_key);
                Ok(Some(U256::from_u64(amount)))
            }
            _ => Ok(None),
        }
    }

    fn save_contract_fields(&mut self, address: &Hash, fields: &[Val]) -> ExeResult<()> {
        let key = contract_key(address);
        match self.world.get_account(&key)? {
            Some(AccountState::Contract { code, .. }) => {
                self.world.set_account(
                    key,
                    AccountState::Contract {
                        code,
                        fields: fields.to_vec().encode(),
                    },
                );
                Ok(())
            }
            _ => Err(ExecutionError::InvalidContractAddress),
        }
    }
}

/// Store a contract into world state, the inverse of `load_contract`.
pub fn deploy_contract(
    world: &mut WorldState,
    address: Hash,
    contract: &Contract,
    fields: Vec<Val>,
) -> ExeResult<()> {
    if fields.len() != contract.field_types.len() {
        return Err(ExecutionError::InvalidFieldType);
    }
    for (value, declared) in fields.iter().zip(&contract.field_types) {
        if value.type_of() != *declared {
            return Err(ExecutionError::InvalidFieldType);
        }
    }
    world.set_account(
        contract_key(&address),
        AccountState::Contract {
            code: contract.encode(),
            fields: fields.encode(),
        },
    );
    Ok(())
}
