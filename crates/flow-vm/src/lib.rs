//! # flow-vm
//!
//! The stack-based contract virtual machine.
//!
//! Execution happens in *frames* on an executor-owned frame stack; every
//! frame addresses a segment of one shared operand stack. Two contexts
//! exist: stateless (signature checks only, for asset scripts) and stateful
//! (world state, balances, contract loading). Gas is charged before each
//! instruction; any error aborts the transaction and the staged world-state
//! writes are discarded.

mod balance;
mod context;
mod contract;
mod error;
mod frame;
mod gas;
mod instr;
mod runtime;
mod val;

pub use balance::{BalanceState, Balances};
pub use context::{deploy_contract, Context, StatefulContext, StatelessContext};
pub use contract::{contract_key, Contract, ContractObj, Method, Script};
pub use error::{ExeResult, ExecutionError};
pub use frame::Frame;
pub use gas::{GasMeter, GAS_BASE, GAS_CALL, GAS_HASH, GAS_VERIFY};
pub use instr::Instr;
pub use runtime::Runtime;
pub use val::{Val, ValType};
