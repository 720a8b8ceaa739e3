//! VM execution errors.
//!
//! Every variant aborts the executing transaction; staged world-state
//! writes are rolled back by the caller. The enum deliberately folds the
//! "hard halt" and "recoverable" layers of the protocol into one type so
//! the execution loop stays a plain `Result` pipeline.

use thiserror::Error;

/// Execution failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("out of gas")]
    OutOfGas,

    #[error("stack underflow")]
    StackUnderflow,

    #[error("invalid value type: expected {expected}")]
    InvalidType { expected: &'static str },

    #[error("invalid local index {0}")]
    InvalidLocalIndex(usize),

    #[error("invalid field index {0}")]
    InvalidFieldIndex(usize),

    #[error("invalid field type")]
    InvalidFieldType,

    #[error("invalid method index {0}")]
    InvalidMethodIndex(usize),

    #[error("invalid instruction offset")]
    InvalidInstrOffset,

    #[error("pc overflow")]
    PcOverflow,

    #[error("external call to private method {0}")]
    ExternalPrivateMethodCall(usize),

    #[error("no balance available for payable method")]
    EmptyBalanceForPayableMethod,

    #[error("invalid contract address")]
    InvalidContractAddress,

    #[error("invalid return length: expected {expected}, stack has {actual}")]
    InvalidReturnLength { expected: usize, actual: usize },

    #[error("arithmetic error")]
    ArithmeticError,

    #[error("balance underflow")]
    BalanceUnderflow,

    #[error("stateful instruction in stateless context")]
    ExpectedStatefulContext,

    #[error("signature verification failed")]
    InvalidSignature,

    #[error("bytecode does not decode: {0}")]
    InvalidBytecode(String),

    #[error("world state unavailable: {0}")]
    WorldState(String),
}

impl From<flow_storage::StorageError> for ExecutionError {
    fn from(err: flow_storage::StorageError) -> Self {
        ExecutionError::WorldState(err.to_string())
    }
}

/// Result type for VM operations.
pub type ExeResult<T> = Result<T, ExecutionError>;
