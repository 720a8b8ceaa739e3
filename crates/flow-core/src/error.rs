//! Error types for consensus validation.

use flow_types::Hash;
use thiserror::Error;

/// Block and header validation failures. Reported to the source (peer or
/// miner); the item is dropped, never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The header hash does not meet its declared target, or the target
    /// itself is out of bounds.
    #[error("invalid PoW: {0}")]
    BadPoW(String),

    /// Dependency set malformed or inconsistent across chains.
    #[error("invalid deps: {0}")]
    BadDeps(String),

    /// Timestamp not strictly greater than the parent's.
    #[error("invalid timestamp: block {block_time} not after parent {parent_time}")]
    BadTimestamp { block_time: u64, parent_time: u64 },

    /// The intra-chain parent is not known.
    #[error("unknown parent: {0}")]
    UnknownParent(Hash),

    /// A transaction signature does not verify.
    #[error("invalid signature")]
    BadSignature,

    /// The header's Merkle root does not match the block body.
    #[error("merkle root mismatch")]
    BadMerkleRoot,
}

/// Errors surfaced by the consensus core.
#[derive(Error, Debug)]
pub enum FlowError {
    /// Validation failure.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Storage failure.
    #[error(transparent)]
    Storage(#[from] flow_storage::StorageError),
}

/// Result type for consensus operations.
pub type FlowResult<T> = Result<T, FlowError>;
