//! Sync errors.

use thiserror::Error;

/// Failures at the sync layer.
#[derive(Error, Debug)]
pub enum SyncError {
    /// A peer sent a malformed or out-of-protocol message; the message is
    /// dropped and the peer scored down.
    #[error("protocol violation from peer {peer}: {reason}")]
    Protocol { peer: u64, reason: String },

    /// The handler mesh is gone; the node is shutting down.
    #[error("handler mesh unavailable")]
    HandlersGone,
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;
