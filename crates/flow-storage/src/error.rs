//! Error types for the storage layer.

use thiserror::Error;

/// Storage errors.
///
/// `IOFailure` is transient and callers retry it with bounded backoff;
/// `Corruption` is fatal and terminates the node with a diagnostic.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Transient I/O failure.
    #[error("storage I/O failure: {0}")]
    IOFailure(String),

    /// The store returned bytes that do not decode; fatal.
    #[error("storage corruption: {0}")]
    Corruption(String),

    /// A required record is missing.
    #[error("not found: {0}")]
    NotFound(String),

    /// The requested column family does not exist.
    #[error("column family not found: {0}")]
    ColumnFamilyNotFound(String),
}

impl From<rocksdb::Error> for StorageError {
    fn from(err: rocksdb::Error) -> Self {
        let text = err.to_string();
        if text.contains("Corruption") {
            StorageError::Corruption(text)
        } else {
            StorageError::IOFailure(text)
        }
    }
}

impl From<flow_types::CodecError> for StorageError {
    fn from(err: flow_types::CodecError) -> Self {
        StorageError::Corruption(err.to_string())
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
