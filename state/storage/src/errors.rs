//! Error types for indexed storage operations

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Index arity mismatch: expected {expected}, got {got}")]
    ArityMismatch { expected: usize, got: usize },

    #[error("Index {index} out of range (capacity {capacity})")]
    IndexOutOfRange { index: u64, capacity: u64 },

    /// Subtree operation on a prefix with no tree under an explicit policy
    #[error("Level-2 tree missing at {prefix}")]
    Level2TreeMissing { prefix: String },

    #[error("Subtree at {prefix} is sealed")]
    Sealed { prefix: String },

    #[error("Invalid storage layout: {0}")]
    InvalidLayout(String),

    #[error("Snapshot mismatch: {0}")]
    SnapshotMismatch(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}
