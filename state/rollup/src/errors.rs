//! Error types for the rollup state machine

use crate::records::StorageKind;
use quorum_elgamal::ElGamalError;
use quorum_storage::StorageError;
use quorum_threshold::ThresholdError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RollupError {
    /// Proof transcript or action hash chain does not check out
    #[error("Chain verification failed: {0}")]
    ChainVerificationFailed(String),

    /// The substrate moved on since the chain was started
    #[error("Stale cursor: {0}")]
    StaleCursor(String),

    /// Witness does not open against the current roots, or the target leaf
    /// is not in the state the action expects
    #[error("Witness mismatch: {0}")]
    WitnessMismatch(String),

    #[error("Duplicate contribution in {storage:?} at {index}")]
    DuplicateContribution { storage: StorageKind, index: String },

    #[error("Invalid contribution: {0}")]
    InvalidContribution(String),

    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Action queue full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Threshold error: {0}")]
    Threshold(#[from] ThresholdError),

    #[error("Encryption error: {0}")]
    Encryption(#[from] ElGamalError),
}

impl From<bincode::Error> for RollupError {
    fn from(err: bincode::Error) -> Self {
        RollupError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for RollupError {
    fn from(err: serde_json::Error) -> Self {
        RollupError::Serialization(err.to_string())
    }
}
