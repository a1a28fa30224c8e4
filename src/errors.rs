//! Errors surfaced by the member and aggregator roles

use crate::config::ConfigError;
use quorum_elgamal::ElGamalError;
use quorum_rollup::RollupError;
use quorum_threshold::ThresholdError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AggregatorError {
    #[error("Rollup error: {0}")]
    Rollup(#[from] RollupError),

    #[error("Threshold error: {0}")]
    Threshold(#[from] ThresholdError),

    #[error("Encryption error: {0}")]
    Encryption(#[from] ElGamalError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Unknown committee {0}")]
    UnknownCommittee(u64),

    #[error("Unknown request {0}")]
    UnknownRequest(u64),

    #[error("Round {round} of key {key_index} has {got} of {need} contributions")]
    IncompleteRound {
        round: u8,
        key_index: u64,
        got: usize,
        need: usize,
    },

    #[error("No secret material for committee {committee_id} key {key_id}")]
    MissingSecret { committee_id: u64, key_id: u64 },

    /// Local mirror no longer matches the committed or folded root
    #[error("Mirror diverged: {0}")]
    MirrorDiverged(String),

    #[error("Background task failed: {0}")]
    TaskFailed(String),
}

/// Result type for member and aggregator operations
pub type AggregatorResult<T> = Result<T, AggregatorError>;
