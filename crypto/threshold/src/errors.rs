//! Threshold engine error types

use quorum_elgamal::ElGamalError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ThresholdError {
    #[error("Invalid parameters: threshold {threshold}, size {size}")]
    InvalidParameters { threshold: usize, size: usize },

    #[error("Length mismatch: expected {expected}, got {got}")]
    LengthMismatch { expected: usize, got: usize },

    #[error("Insufficient shares: got {got}, need {need}")]
    InsufficientShares { got: usize, need: usize },

    #[error("Too many shares: got {got}, threshold {threshold}")]
    TooManyShares { got: usize, threshold: usize },

    #[error("Duplicate member index {0}")]
    DuplicateIndex(usize),

    #[error("Member index {index} out of range for committee of {size}")]
    IndexOutOfRange { index: usize, size: usize },

    /// Decrypted share does not match the dealer's round-1 commitments
    #[error("Invalid share from dealer {dealer}")]
    InvalidShare { dealer: usize },

    #[error("Empty vector")]
    EmptyVector,

    #[error("Encryption error: {0}")]
    Encryption(#[from] ElGamalError),
}
