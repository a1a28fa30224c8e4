//! Encryption layer error types

use thiserror::Error;

/// Errors that can occur during encryption, accumulation or decryption
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ElGamalError {
    /// Zero-length submission or nothing to accumulate
    #[error("Empty vector")]
    EmptyVector,

    /// Two ciphertext vectors of different widths were combined
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Partial decryptions and coefficients do not line up
    #[error("Length mismatch: expected {expected}, got {got}")]
    LengthMismatch { expected: usize, got: usize },

    /// Brute-force plaintext search exhausted its bound
    #[error("No plaintext match found within bound {bound}")]
    NoMatchFound { bound: u64 },

    /// A value cannot be represented in the plaintext domain
    #[error("Value {value} exceeds plaintext bound {bound}")]
    ValueOutOfRange { value: u64, bound: u64 },

    /// Malformed plaintext domain
    #[error("Invalid plaintext domain: {0}")]
    InvalidDomain(String),
}
