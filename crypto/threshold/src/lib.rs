//! Threshold Secret Sharing for Committee Keys
//!
//! Implements T-of-N distributed key generation using:
//! - Feldman VSS over the Ristretto255 scalar field
//! - hybrid ElGamal transport of dealer shares
//! - Lagrange interpolation at zero for decryption and audit
//! - Chaum-Pedersen proofs on partial decryptions
//!
//! Member indices are zero-based; member `i` evaluates at `x = i + 1`.

pub mod dealing;
pub mod errors;
pub mod lagrange;
pub mod polynomial;
pub mod response;

pub use dealing::{
    recover_share, recover_verified_share, round2_contribution, Round2Contribution,
};
pub use errors::ThresholdError;
pub use lagrange::{lagrange_coefficients, reconstruct_secret};
pub use polynomial::{
    aggregate_commitments, aggregate_public_key, generate_polynomial, round1_contribution,
    verify_share, GroupCommitments, Round1Contribution, SecretPolynomial,
};
pub use response::{
    response_contribution, verify_response, DecryptionProof, ResponseContribution,
};

use curve25519_dalek::scalar::Scalar;

/// Result type for threshold operations
pub type ThresholdResult<T> = Result<T, ThresholdError>;

/// Evaluation point of a zero-based member index
pub fn evaluation_point(member_index: usize) -> Scalar {
    Scalar::from(member_index as u64 + 1)
}
