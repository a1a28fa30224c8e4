//! Threshold decryption
//!
//! Each responding member publishes `D_i[k] = s_i * R[k]`. Given Lagrange
//! coefficients for the responding set, `sum(lambda_i * D_i[k]) = sk * R[k]`
//! and the plaintext point is `M[k] - sk * R[k]`.

use crate::{ElGamalError, ElGamalResult, EncryptedVector, PlaintextDomain};
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::Identity;

/// Partial decryption of one `R` component
pub fn decrypt_share(r: &RistrettoPoint, share: &Scalar) -> RistrettoPoint {
    r * share
}

/// Partial decryption of every `R` component
pub fn decrypt_shares(r: &[RistrettoPoint], share: &Scalar) -> Vec<RistrettoPoint> {
    r.iter().map(|point| decrypt_share(point, share)).collect()
}

/// Combine per-member partial decryptions into `sk * R[k]` per dimension.
///
/// `partials[i]` is member `i`'s contribution vector and `coefficients[i]`
/// its Lagrange coefficient.
pub fn combine_shares(
    partials: &[Vec<RistrettoPoint>],
    coefficients: &[Scalar],
) -> ElGamalResult<Vec<RistrettoPoint>> {
    if partials.len() != coefficients.len() {
        return Err(ElGamalError::LengthMismatch {
            expected: coefficients.len(),
            got: partials.len(),
        });
    }
    let dimension = partials.first().ok_or(ElGamalError::EmptyVector)?.len();
    if dimension == 0 {
        return Err(ElGamalError::EmptyVector);
    }

    let mut combined = vec![RistrettoPoint::identity(); dimension];
    for (partial, lambda) in partials.iter().zip(coefficients) {
        if partial.len() != dimension {
            return Err(ElGamalError::DimensionMismatch {
                expected: dimension,
                got: partial.len(),
            });
        }
        for (acc, d) in combined.iter_mut().zip(partial) {
            *acc += d * lambda;
        }
    }
    Ok(combined)
}

/// Recover the plaintext of one dimension from `M[k]` and the combined share
pub fn recover_plaintext(
    m: &RistrettoPoint,
    combined: &RistrettoPoint,
    domain: &PlaintextDomain,
) -> ElGamalResult<u64> {
    domain.decode(&(m - combined))
}

/// Recover every dimension of an accumulated vector
pub fn recover_vector(
    ciphertext: &EncryptedVector,
    combined: &[RistrettoPoint],
    domain: &PlaintextDomain,
) -> ElGamalResult<Vec<u64>> {
    ciphertext.validate()?;
    if combined.len() != ciphertext.dimension() {
        return Err(ElGamalError::DimensionMismatch {
            expected: ciphertext.dimension(),
            got: combined.len(),
        });
    }
    ciphertext
        .m
        .iter()
        .zip(combined)
        .map(|(m, d)| recover_plaintext(m, d, domain))
        .collect()
}
