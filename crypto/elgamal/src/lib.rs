//! QUORUM Homomorphic Encryption Layer
//!
//! ElGamal "in the exponent" over Ristretto255. Ciphertexts add pointwise, so
//! many client submissions collapse into one ciphertext vector that the
//! committee decrypts once.
//!
//! # Architecture:
//! - `EncryptedVector`: client submission `(R, M)` under the committee key
//! - `decryption`: partial decryptions, Lagrange combination, bounded plaintext search
//! - `ShareCiphertext`: hybrid ElGamal used to ship secret shares between members
//! - `MemberKeypair`: a member's long-term transport key

pub mod ciphertext;
pub mod decryption;
pub mod errors;
pub mod keys;
pub mod transport;

pub use ciphertext::{accumulate, Ciphertext, EncryptedVector};
pub use decryption::{
    combine_shares, decrypt_share, decrypt_shares, recover_plaintext, recover_vector,
};
pub use errors::ElGamalError;
pub use keys::MemberKeypair;
pub use transport::ShareCiphertext;

use curve25519_dalek::constants::RISTRETTO_BASEPOINT_POINT;
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::Identity;
use serde::{Deserialize, Serialize};

/// Result type for encryption operations
pub type ElGamalResult<T> = Result<T, ElGamalError>;

/// Group generator `g`
pub fn generator() -> RistrettoPoint {
    RISTRETTO_BASEPOINT_POINT
}

/// Plaintext encoding: a client value `v` is encrypted as the scalar `v * unit`
/// and recovered by searching `k * unit * g` for `k` in `0..=bound`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaintextDomain {
    /// Fixed scaling unit applied to every value
    pub unit: u64,
    /// Largest recoverable (unscaled) value
    pub bound: u64,
}

impl Default for PlaintextDomain {
    fn default() -> Self {
        Self {
            unit: 1_000,
            bound: 100_000,
        }
    }
}

impl PlaintextDomain {
    /// Create a domain, rejecting a zero unit
    pub fn new(unit: u64, bound: u64) -> ElGamalResult<Self> {
        if unit == 0 {
            return Err(ElGamalError::InvalidDomain("unit must be non-zero".into()));
        }
        Ok(Self { unit, bound })
    }

    /// Scalar encoding of `value`
    pub fn encode(&self, value: u64) -> Scalar {
        Scalar::from(value) * Scalar::from(self.unit)
    }

    /// `g^(value * unit)`
    pub fn encode_point(&self, value: u64) -> RistrettoPoint {
        generator() * self.encode(value)
    }

    /// Recover `v` from `g^(v * unit)` by bounded brute force
    pub fn decode(&self, point: &RistrettoPoint) -> ElGamalResult<u64> {
        let step = generator() * Scalar::from(self.unit);
        let mut candidate = RistrettoPoint::identity();
        for value in 0..=self.bound {
            if candidate == *point {
                return Ok(value);
            }
            candidate += step;
        }
        Err(ElGamalError::NoMatchFound { bound: self.bound })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_default() {
        let domain = PlaintextDomain::default();
        assert_eq!(domain.unit, 1_000);
        assert!(domain.bound > 0);
    }

    #[test]
    fn test_zero_unit_rejected() {
        assert!(matches!(
            PlaintextDomain::new(0, 10),
            Err(ElGamalError::InvalidDomain(_))
        ));
    }

    #[test]
    fn test_decode_encoded_point() {
        let domain = PlaintextDomain::new(7, 500).unwrap();
        for value in [0u64, 1, 250, 500] {
            assert_eq!(domain.decode(&domain.encode_point(value)).unwrap(), value);
        }
    }

    #[test]
    fn test_decode_past_bound_fails() {
        let domain = PlaintextDomain::new(7, 10).unwrap();
        let point = domain.encode_point(11);
        assert!(matches!(
            domain.decode(&point),
            Err(ElGamalError::NoMatchFound { bound: 10 })
        ));
    }
}
