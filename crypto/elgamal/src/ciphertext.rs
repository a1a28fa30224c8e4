//! Ciphertexts and homomorphic accumulation
//!
//! A value `v` encrypted under `PK` with randomness `r` is the pair
//! `(r*g, r*PK + encode(v)*g)`. Adding pairs componentwise adds plaintexts.

use crate::{generator, ElGamalError, ElGamalResult, PlaintextDomain};
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::Identity;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::ops::Add;

/// Single-dimension ciphertext
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ciphertext {
    pub r: RistrettoPoint,
    pub m: RistrettoPoint,
}

impl Ciphertext {
    /// Encrypt an already-encoded scalar with explicit randomness
    pub fn encrypt(public_key: &RistrettoPoint, value: &Scalar, randomness: &Scalar) -> Self {
        Self {
            r: generator() * randomness,
            m: public_key * randomness + generator() * value,
        }
    }

    /// Encryption of zero with zero randomness
    pub fn zero() -> Self {
        Self {
            r: RistrettoPoint::identity(),
            m: RistrettoPoint::identity(),
        }
    }
}

impl Add for Ciphertext {
    type Output = Ciphertext;

    fn add(self, other: Ciphertext) -> Ciphertext {
        Ciphertext {
            r: self.r + other.r,
            m: self.m + other.m,
        }
    }
}

/// A client submission: one ciphertext per dimension, stored as parallel
/// `R` and `M` vectors.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedVector {
    pub r: Vec<RistrettoPoint>,
    pub m: Vec<RistrettoPoint>,
}

impl EncryptedVector {
    /// Encrypt `values` under `public_key` with fresh randomness per dimension
    pub fn encrypt<R: RngCore + CryptoRng>(
        public_key: &RistrettoPoint,
        values: &[u64],
        domain: &PlaintextDomain,
        rng: &mut R,
    ) -> ElGamalResult<Self> {
        let randomness: Vec<Scalar> = values.iter().map(|_| Scalar::random(&mut *rng)).collect();
        Self::encrypt_with_randomness(public_key, values, domain, &randomness)
    }

    /// Deterministic variant used when the caller owns the randomness
    pub fn encrypt_with_randomness(
        public_key: &RistrettoPoint,
        values: &[u64],
        domain: &PlaintextDomain,
        randomness: &[Scalar],
    ) -> ElGamalResult<Self> {
        if values.is_empty() {
            return Err(ElGamalError::EmptyVector);
        }
        if randomness.len() != values.len() {
            return Err(ElGamalError::LengthMismatch {
                expected: values.len(),
                got: randomness.len(),
            });
        }

        let mut r = Vec::with_capacity(values.len());
        let mut m = Vec::with_capacity(values.len());
        for (value, k) in values.iter().zip(randomness) {
            if *value > domain.bound {
                return Err(ElGamalError::ValueOutOfRange {
                    value: *value,
                    bound: domain.bound,
                });
            }
            let ct = Ciphertext::encrypt(public_key, &domain.encode(*value), k);
            r.push(ct.r);
            m.push(ct.m);
        }
        Ok(Self { r, m })
    }

    /// All-identity vector of the given width; the additive neutral element
    pub fn zero(dimension: usize) -> Self {
        Self {
            r: vec![RistrettoPoint::identity(); dimension],
            m: vec![RistrettoPoint::identity(); dimension],
        }
    }

    pub fn dimension(&self) -> usize {
        self.r.len()
    }

    pub fn get(&self, k: usize) -> Option<Ciphertext> {
        Some(Ciphertext {
            r: *self.r.get(k)?,
            m: *self.m.get(k)?,
        })
    }

    /// Reject empty or ragged vectors
    pub fn validate(&self) -> ElGamalResult<()> {
        if self.r.is_empty() {
            return Err(ElGamalError::EmptyVector);
        }
        if self.r.len() != self.m.len() {
            return Err(ElGamalError::DimensionMismatch {
                expected: self.r.len(),
                got: self.m.len(),
            });
        }
        Ok(())
    }

    /// Componentwise addition in place
    pub fn add_assign(&mut self, other: &EncryptedVector) -> ElGamalResult<()> {
        other.validate()?;
        if other.dimension() != self.dimension() {
            return Err(ElGamalError::DimensionMismatch {
                expected: self.dimension(),
                got: other.dimension(),
            });
        }
        for (acc, x) in self.r.iter_mut().zip(&other.r) {
            *acc += x;
        }
        for (acc, x) in self.m.iter_mut().zip(&other.m) {
            *acc += x;
        }
        Ok(())
    }

    /// Canonical byte encoding (compressed `R` then compressed `M`)
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64 * self.dimension() + 8);
        out.extend_from_slice(&(self.dimension() as u64).to_le_bytes());
        for point in self.r.iter().chain(&self.m) {
            out.extend_from_slice(point.compress().as_bytes());
        }
        out
    }
}

/// Pointwise sum of a non-empty list of submissions of equal width
pub fn accumulate(ciphertexts: &[EncryptedVector]) -> ElGamalResult<EncryptedVector> {
    let first = ciphertexts.first().ok_or(ElGamalError::EmptyVector)?;
    first.validate()?;

    let mut acc = first.clone();
    for ct in &ciphertexts[1..] {
        acc.add_assign(ct)?;
    }
    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn public_key(rng: &mut ChaCha20Rng) -> (Scalar, RistrettoPoint) {
        let sk = Scalar::random(rng);
        (sk, generator() * sk)
    }

    #[test]
    fn test_encrypt_rejects_empty() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let (_, pk) = public_key(&mut rng);
        let domain = PlaintextDomain::default();
        assert_eq!(
            EncryptedVector::encrypt(&pk, &[], &domain, &mut rng),
            Err(ElGamalError::EmptyVector)
        );
    }

    #[test]
    fn test_encrypt_rejects_out_of_range() {
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let (_, pk) = public_key(&mut rng);
        let domain = PlaintextDomain::new(1, 10).unwrap();
        assert!(matches!(
            EncryptedVector::encrypt(&pk, &[3, 11], &domain, &mut rng),
            Err(ElGamalError::ValueOutOfRange { value: 11, bound: 10 })
        ));
    }

    #[test]
    fn test_accumulate_adds_plaintexts() {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let (sk, pk) = public_key(&mut rng);
        let domain = PlaintextDomain::new(1_000, 100).unwrap();

        let a = EncryptedVector::encrypt(&pk, &[1, 2, 3], &domain, &mut rng).unwrap();
        let b = EncryptedVector::encrypt(&pk, &[10, 20, 30], &domain, &mut rng).unwrap();
        let sum = accumulate(&[a, b]).unwrap();

        let decoded: Vec<u64> = (0..3)
            .map(|k| domain.decode(&(sum.m[k] - sum.r[k] * sk)).unwrap())
            .collect();
        assert_eq!(decoded, vec![11, 22, 33]);
    }

    #[test]
    fn test_accumulate_dimension_mismatch() {
        let mut rng = ChaCha20Rng::seed_from_u64(4);
        let (_, pk) = public_key(&mut rng);
        let domain = PlaintextDomain::default();

        let a = EncryptedVector::encrypt(&pk, &[1, 2], &domain, &mut rng).unwrap();
        let b = EncryptedVector::encrypt(&pk, &[1, 2, 3], &domain, &mut rng).unwrap();
        assert_eq!(
            accumulate(&[a, b]),
            Err(ElGamalError::DimensionMismatch { expected: 2, got: 3 })
        );
        assert_eq!(accumulate(&[]), Err(ElGamalError::EmptyVector));
    }

    #[test]
    fn test_zero_is_neutral() {
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        let (_, pk) = public_key(&mut rng);
        let domain = PlaintextDomain::default();

        let a = EncryptedVector::encrypt(&pk, &[4, 5], &domain, &mut rng).unwrap();
        let mut acc = EncryptedVector::zero(2);
        acc.add_assign(&a).unwrap();
        assert_eq!(acc, a);
    }

    #[test]
    fn test_single_ciphertext_add() {
        let mut rng = ChaCha20Rng::seed_from_u64(6);
        let (sk, pk) = public_key(&mut rng);
        let domain = PlaintextDomain::new(1, 50).unwrap();

        let x = Ciphertext::encrypt(&pk, &domain.encode(7), &Scalar::random(&mut rng));
        let y = Ciphertext::encrypt(&pk, &domain.encode(8), &Scalar::random(&mut rng));
        let z = x + y + Ciphertext::zero();
        assert_eq!(domain.decode(&(z.m - z.r * sk)).unwrap(), 15);
    }
}
