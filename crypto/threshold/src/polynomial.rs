//! Secret polynomials and round-1 commitments

use crate::{evaluation_point, ThresholdError, ThresholdResult};
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::Identity;
use quorum_elgamal::generator;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A member's dealing polynomial `f(x) = a_0 + a_1 x + ... + a_{T-1} x^{T-1}`.
///
/// `evaluations[i] = f(i + 1)` is the share destined for member `i`.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretPolynomial {
    coefficients: Vec<Scalar>,
    #[zeroize(skip)]
    commitments: Vec<RistrettoPoint>,
    evaluations: Vec<Scalar>,
}

impl SecretPolynomial {
    pub fn threshold(&self) -> usize {
        self.coefficients.len()
    }

    pub fn size(&self) -> usize {
        self.evaluations.len()
    }

    pub fn commitments(&self) -> &[RistrettoPoint] {
        &self.commitments
    }

    /// `f(member_index + 1)`
    pub fn evaluation(&self, member_index: usize) -> ThresholdResult<&Scalar> {
        self.evaluations
            .get(member_index)
            .ok_or(ThresholdError::IndexOutOfRange {
                index: member_index,
                size: self.evaluations.len(),
            })
    }

    pub fn evaluations(&self) -> &[Scalar] {
        &self.evaluations
    }

    /// Constant term; this dealer's additive part of the group secret
    pub fn secret(&self) -> &Scalar {
        &self.coefficients[0]
    }
}

impl fmt::Debug for SecretPolynomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretPolynomial")
            .field("threshold", &self.threshold())
            .field("size", &self.size())
            .field("coefficients", &"[REDACTED]")
            .finish()
    }
}

/// Horner evaluation of `coefficients` at `x`
fn evaluate(coefficients: &[Scalar], x: &Scalar) -> Scalar {
    coefficients
        .iter()
        .rev()
        .fold(Scalar::ZERO, |acc, coeff| acc * x + coeff)
}

/// Sample a random degree `T-1` polynomial and evaluate it at `1..=N`
pub fn generate_polynomial<R: RngCore + CryptoRng>(
    threshold: usize,
    size: usize,
    rng: &mut R,
) -> ThresholdResult<SecretPolynomial> {
    if threshold == 0 || size == 0 || threshold > size {
        return Err(ThresholdError::InvalidParameters { threshold, size });
    }

    let coefficients: Vec<Scalar> = (0..threshold).map(|_| Scalar::random(&mut *rng)).collect();
    let commitments = coefficients.iter().map(|a| generator() * a).collect();
    let evaluations = (0..size)
        .map(|i| evaluate(&coefficients, &evaluation_point(i)))
        .collect();

    Ok(SecretPolynomial {
        coefficients,
        commitments,
        evaluations,
    })
}

/// Public commitments `C_k = a_k * g` broadcast in round 1
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round1Contribution {
    pub commitments: Vec<RistrettoPoint>,
}

impl Round1Contribution {
    /// This dealer's part of the group public key
    pub fn public_part(&self) -> Option<&RistrettoPoint> {
        self.commitments.first()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + 32 * self.commitments.len());
        out.extend_from_slice(&(self.commitments.len() as u64).to_le_bytes());
        for c in &self.commitments {
            out.extend_from_slice(c.compress().as_bytes());
        }
        out
    }
}

pub fn round1_contribution(secret: &SecretPolynomial) -> Round1Contribution {
    Round1Contribution {
        commitments: secret.commitments.clone(),
    }
}

/// Coefficient-wise sum `A_k = sum_d C_{d,k}` over every dealer's round-1 commitments.
///
/// `A_0` is the group public key and `sum_k A_k (i+1)^k` is `g * s_i`, the
/// public image of member `i`'s combined share.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCommitments {
    pub commitments: Vec<RistrettoPoint>,
}

impl GroupCommitments {
    pub fn public_key(&self) -> RistrettoPoint {
        self.commitments
            .first()
            .copied()
            .unwrap_or_else(RistrettoPoint::identity)
    }

    /// `g * s_i` for member `i`
    pub fn verification_key(&self, member_index: usize) -> RistrettoPoint {
        evaluate_commitments(&self.commitments, member_index)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + 32 * self.commitments.len());
        out.extend_from_slice(&(self.commitments.len() as u64).to_le_bytes());
        for c in &self.commitments {
            out.extend_from_slice(c.compress().as_bytes());
        }
        out
    }
}

pub fn aggregate_commitments(contributions: &[Round1Contribution]) -> ThresholdResult<GroupCommitments> {
    let first = contributions
        .first()
        .ok_or(ThresholdError::InsufficientShares { got: 0, need: 1 })?;
    let threshold = first.commitments.len();
    if threshold == 0 {
        return Err(ThresholdError::EmptyVector);
    }

    let mut commitments = vec![RistrettoPoint::identity(); threshold];
    for contribution in contributions {
        if contribution.commitments.len() != threshold {
            return Err(ThresholdError::LengthMismatch {
                expected: threshold,
                got: contribution.commitments.len(),
            });
        }
        for (sum, c) in commitments.iter_mut().zip(&contribution.commitments) {
            *sum += c;
        }
    }
    Ok(GroupCommitments { commitments })
}

/// Group public key `PK = sum(C_0)` over every dealer's round-1 contribution
pub fn aggregate_public_key(contributions: &[Round1Contribution]) -> ThresholdResult<RistrettoPoint> {
    Ok(aggregate_commitments(contributions)?.public_key())
}

fn evaluate_commitments(commitments: &[RistrettoPoint], member_index: usize) -> RistrettoPoint {
    let x = evaluation_point(member_index);
    commitments
        .iter()
        .rev()
        .fold(RistrettoPoint::identity(), |acc, c| acc * x + c)
}

/// Feldman check: `share * g == sum_k C_k * (i+1)^k`
pub fn verify_share(commitments: &[RistrettoPoint], member_index: usize, share: &Scalar) -> bool {
    if commitments.is_empty() {
        return false;
    }
    generator() * share == evaluate_commitments(commitments, member_index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_invalid_parameters() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        for (t, n) in [(0, 3), (4, 3), (1, 0)] {
            assert_eq!(
                generate_polynomial(t, n, &mut rng).unwrap_err(),
                ThresholdError::InvalidParameters { threshold: t, size: n }
            );
        }
    }

    #[test]
    fn test_evaluations_match_polynomial() {
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let poly = generate_polynomial(3, 5, &mut rng).unwrap();
        assert_eq!(poly.threshold(), 3);
        assert_eq!(poly.size(), 5);

        for i in 0..5 {
            let x = evaluation_point(i);
            let a = &poly.coefficients;
            let direct = a[0] + a[1] * x + a[2] * x * x;
            assert_eq!(*poly.evaluation(i).unwrap(), direct);
        }
        assert!(poly.evaluation(5).is_err());
    }

    #[test]
    fn test_feldman_verification() {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let poly = generate_polynomial(2, 4, &mut rng).unwrap();
        let commitments = round1_contribution(&poly).commitments;

        for i in 0..4 {
            assert!(verify_share(&commitments, i, poly.evaluation(i).unwrap()));
        }
        let tampered = poly.evaluation(0).unwrap() + Scalar::ONE;
        assert!(!verify_share(&commitments, 0, &tampered));
        assert!(!verify_share(&[], 0, &tampered));
    }

    #[test]
    fn test_aggregate_public_key() {
        let mut rng = ChaCha20Rng::seed_from_u64(4);
        let polys: Vec<_> = (0..3)
            .map(|_| generate_polynomial(2, 3, &mut rng).unwrap())
            .collect();
        let round1: Vec<_> = polys.iter().map(round1_contribution).collect();

        let secret: Scalar = polys.iter().map(|p| *p.secret()).sum();
        assert_eq!(aggregate_public_key(&round1).unwrap(), generator() * secret);
    }

    #[test]
    fn test_verification_key_is_combined_share_image() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let polys: Vec<_> = (0..3)
            .map(|_| generate_polynomial(2, 3, &mut rng).unwrap())
            .collect();
        let round1: Vec<_> = polys.iter().map(round1_contribution).collect();
        let group = aggregate_commitments(&round1).unwrap();

        assert_eq!(group.public_key(), aggregate_public_key(&round1).unwrap());
        for member in 0..3 {
            let share: Scalar = polys.iter().map(|p| *p.evaluation(member).unwrap()).sum();
            assert_eq!(group.verification_key(member), generator() * share);
        }
    }

    #[test]
    fn test_aggregate_rejects_mixed_thresholds() {
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        let a = round1_contribution(&generate_polynomial(2, 3, &mut rng).unwrap());
        let b = round1_contribution(&generate_polynomial(3, 3, &mut rng).unwrap());
        assert_eq!(
            aggregate_public_key(&[a, b]),
            Err(ThresholdError::LengthMismatch { expected: 2, got: 3 })
        );
        assert!(matches!(
            aggregate_public_key(&[]),
            Err(ThresholdError::InsufficientShares { .. })
        ));
    }

    #[test]
    fn test_debug_is_redacted() {
        let mut rng = ChaCha20Rng::seed_from_u64(6);
        let poly = generate_polynomial(2, 3, &mut rng).unwrap();
        assert!(format!("{:?}", poly).contains("[REDACTED]"));
    }
}
