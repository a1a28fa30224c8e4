//! Partial decryption responses
//!
//! Each response carries a batched Chaum-Pedersen proof that every `D[k]`
//! was produced with the same scalar as the member's verification key
//! `Y_i = g * s_i`, so a bad partial is caught when it is submitted rather
//! than when the combined result fails to decode.

use crate::{ThresholdError, ThresholdResult};
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use quorum_elgamal::{decrypt_shares, generator};
use quorum_hash::derive_wide;
use serde::{Deserialize, Serialize};

const CHALLENGE_CONTEXT: &str = "quorum decryption share challenge v1";
const NONCE_CONTEXT: &str = "quorum decryption share nonce v1";

/// `log_g(Y_i) == log_{R[k]}(D[k])` for every `k`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionProof {
    pub challenge: Scalar,
    pub response: Scalar,
}

/// `D[k] = share * R[k]` for every dimension of an accumulated request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseContribution {
    pub d: Vec<RistrettoPoint>,
    pub proof: DecryptionProof,
}

impl ResponseContribution {
    pub fn dimension(&self) -> usize {
        self.d.len()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(72 + 32 * self.d.len());
        out.extend_from_slice(&(self.d.len() as u64).to_le_bytes());
        for point in &self.d {
            out.extend_from_slice(point.compress().as_bytes());
        }
        out.extend_from_slice(self.proof.challenge.as_bytes());
        out.extend_from_slice(self.proof.response.as_bytes());
        out
    }
}

fn append_points(out: &mut Vec<u8>, points: &[RistrettoPoint]) {
    out.extend_from_slice(&(points.len() as u64).to_le_bytes());
    for point in points {
        out.extend_from_slice(point.compress().as_bytes());
    }
}

fn challenge(
    verification_key: &RistrettoPoint,
    r: &[RistrettoPoint],
    d: &[RistrettoPoint],
    t0: &RistrettoPoint,
    t: &[RistrettoPoint],
) -> Scalar {
    let mut transcript = Vec::with_capacity(64 + 96 * r.len() + 24);
    transcript.extend_from_slice(verification_key.compress().as_bytes());
    transcript.extend_from_slice(t0.compress().as_bytes());
    append_points(&mut transcript, r);
    append_points(&mut transcript, d);
    append_points(&mut transcript, t);
    Scalar::from_bytes_mod_order_wide(&derive_wide(CHALLENGE_CONTEXT, &[&transcript]))
}

pub fn response_contribution(share: &Scalar, r: &[RistrettoPoint]) -> ThresholdResult<ResponseContribution> {
    if r.is_empty() {
        return Err(ThresholdError::EmptyVector);
    }
    let d = decrypt_shares(r, share);
    let verification_key = generator() * share;

    // Deterministic nonce: the same share and request always give the same d
    let mut seed = Vec::with_capacity(8 + 32 * r.len());
    append_points(&mut seed, r);
    let nonce = Scalar::from_bytes_mod_order_wide(&derive_wide(
        NONCE_CONTEXT,
        &[share.as_bytes(), &seed],
    ));

    let t0 = generator() * nonce;
    let t: Vec<RistrettoPoint> = r.iter().map(|point| point * nonce).collect();
    let c = challenge(&verification_key, r, &d, &t0, &t);

    Ok(ResponseContribution {
        d,
        proof: DecryptionProof {
            challenge: c,
            response: nonce + c * share,
        },
    })
}

/// Check a response against the responder's verification key and the request's `R`
pub fn verify_response(
    verification_key: &RistrettoPoint,
    r: &[RistrettoPoint],
    contribution: &ResponseContribution,
) -> bool {
    if r.is_empty() || contribution.d.len() != r.len() {
        return false;
    }
    let DecryptionProof { challenge: c, response: z } = contribution.proof;

    let t0 = generator() * z - verification_key * c;
    let t: Vec<RistrettoPoint> = r
        .iter()
        .zip(&contribution.d)
        .map(|(r_k, d_k)| r_k * z - d_k * c)
        .collect();
    challenge(verification_key, r, &contribution.d, &t0, &t) == c
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dealing::{recover_share, round2_contribution};
    use crate::lagrange::lagrange_coefficients;
    use crate::polynomial::{
        aggregate_commitments, aggregate_public_key, generate_polynomial, round1_contribution,
    };
    use quorum_elgamal::{combine_shares, recover_vector, EncryptedVector, MemberKeypair, PlaintextDomain};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_empty_r_rejected() {
        assert_eq!(
            response_contribution(&Scalar::ONE, &[]),
            Err(ThresholdError::EmptyVector)
        );
    }

    #[test]
    fn test_two_of_three_decryption() {
        let (t, n) = (2, 3);
        let mut rng = ChaCha20Rng::seed_from_u64(51);
        let keys: Vec<_> = (0..n).map(|_| MemberKeypair::generate(&mut rng)).collect();
        let pubkeys: Vec<_> = keys.iter().map(|k| k.public()).collect();
        let polys: Vec<_> = (0..n)
            .map(|_| generate_polynomial(t, n, &mut rng).unwrap())
            .collect();
        let round1: Vec<_> = polys.iter().map(round1_contribution).collect();
        let round2: Vec<_> = polys
            .iter()
            .enumerate()
            .map(|(i, p)| round2_contribution(p, i, &pubkeys, &mut rng).unwrap())
            .collect();
        let pk = aggregate_public_key(&round1).unwrap();

        let shares: Vec<Scalar> = (0..n)
            .map(|m| {
                let received: Vec<_> = round2.iter().map(|c| c.encrypted_shares[m]).collect();
                recover_share(m, polys[m].evaluation(m).unwrap(), &received, keys[m].secret())
                    .unwrap()
            })
            .collect();

        let domain = PlaintextDomain::new(1_000, 5_000).unwrap();
        let ct = EncryptedVector::encrypt(&pk, &[1_000, 2_000, 3_000], &domain, &mut rng).unwrap();

        let subset = [0usize, 2];
        let partials: Vec<_> = subset
            .iter()
            .map(|&m| response_contribution(&shares[m], &ct.r).unwrap().d)
            .collect();
        let lambdas = lagrange_coefficients(&subset, t).unwrap();
        let combined = combine_shares(&partials, &lambdas).unwrap();

        assert_eq!(
            recover_vector(&ct, &combined, &domain).unwrap(),
            vec![1_000, 2_000, 3_000]
        );
    }

    #[test]
    fn test_response_proof_binds_share() {
        let mut rng = ChaCha20Rng::seed_from_u64(52);
        let (t, n) = (2, 3);
        let polys: Vec<_> = (0..n)
            .map(|_| generate_polynomial(t, n, &mut rng).unwrap())
            .collect();
        let round1: Vec<_> = polys.iter().map(round1_contribution).collect();
        let group = aggregate_commitments(&round1).unwrap();
        let share = |m: usize| -> Scalar { polys.iter().map(|p| *p.evaluation(m).unwrap()).sum() };

        let domain = PlaintextDomain::new(10, 100).unwrap();
        let ct = EncryptedVector::encrypt(&group.public_key(), &[3, 7], &domain, &mut rng).unwrap();

        let honest = response_contribution(&share(1), &ct.r).unwrap();
        assert!(verify_response(&group.verification_key(1), &ct.r, &honest));
        // Valid proof, wrong member
        assert!(!verify_response(&group.verification_key(0), &ct.r, &honest));

        let mut forged = honest.clone();
        forged.d[0] += generator();
        assert!(!verify_response(&group.verification_key(1), &ct.r, &forged));

        // Consistent d under a share that is not member 1's
        let other = response_contribution(&(share(1) + Scalar::ONE), &ct.r).unwrap();
        assert!(!verify_response(&group.verification_key(1), &ct.r, &other));

        let mut truncated = honest;
        truncated.d.pop();
        assert!(!verify_response(&group.verification_key(1), &ct.r, &truncated));
    }
}
