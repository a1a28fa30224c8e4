//! Round 2: encrypted share distribution and share recovery

use crate::polynomial::{verify_share, Round1Contribution, SecretPolynomial};
use crate::{ThresholdError, ThresholdResult};
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use quorum_elgamal::ShareCiphertext;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

/// One ciphertext per committee member; the dealer's own slot is the sentinel
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round2Contribution {
    pub encrypted_shares: Vec<ShareCiphertext>,
}

impl Round2Contribution {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + 64 * self.encrypted_shares.len());
        out.extend_from_slice(&(self.encrypted_shares.len() as u64).to_le_bytes());
        for share in &self.encrypted_shares {
            out.extend_from_slice(&share.to_bytes());
        }
        out
    }
}

/// Encrypt `f(j+1)` to every other member `j`
pub fn round2_contribution<R: RngCore + CryptoRng>(
    secret: &SecretPolynomial,
    member_index: usize,
    member_pubkeys: &[RistrettoPoint],
    rng: &mut R,
) -> ThresholdResult<Round2Contribution> {
    let size = secret.size();
    if member_pubkeys.len() != size {
        return Err(ThresholdError::LengthMismatch {
            expected: size,
            got: member_pubkeys.len(),
        });
    }
    if member_index >= size {
        return Err(ThresholdError::IndexOutOfRange {
            index: member_index,
            size,
        });
    }

    let encrypted_shares = member_pubkeys
        .iter()
        .zip(secret.evaluations())
        .enumerate()
        .map(|(j, (pubkey, evaluation))| {
            if j == member_index {
                ShareCiphertext::sentinel()
            } else {
                ShareCiphertext::encrypt(evaluation, pubkey, &mut *rng)
            }
        })
        .collect();

    Ok(Round2Contribution { encrypted_shares })
}

/// Member share: own evaluation plus every share addressed to this member.
///
/// `received[j]` is dealer `j`'s ciphertext for `member_index`.
pub fn recover_share(
    member_index: usize,
    self_evaluation: &Scalar,
    received: &[ShareCiphertext],
    secret_key: &Scalar,
) -> ThresholdResult<Scalar> {
    if member_index >= received.len() {
        return Err(ThresholdError::IndexOutOfRange {
            index: member_index,
            size: received.len(),
        });
    }

    let mut share = *self_evaluation;
    for (dealer, ct) in received.iter().enumerate() {
        if dealer != member_index {
            share += ct.decrypt(secret_key);
        }
    }
    Ok(share)
}

/// Like [`recover_share`] but checks every decrypted share against the
/// dealer's round-1 commitments first.
pub fn recover_verified_share(
    member_index: usize,
    self_evaluation: &Scalar,
    received: &[ShareCiphertext],
    round1: &[Round1Contribution],
    secret_key: &Scalar,
) -> ThresholdResult<Scalar> {
    if round1.len() != received.len() {
        return Err(ThresholdError::LengthMismatch {
            expected: received.len(),
            got: round1.len(),
        });
    }
    if member_index >= received.len() {
        return Err(ThresholdError::IndexOutOfRange {
            index: member_index,
            size: received.len(),
        });
    }
    if !verify_share(&round1[member_index].commitments, member_index, self_evaluation) {
        return Err(ThresholdError::InvalidShare { dealer: member_index });
    }

    let mut share = *self_evaluation;
    for (dealer, (ct, contribution)) in received.iter().zip(round1).enumerate() {
        if dealer == member_index {
            continue;
        }
        let value = ct.decrypt(secret_key);
        if !verify_share(&contribution.commitments, member_index, &value) {
            return Err(ThresholdError::InvalidShare { dealer });
        }
        share += value;
    }
    Ok(share)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polynomial::{generate_polynomial, round1_contribution};
    use quorum_elgamal::{generator, MemberKeypair};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    struct Dealing {
        keys: Vec<MemberKeypair>,
        polys: Vec<SecretPolynomial>,
        round1: Vec<Round1Contribution>,
        round2: Vec<Round2Contribution>,
    }

    fn deal(t: usize, n: usize, seed: u64) -> Dealing {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let keys: Vec<_> = (0..n).map(|_| MemberKeypair::generate(&mut rng)).collect();
        let pubkeys: Vec<_> = keys.iter().map(|k| k.public()).collect();
        let polys: Vec<_> = (0..n)
            .map(|_| generate_polynomial(t, n, &mut rng).unwrap())
            .collect();
        let round1 = polys.iter().map(round1_contribution).collect();
        let round2 = polys
            .iter()
            .enumerate()
            .map(|(i, p)| round2_contribution(p, i, &pubkeys, &mut rng).unwrap())
            .collect();
        Dealing { keys, polys, round1, round2 }
    }

    fn received_by(dealing: &Dealing, member: usize) -> Vec<ShareCiphertext> {
        dealing
            .round2
            .iter()
            .map(|c| c.encrypted_shares[member])
            .collect()
    }

    #[test]
    fn test_self_slot_is_sentinel() {
        let dealing = deal(2, 3, 31);
        for (i, contribution) in dealing.round2.iter().enumerate() {
            assert_eq!(contribution.encrypted_shares.len(), 3);
            assert!(contribution.encrypted_shares[i].is_sentinel());
        }
    }

    #[test]
    fn test_pubkey_count_must_match() {
        let mut rng = ChaCha20Rng::seed_from_u64(32);
        let poly = generate_polynomial(2, 3, &mut rng).unwrap();
        let key = MemberKeypair::generate(&mut rng);
        assert_eq!(
            round2_contribution(&poly, 0, &[key.public()], &mut rng),
            Err(ThresholdError::LengthMismatch { expected: 3, got: 1 })
        );
    }

    #[test]
    fn test_recovered_share_is_sum_of_evaluations() {
        let dealing = deal(2, 3, 33);
        for member in 0..3 {
            let share = recover_share(
                member,
                dealing.polys[member].evaluation(member).unwrap(),
                &received_by(&dealing, member),
                dealing.keys[member].secret(),
            )
            .unwrap();
            let expected: Scalar = dealing
                .polys
                .iter()
                .map(|p| *p.evaluation(member).unwrap())
                .sum();
            assert_eq!(share, expected);
        }
    }

    #[test]
    fn test_verified_share_matches_unverified() {
        let dealing = deal(2, 3, 34);
        let member = 1;
        let own = dealing.polys[member].evaluation(member).unwrap();
        let received = received_by(&dealing, member);
        let sk = dealing.keys[member].secret();

        let plain = recover_share(member, own, &received, sk).unwrap();
        let verified =
            recover_verified_share(member, own, &received, &dealing.round1, sk).unwrap();
        assert_eq!(plain, verified);
        assert_eq!(
            generator() * verified,
            dealing
                .round1
                .iter()
                .map(|r| {
                    let x = crate::evaluation_point(member);
                    r.commitments[0] + r.commitments[1] * x
                })
                .sum::<RistrettoPoint>()
        );
    }

    #[test]
    fn test_tampered_share_detected() {
        let dealing = deal(2, 3, 35);
        let member = 0;
        let mut received = received_by(&dealing, member);
        received[2].c += Scalar::ONE;

        let result = recover_verified_share(
            member,
            dealing.polys[member].evaluation(member).unwrap(),
            &received,
            &dealing.round1,
            dealing.keys[member].secret(),
        );
        assert_eq!(result, Err(ThresholdError::InvalidShare { dealer: 2 }));
    }
}
