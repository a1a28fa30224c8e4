//! Property-Based Tests for QUORUM Protocol Primitives
//!
//! Uses proptest to generate random inputs and verify protocol properties hold.

use curve25519_dalek::scalar::Scalar;
use proptest::prelude::*;
use quorum::elgamal::{
    accumulate, decrypt_shares, generator, recover_vector, EncryptedVector, MemberKeypair,
    PlaintextDomain,
};
use quorum::rollup::{Action, ActionCursor};
use quorum::threshold::{generate_polynomial, reconstruct_secret, ThresholdError};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

// =============================================================================
// PROPTEST STRATEGIES
// =============================================================================

fn small_domain() -> PlaintextDomain {
    PlaintextDomain::new(1, 2_000).unwrap()
}

/// Vectors whose pairwise sums stay inside the search bound
fn plaintext_vec(len: usize) -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(0u64..1_000, len)
}

/// (threshold, size) with 1 <= T <= N <= 7
fn committee_shape() -> impl Strategy<Value = (usize, usize)> {
    (1usize..=7).prop_flat_map(|size| (1usize..=size, Just(size)))
}

// =============================================================================
// ENCRYPTION PROPERTY TESTS
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: decrypting the sum of two ciphertexts yields the sum of plaintexts
    #[test]
    fn encryption_is_additively_homomorphic(
        seed in any::<u64>(),
        (a, b) in (1usize..4).prop_flat_map(|len| (plaintext_vec(len), plaintext_vec(len))),
    ) {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let domain = small_domain();
        let keypair = MemberKeypair::generate(&mut rng);

        let ca = EncryptedVector::encrypt(&keypair.public(), &a, &domain, &mut rng).unwrap();
        let cb = EncryptedVector::encrypt(&keypair.public(), &b, &domain, &mut rng).unwrap();
        let sum = accumulate(&[ca, cb]).unwrap();

        let combined = decrypt_shares(&sum.r, keypair.secret());
        let values = recover_vector(&sum, &combined, &domain).unwrap();
        let expected: Vec<u64> = a.iter().zip(&b).map(|(x, y)| x + y).collect();
        prop_assert_eq!(values, expected);
    }

    /// Property: encrypt then decrypt returns the original vector
    #[test]
    fn encryption_round_trip(seed in any::<u64>(), values in plaintext_vec(3)) {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let domain = small_domain();
        let keypair = MemberKeypair::generate(&mut rng);

        let ct = EncryptedVector::encrypt(&keypair.public(), &values, &domain, &mut rng).unwrap();
        let combined = decrypt_shares(&ct.r, keypair.secret());
        prop_assert_eq!(recover_vector(&ct, &combined, &domain).unwrap(), values);
    }
}

// =============================================================================
// SHARING PROPERTY TESTS
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: any T of the summed shares interpolate to the summed secrets
    #[test]
    fn any_threshold_subset_reconstructs(
        seed in any::<u64>(),
        (threshold, size) in committee_shape(),
        offset in 0usize..7,
    ) {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let dealers: Vec<_> = (0..size)
            .map(|_| generate_polynomial(threshold, size, &mut rng).unwrap())
            .collect();

        let group_secret: Scalar = dealers.iter().map(|p| *p.secret()).sum();
        let shares: Vec<Scalar> = (0..size)
            .map(|i| dealers.iter().map(|p| p.evaluations()[i]).sum::<Scalar>())
            .collect();

        // A rotating window of exactly T members
        let subset: Vec<(usize, Scalar)> = (0..threshold)
            .map(|k| {
                let i = (offset + k) % size;
                (i, shares[i])
            })
            .collect();
        let recovered = reconstruct_secret(&subset, threshold).unwrap();
        prop_assert_eq!(recovered, group_secret);
        prop_assert_eq!(generator() * recovered, generator() * group_secret);
    }

    /// Property: fewer than T shares are refused outright
    #[test]
    fn below_threshold_is_refused(seed in any::<u64>(), (threshold, size) in committee_shape()) {
        prop_assume!(threshold > 1);
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let dealer = generate_polynomial(threshold, size, &mut rng).unwrap();

        let subset: Vec<(usize, Scalar)> = (0..threshold - 1)
            .map(|i| (i, dealer.evaluations()[i]))
            .collect();
        prop_assert!(
            matches!(
                reconstruct_secret(&subset, threshold),
                Err(ThresholdError::InsufficientShares { .. })
            ),
            "expected InsufficientShares"
        );
    }

    /// Property: interpolating any T-1 shares on their own misses the secret
    #[test]
    fn below_threshold_interpolation_misses_secret(
        seed in any::<u64>(),
        (threshold, size) in committee_shape(),
        offset in 0usize..7,
    ) {
        prop_assume!(threshold > 1);
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let dealer = generate_polynomial(threshold, size, &mut rng).unwrap();

        let subset: Vec<(usize, Scalar)> = (0..threshold - 1)
            .map(|k| {
                let i = (offset + k) % size;
                (i, dealer.evaluations()[i])
            })
            .collect();
        let guess = reconstruct_secret(&subset, threshold - 1).unwrap();
        prop_assert_ne!(guess, *dealer.secret());
    }
}

// =============================================================================
// ACTION CHAIN PROPERTY TESTS
// =============================================================================

proptest! {
    /// Property: the cursor after a sequence of actions depends on their order
    #[test]
    fn cursor_binds_action_order(a in 0u64..16, b in 0u64..16) {
        prop_assume!(a != b);
        let first = Action::GenerateKey { committee_id: 0, key_id: a }.digest().unwrap();
        let second = Action::GenerateKey { committee_id: 0, key_id: b }.digest().unwrap();
        let genesis = ActionCursor::genesis();

        prop_assert_ne!(
            genesis.advance(&first).advance(&second),
            genesis.advance(&second).advance(&first)
        );
    }
}
