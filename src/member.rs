//! Member-side session
//!
//! A `MemberSession` keeps one member's transport keypair, the dealing
//! polynomial of every key in progress and the recovered shares of active
//! keys. It only builds actions; queuing them is up to the caller.

use crate::errors::{AggregatorError, AggregatorResult};
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use quorum_elgamal::{EncryptedVector, MemberKeypair, ShareCiphertext};
use quorum_rollup::{Action, CommitteeSetting};
use quorum_threshold::{
    generate_polynomial, recover_verified_share, response_contribution, round1_contribution,
    round2_contribution, Round1Contribution, Round2Contribution, SecretPolynomial, ThresholdError,
};
use rand::{CryptoRng, RngCore};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;
use zeroize::Zeroize;

type KeyId = (u64, u64);

pub struct MemberSession {
    member_id: u64,
    keypair: MemberKeypair,
    polynomials: HashMap<KeyId, SecretPolynomial>,
    shares: HashMap<KeyId, Scalar>,
}

impl MemberSession {
    pub fn new(member_id: u64, keypair: MemberKeypair) -> Self {
        Self {
            member_id,
            keypair,
            polynomials: HashMap::new(),
            shares: HashMap::new(),
        }
    }

    /// Session with a freshly generated transport keypair
    pub fn generate<R: RngCore + CryptoRng>(member_id: u64, rng: &mut R) -> Self {
        Self::new(member_id, MemberKeypair::generate(rng))
    }

    pub fn member_id(&self) -> u64 {
        self.member_id
    }

    pub fn public_key(&self) -> RistrettoPoint {
        self.keypair.public()
    }

    /// Sample this member's dealing polynomial and publish its commitments
    pub fn round1_action<R: RngCore + CryptoRng>(
        &mut self,
        committee_id: u64,
        key_id: u64,
        setting: &CommitteeSetting,
        rng: &mut R,
    ) -> AggregatorResult<Action> {
        let polynomial = generate_polynomial(setting.threshold as usize, setting.size as usize, rng)?;
        let contribution = round1_contribution(&polynomial);
        self.polynomials.insert((committee_id, key_id), polynomial);
        debug!(
            "Member {} dealt for committee {} key {}",
            self.member_id, committee_id, key_id
        );

        Ok(Action::ContributeRound1 {
            committee_id,
            key_id,
            member_id: self.member_id,
            contribution,
        })
    }

    /// Encrypt this member's evaluations to every other member
    pub fn round2_action<R: RngCore + CryptoRng>(
        &self,
        committee_id: u64,
        key_id: u64,
        members: &[RistrettoPoint],
        rng: &mut R,
    ) -> AggregatorResult<Action> {
        let polynomial = self.polynomial(committee_id, key_id)?;
        let contribution = round2_contribution(polynomial, self.member_id as usize, members, rng)?;

        Ok(Action::ContributeRound2 {
            committee_id,
            key_id,
            member_id: self.member_id,
            contribution,
        })
    }

    /// Decrypt and verify the shares addressed to this member, keep the sum
    /// as the member's key share and drop the dealing polynomial.
    ///
    /// `round1[j]` and `round2[j]` are dealer `j`'s contributions.
    pub fn recover_share(
        &mut self,
        committee_id: u64,
        key_id: u64,
        round1: &[Round1Contribution],
        round2: &[Round2Contribution],
    ) -> AggregatorResult<()> {
        let polynomial = self.polynomial(committee_id, key_id)?;
        let index = self.member_id as usize;

        let received: Vec<ShareCiphertext> = round2
            .iter()
            .map(|contribution| {
                contribution
                    .encrypted_shares
                    .get(index)
                    .copied()
                    .ok_or(ThresholdError::IndexOutOfRange {
                        index,
                        size: contribution.encrypted_shares.len(),
                    })
            })
            .collect::<Result<_, _>>()?;

        let share = recover_verified_share(
            index,
            polynomial.evaluation(index)?,
            &received,
            round1,
            self.keypair.secret(),
        )?;

        self.shares.insert((committee_id, key_id), share);
        self.polynomials.remove(&(committee_id, key_id));
        Ok(())
    }

    pub fn has_share(&self, committee_id: u64, key_id: u64) -> bool {
        self.shares.contains_key(&(committee_id, key_id))
    }

    /// Partial decryption of a request's accumulated ciphertext
    pub fn response_action(
        &self,
        request_id: u64,
        committee_id: u64,
        key_id: u64,
        accumulator: &EncryptedVector,
    ) -> AggregatorResult<Action> {
        let share = self
            .shares
            .get(&(committee_id, key_id))
            .ok_or(AggregatorError::MissingSecret { committee_id, key_id })?;
        let contribution = response_contribution(share, &accumulator.r)?;

        Ok(Action::ContributeResponse {
            request_id,
            member_id: self.member_id,
            contribution,
        })
    }

    fn polynomial(&self, committee_id: u64, key_id: u64) -> AggregatorResult<&SecretPolynomial> {
        self.polynomials
            .get(&(committee_id, key_id))
            .ok_or(AggregatorError::MissingSecret { committee_id, key_id })
    }
}

impl Drop for MemberSession {
    fn drop(&mut self) {
        for share in self.shares.values_mut() {
            share.zeroize();
        }
    }
}

impl fmt::Debug for MemberSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberSession")
            .field("member_id", &self.member_id)
            .field("dealing", &self.polynomials.len())
            .field("shares", &self.shares.len())
            .finish_non_exhaustive()
    }
}
