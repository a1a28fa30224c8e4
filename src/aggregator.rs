//! Aggregator
//!
//! The aggregator owns the storage mirror. It folds the substrate's queued
//! actions into a chain on a scratch copy of the mirror, commits the chain
//! through the substrate's compare-and-swap, and only then swaps the copy in.
//!
//! ```text
//!   pending_actions ──► witness_for ──► fold_one ──► mirror.apply ──► ...
//!                                           │
//!                              refused: fold_rejected (cursor only)
//!                                           ▼
//!                                  finalize (commit_root CAS)
//! ```
//!
//! A refused action is folded as a rejected step, so the commit drains it
//! and the actions behind it still apply. Only a broken queue hash chain
//! halts the build, leaving the rest queued.
//!
//! ```text
//! ```

use crate::context::ProtocolContext;
use crate::errors::{AggregatorError, AggregatorResult};
use curve25519_dalek::ristretto::RistrettoPoint;
use quorum_elgamal::recover_vector;
use quorum_hash::field_to_hex;
use quorum_rollup::{
    finalize, fold_one, fold_rejected, init, Action, Commitment, PartialProof, PendingAction,
    ProtocolStorage, RollupError, StepWitness, Substrate,
};
use quorum_threshold::{lagrange_coefficients, ThresholdError};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A folded but not yet committed chain
#[derive(Debug, Clone)]
pub struct ChainOutcome {
    pub proof: PartialProof,
    /// Mirror after every folded action
    pub mirror: ProtocolStorage,
    /// Actions the state refused; committing the chain drops them
    pub rejected: Vec<(PendingAction, RollupError)>,
    /// Action the chain could not extend past; it and everything behind it
    /// stay queued
    pub halted: Option<(PendingAction, RollupError)>,
}

impl ChainOutcome {
    pub fn applied(&self) -> usize {
        self.proof.applied()
    }
}

/// Result of one `process_pending` round
#[derive(Debug, Clone)]
pub struct ProcessReport {
    pub commitment: Commitment,
    pub applied: usize,
    pub rejected: Vec<(PendingAction, RollupError)>,
    pub halted: Option<(PendingAction, RollupError)>,
}

/// Fold every queued action onto `mirror`. Refused actions become rejected
/// steps; a broken queue chain stops the build.
pub fn build_chain_on<S: Substrate + ?Sized>(
    context: &ProtocolContext,
    substrate: &S,
    mut mirror: ProtocolStorage,
) -> AggregatorResult<ChainOutcome> {
    let committed = substrate.committed();
    let start = mirror.state();
    if start.commitment() != committed.root {
        return Err(AggregatorError::MirrorDiverged(format!(
            "mirror root {} differs from committed root {}",
            field_to_hex(&start.commitment()),
            field_to_hex(&committed.root)
        )));
    }

    let mut proof = init(start, committed.cursor);
    let mut rejected = Vec::new();
    let mut halted = None;

    for pending in substrate.pending_actions() {
        // Slots the mirror cannot address are refused by the transition too
        let (witness, unaddressable) = match mirror.witness_for(&pending.action) {
            Ok(witness) => (witness, None),
            Err(err) => (StepWitness::default(), Some(err)),
        };

        match fold_one(context.fold(), proof.clone(), &pending, &witness) {
            Ok(next) => {
                mirror.apply(&pending.action)?;
                if mirror.state() != next.state {
                    return Err(AggregatorError::MirrorDiverged(format!(
                        "replaying {} (sequence {}) did not reproduce the folded state",
                        pending.action.kind(),
                        pending.sequence
                    )));
                }
                proof = next;
            }
            Err(err @ RollupError::ChainVerificationFailed(_)) => {
                warn!(
                    "Stopping chain at {} (sequence {}): {}",
                    pending.action.kind(),
                    pending.sequence,
                    err
                );
                halted = Some((pending, err));
                break;
            }
            Err(_) => match fold_rejected(context.fold(), proof.clone(), &pending, &witness) {
                Ok((next, reason)) => {
                    let reason = unaddressable.unwrap_or(reason);
                    warn!(
                        "Rejected {} (sequence {}): {}",
                        pending.action.kind(),
                        pending.sequence,
                        reason
                    );
                    rejected.push((pending, reason));
                    proof = next;
                }
                Err(err) => {
                    warn!(
                        "Stopping chain at {} (sequence {}): {}",
                        pending.action.kind(),
                        pending.sequence,
                        err
                    );
                    halted = Some((pending, err));
                    break;
                }
            },
        }
    }

    debug!(
        "Built chain of {} steps, {} rejected",
        proof.len(),
        rejected.len()
    );
    Ok(ChainOutcome {
        proof,
        mirror,
        rejected,
        halted,
    })
}

pub struct Aggregator<S: Substrate> {
    context: ProtocolContext,
    substrate: Arc<S>,
    mirror: ProtocolStorage,
}

impl<S: Substrate + 'static> Aggregator<S> {
    /// Aggregator over a substrate still at its genesis root
    pub fn new(context: ProtocolContext, substrate: Arc<S>) -> AggregatorResult<Self> {
        let mirror = ProtocolStorage::new(context.rollup().clone())?;
        Self::with_mirror(context, substrate, mirror)
    }

    /// Resume from a previously saved mirror
    pub fn with_mirror(
        context: ProtocolContext,
        substrate: Arc<S>,
        mirror: ProtocolStorage,
    ) -> AggregatorResult<Self> {
        if mirror.config() != context.rollup() {
            return Err(AggregatorError::MirrorDiverged(
                "mirror was built with different limits".into(),
            ));
        }
        let committed = substrate.committed();
        if mirror.state().commitment() != committed.root {
            return Err(AggregatorError::MirrorDiverged(format!(
                "mirror does not match committed root at cursor {}",
                committed.cursor
            )));
        }
        Ok(Self {
            context,
            substrate,
            mirror,
        })
    }

    pub fn context(&self) -> &ProtocolContext {
        &self.context
    }

    pub fn substrate(&self) -> &Arc<S> {
        &self.substrate
    }

    pub fn mirror(&self) -> &ProtocolStorage {
        &self.mirror
    }

    pub fn queue(&self, action: Action) -> AggregatorResult<PendingAction> {
        Ok(self.substrate.queue_action(action)?)
    }

    /// Fold the queue on a copy of the mirror; no external effects
    pub fn build_chain(&self) -> AggregatorResult<ChainOutcome> {
        build_chain_on(&self.context, self.substrate.as_ref(), self.mirror.clone())
    }

    /// Same as [`Self::build_chain`] on a blocking worker. Dropping the
    /// future abandons the chain.
    pub async fn build_chain_async(&self) -> AggregatorResult<ChainOutcome> {
        let context = self.context.clone();
        let substrate = Arc::clone(&self.substrate);
        let mirror = self.mirror.clone();

        tokio::task::spawn_blocking(move || build_chain_on(&context, substrate.as_ref(), mirror))
            .await
            .map_err(|e| AggregatorError::TaskFailed(e.to_string()))?
    }

    /// Commit a chain and adopt its mirror
    pub fn commit(&mut self, outcome: ChainOutcome) -> AggregatorResult<Commitment> {
        let commitment = finalize(&outcome.proof, self.substrate.as_ref())?;
        self.mirror = outcome.mirror;
        info!(
            "Aggregator committed {} actions, next committee id {}",
            outcome.proof.applied(),
            self.mirror.next_committee_id()
        );
        Ok(commitment)
    }

    /// Build and commit in one go
    pub fn process_pending(&mut self) -> AggregatorResult<ProcessReport> {
        let outcome = self.build_chain()?;
        let applied = outcome.applied();
        let rejected = outcome.rejected.clone();
        let halted = outcome.halted.clone();
        let commitment = self.commit(outcome)?;
        Ok(ProcessReport {
            commitment,
            applied,
            rejected,
            halted,
        })
    }

    /// `FinalizeRound1` over every member's round-1 contribution
    pub fn finalize_round1_action(&self, committee_id: u64, key_id: u64) -> AggregatorResult<Action> {
        let size = self.committee_size(committee_id)?;
        let entries = self.mirror.round1_contributions(committee_id, key_id)?;
        let key_index = self.context.rollup().key_index(committee_id, key_id)?;
        let contributions = complete_round(1, key_index, size, entries)?;
        Ok(Action::FinalizeRound1 {
            committee_id,
            key_id,
            contributions,
        })
    }

    /// `FinalizeRound2` over every member's round-2 contribution
    pub fn finalize_round2_action(&self, committee_id: u64, key_id: u64) -> AggregatorResult<Action> {
        let size = self.committee_size(committee_id)?;
        let entries = self.mirror.round2_contributions(committee_id, key_id)?;
        let key_index = self.context.rollup().key_index(committee_id, key_id)?;
        let contributions = complete_round(2, key_index, size, entries)?;
        Ok(Action::FinalizeRound2 {
            committee_id,
            key_id,
            contributions,
        })
    }

    /// Decrypt a request from the first `T` recorded responses.
    /// Returns the responders used and the recovered values.
    pub fn recover_result(&self, request_id: u64) -> AggregatorResult<(Vec<u64>, Vec<u64>)> {
        let record = self
            .mirror
            .request(request_id)
            .ok_or(AggregatorError::UnknownRequest(request_id))?;
        let committee_id = self.context.rollup().committee_of(record.key_index);
        let setting = self
            .mirror
            .setting(committee_id)
            .ok_or(AggregatorError::UnknownCommittee(committee_id))?;
        let threshold = setting.threshold as usize;

        let responses = self.mirror.responses(request_id);
        if responses.len() < threshold {
            return Err(ThresholdError::InsufficientShares {
                got: responses.len(),
                need: threshold,
            }
            .into());
        }
        let chosen = &responses[..threshold];

        let responders: Vec<u64> = chosen.iter().map(|(member, _)| *member).collect();
        let indices: Vec<usize> = responders.iter().map(|m| *m as usize).collect();
        let lambdas = lagrange_coefficients(&indices, threshold)?;
        let partials: Vec<Vec<RistrettoPoint>> =
            chosen.iter().map(|(_, response)| response.d.clone()).collect();
        let combined = quorum_elgamal::combine_shares(&partials, &lambdas)?;
        let values = recover_vector(&record.accumulator, &combined, self.context.domain())?;

        debug!("Recovered request {} from members {:?}", request_id, responders);
        Ok((responders, values))
    }

    /// `ResolveRequest` carrying the locally recovered result
    pub fn resolve_action(&self, request_id: u64) -> AggregatorResult<Action> {
        let (responders, result) = self.recover_result(request_id)?;
        Ok(Action::ResolveRequest {
            request_id,
            responders,
            result,
        })
    }

    fn committee_size(&self, committee_id: u64) -> AggregatorResult<u64> {
        self.mirror
            .setting(committee_id)
            .map(|setting| setting.size)
            .ok_or(AggregatorError::UnknownCommittee(committee_id))
    }
}

/// Contributions ordered by member id, requiring one from every member
fn complete_round<T>(
    round: u8,
    key_index: u64,
    size: u64,
    entries: Vec<(u64, T)>,
) -> AggregatorResult<Vec<T>> {
    let got = entries.len();
    let complete = got as u64 == size
        && entries
            .iter()
            .enumerate()
            .all(|(position, (member, _))| *member == position as u64);
    if !complete {
        return Err(AggregatorError::IncompleteRound {
            round,
            key_index,
            got,
            need: size as usize,
        });
    }
    Ok(entries.into_iter().map(|(_, contribution)| contribution).collect())
}
