//! Fold chain
//!
//! A `PartialProof` accumulates `(initial state, current state, cursor)` and
//! a step transcript. Each `fold_one` re-verifies the proof it extends, so
//! the final proof attests to the whole run. The transcript tag stands in
//! for the recursive proof object; `ProofVerifier` is the black box that
//! accepts or rejects it.
//!
//! Each step checks, in order: the proof so far, the action's place in the
//! queue hash chain, the witness against the current roots, then applies the
//! transition. An action the state refuses is recorded as a rejected step:
//! the cursor moves past it and the roots stay put, so the queue drains.

use crate::action::PendingAction;
use crate::errors::RollupError;
use crate::state::{ActionCursor, Commitment, RollupState};
use crate::substrate::Substrate;
use crate::transition::apply_action;
use crate::witness::StepWitness;
use crate::{FoldContext, RollupResult};
use quorum_hash::{field_hex, hash_bytes, hash_fields, Field};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// One folded action
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    #[serde(with = "field_hex")]
    pub before: Field,
    #[serde(with = "field_hex")]
    pub action_digest: Field,
    #[serde(with = "field_hex")]
    pub after: Field,
    pub cursor_after: ActionCursor,
    /// Refused by the state; `after == before`
    #[serde(default)]
    pub rejected: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialProof {
    pub initial_state: RollupState,
    pub initial_cursor: ActionCursor,
    pub state: RollupState,
    pub cursor: ActionCursor,
    pub steps: Vec<StepRecord>,
    /// Running transcript hash over the initial state and every step
    #[serde(with = "field_hex")]
    pub tag: Field,
}

impl PartialProof {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Steps that changed the state
    pub fn applied(&self) -> usize {
        self.steps.iter().filter(|step| !step.rejected).count()
    }
}

fn init_domain() -> Field {
    hash_bytes(b"quorum fold chain v1")
}

fn initial_tag(state: &RollupState, cursor: &ActionCursor) -> Field {
    hash_fields(&[init_domain(), state.commitment(), cursor.0])
}

fn step_tag(tag: &Field, step: &StepRecord) -> Field {
    hash_fields(&[
        *tag,
        step.before,
        step.action_digest,
        step.after,
        step.cursor_after.0,
        Field::from(step.rejected as u64),
    ])
}

/// Accepts or rejects a partial proof
pub trait ProofVerifier: Send + Sync {
    fn verify(&self, proof: &PartialProof) -> bool;
}

/// Re-derives the transcript: steps chain root to root, cursors follow the
/// action digests, and the tag matches.
#[derive(Clone, Copy, Debug, Default)]
pub struct TranscriptVerifier;

impl ProofVerifier for TranscriptVerifier {
    fn verify(&self, proof: &PartialProof) -> bool {
        let mut tag = initial_tag(&proof.initial_state, &proof.initial_cursor);
        let mut root = proof.initial_state.commitment();
        let mut cursor = proof.initial_cursor;

        for step in &proof.steps {
            if step.before != root || step.cursor_after != cursor.advance(&step.action_digest) {
                return false;
            }
            if step.rejected && step.after != step.before {
                return false;
            }
            tag = step_tag(&tag, step);
            root = step.after;
            cursor = step.cursor_after;
        }

        root == proof.state.commitment() && cursor == proof.cursor && tag == proof.tag
    }
}

/// Empty chain starting at `state` / `cursor`
pub fn init(state: RollupState, cursor: ActionCursor) -> PartialProof {
    PartialProof {
        initial_state: state,
        initial_cursor: cursor,
        state,
        cursor,
        steps: Vec::new(),
        tag: initial_tag(&state, &cursor),
    }
}

/// Previous proof and queue position; returns the action digest and the
/// cursor after it
fn check_extends(
    ctx: &FoldContext,
    proof: &PartialProof,
    pending: &PendingAction,
) -> RollupResult<(Field, ActionCursor)> {
    if !ctx.verifier.verify(proof) {
        return Err(RollupError::ChainVerificationFailed(
            "previous proof rejected".into(),
        ));
    }

    let action_digest = pending.action.digest()?;
    let cursor_after = proof.cursor.advance(&action_digest);
    if cursor_after != pending.cursor_after {
        return Err(RollupError::ChainVerificationFailed(format!(
            "action {} (sequence {}) is not next in the queue",
            pending.action.kind(),
            pending.sequence
        )));
    }
    Ok((action_digest, cursor_after))
}

fn push_step(mut proof: PartialProof, step: StepRecord, state: RollupState) -> PartialProof {
    proof.tag = step_tag(&proof.tag, &step);
    proof.cursor = step.cursor_after;
    proof.steps.push(step);
    proof.state = state;
    proof
}

/// Extend `proof` by one queued action
pub fn fold_one(
    ctx: &FoldContext,
    proof: PartialProof,
    pending: &PendingAction,
    witness: &StepWitness,
) -> RollupResult<PartialProof> {
    let (action_digest, cursor_after) = check_extends(ctx, &proof, pending)?;
    let next_state = apply_action(&ctx.config, &proof.state, &pending.action, witness)?;

    let step = StepRecord {
        before: proof.state.commitment(),
        action_digest,
        after: next_state.commitment(),
        cursor_after,
        rejected: false,
    };
    debug!(
        "Folded {} (sequence {}) into chain of {}",
        pending.action.kind(),
        pending.sequence,
        proof.steps.len() + 1
    );
    Ok(push_step(proof, step, next_state))
}

/// Extend `proof` past a queued action the current state refuses, leaving
/// the state unchanged. Returns the refusal alongside the proof.
///
/// Fails with `InvalidAction` if the action would in fact apply, and with
/// `ChainVerificationFailed` if it is not next in the queue.
pub fn fold_rejected(
    ctx: &FoldContext,
    proof: PartialProof,
    pending: &PendingAction,
    witness: &StepWitness,
) -> RollupResult<(PartialProof, RollupError)> {
    let (action_digest, cursor_after) = check_extends(ctx, &proof, pending)?;
    let reason = match apply_action(&ctx.config, &proof.state, &pending.action, witness) {
        Ok(_) => {
            return Err(RollupError::InvalidAction(format!(
                "{} (sequence {}) applies cleanly and cannot be skipped",
                pending.action.kind(),
                pending.sequence
            )))
        }
        Err(reason) => reason,
    };

    let root = proof.state.commitment();
    let step = StepRecord {
        before: root,
        action_digest,
        after: root,
        cursor_after,
        rejected: true,
    };
    debug!(
        "Skipped {} (sequence {}): {}",
        pending.action.kind(),
        pending.sequence,
        reason
    );
    let state = proof.state;
    Ok((push_step(proof, step, state), reason))
}

/// Commit a finished chain through the substrate's compare-and-swap
pub fn finalize<S: Substrate + ?Sized>(proof: &PartialProof, substrate: &S) -> RollupResult<Commitment> {
    if !substrate.verify_proof(proof) {
        return Err(RollupError::ChainVerificationFailed(
            "substrate rejected the proof".into(),
        ));
    }

    let committed = substrate.committed();
    if committed.cursor != proof.initial_cursor
        || committed.root != proof.initial_state.commitment()
    {
        return Err(RollupError::StaleCursor(format!(
            "chain starts at {}, substrate is at {}",
            proof.initial_cursor, committed.cursor
        )));
    }

    let root = proof.state.commitment();
    if !substrate.commit_root(root, proof.initial_cursor, proof.cursor) {
        return Err(RollupError::StaleCursor(format!(
            "commit from {} lost the race",
            proof.initial_cursor
        )));
    }

    info!(
        "Committed {} actions ({} rejected), cursor {}",
        proof.applied(),
        proof.len() - proof.applied(),
        proof.cursor
    );
    Ok(Commitment {
        root,
        cursor: proof.cursor,
    })
}
