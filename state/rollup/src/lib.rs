//! QUORUM Action Rollup
//!
//! All committee state lives in off-chain commitment trees; the substrate
//! only stores one root and an action cursor. Queued actions are folded one
//! by one into a chain whose every step re-verifies the previous one, then
//! the whole chain is committed with a compare-and-swap on the cursor.
//!
//! # Flow
//! ```text
//!   queue_action ──► PendingAction { cursor_after }
//!                          │
//!   init(root, cursor) ──► fold_one ──► fold_one ──► ... ──► finalize
//!                          ▲ witness from ProtocolStorage      │
//!                                                    commit_root (CAS)
//! ```
//!
//! An action the state refuses is folded with `fold_rejected` instead: the
//! step moves the cursor and keeps the roots, so the commit drains it.

pub mod action;
pub mod chain;
pub mod encoding;
pub mod errors;
pub mod mirror;
pub mod records;
pub mod state;
pub mod substrate;
pub mod transition;
pub mod witness;

pub use action::{Action, PendingAction};
pub use chain::{
    finalize, fold_one, fold_rejected, init, PartialProof, ProofVerifier, StepRecord,
    TranscriptVerifier,
};
pub use errors::RollupError;
pub use mirror::{ProtocolSnapshot, ProtocolStorage};
pub use records::{CommitteeSetting, KeyStatus, RequestRecord, RequestStatus, StorageKind};
pub use state::{ActionCursor, Commitment, RollupState, StorageRoots};
pub use substrate::{LocalSubstrate, Substrate};
pub use transition::apply_action;
pub use witness::{StepHints, StepWitness, WitnessEntry};

use quorum_elgamal::PlaintextDomain;
use quorum_storage::{StorageLayout, SubtreePolicy, MAX_HEIGHT};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Result type for rollup operations
pub type RollupResult<T> = Result<T, RollupError>;

/// Tree shapes and index limits shared by the mirror and the fold chain
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupConfig {
    /// Level-1 height of committee-indexed storages
    pub committee_height: u8,
    /// Level-2 height of member-indexed subtrees
    pub member_height: u8,
    /// Level-1 height of key-indexed storages
    pub key_height: u8,
    /// Level-1 height of request-indexed storages
    pub request_height: u8,
    /// Keys per committee; `keyIndex = committeeId * keys_per_committee + keyId`
    pub keys_per_committee: u64,
    pub domain: PlaintextDomain,
}

impl Default for RollupConfig {
    fn default() -> Self {
        Self {
            committee_height: 8,
            member_height: 4,
            key_height: 12,
            request_height: 16,
            keys_per_committee: 16,
            domain: PlaintextDomain::default(),
        }
    }
}

impl RollupConfig {
    pub fn validate(&self) -> RollupResult<()> {
        for (name, height) in [
            ("committee_height", self.committee_height),
            ("member_height", self.member_height),
            ("key_height", self.key_height),
            ("request_height", self.request_height),
        ] {
            if height == 0 || height > MAX_HEIGHT {
                return Err(RollupError::InvalidConfig(format!(
                    "{} must be in 1..={}, got {}",
                    name, MAX_HEIGHT, height
                )));
            }
        }
        if self.keys_per_committee == 0 {
            return Err(RollupError::InvalidConfig(
                "keys_per_committee must be non-zero".into(),
            ));
        }
        let needed = (1u128 << self.committee_height) * self.keys_per_committee as u128;
        if needed > 1u128 << self.key_height {
            return Err(RollupError::InvalidConfig(format!(
                "{} committees x {} keys exceed key tree capacity {}",
                1u64 << self.committee_height,
                self.keys_per_committee,
                1u64 << self.key_height
            )));
        }
        if self.domain.unit == 0 {
            return Err(RollupError::InvalidConfig("plaintext unit must be non-zero".into()));
        }
        Ok(())
    }

    pub fn committee_capacity(&self) -> u64 {
        1u64 << self.committee_height
    }

    pub fn member_capacity(&self) -> u64 {
        1u64 << self.member_height
    }

    /// Flattened key index of `(committee_id, key_id)`
    pub fn key_index(&self, committee_id: u64, key_id: u64) -> RollupResult<u64> {
        if key_id >= self.keys_per_committee {
            return Err(RollupError::InvalidAction(format!(
                "key id {} exceeds {} keys per committee",
                key_id, self.keys_per_committee
            )));
        }
        if committee_id >= self.committee_capacity() {
            return Err(RollupError::InvalidAction(format!(
                "committee id {} exceeds capacity {}",
                committee_id,
                self.committee_capacity()
            )));
        }
        Ok(committee_id * self.keys_per_committee + key_id)
    }

    /// Committee owning a flattened key index
    pub fn committee_of(&self, key_index: u64) -> u64 {
        key_index / self.keys_per_committee
    }

    pub fn layout(&self, kind: StorageKind) -> StorageLayout {
        let (heights, policy) = match kind {
            StorageKind::Members => (
                vec![self.committee_height, self.member_height],
                SubtreePolicy::Explicit,
            ),
            StorageKind::Settings => (vec![self.committee_height], SubtreePolicy::Implicit),
            StorageKind::KeyStatus | StorageKind::PublicKeys => {
                (vec![self.key_height], SubtreePolicy::Implicit)
            }
            StorageKind::Round1 | StorageKind::Round2 => (
                vec![self.key_height, self.member_height],
                SubtreePolicy::Implicit,
            ),
            StorageKind::Requests => (vec![self.request_height], SubtreePolicy::Implicit),
            StorageKind::Responses => (
                vec![self.request_height, self.member_height],
                SubtreePolicy::Implicit,
            ),
        };
        StorageLayout { heights, policy }
    }
}

/// Explicit context threaded through every fold; replaces process-wide state
#[derive(Clone)]
pub struct FoldContext {
    pub config: RollupConfig,
    pub verifier: Arc<dyn ProofVerifier>,
}

impl FoldContext {
    /// Context with the transcript verifier
    pub fn new(config: RollupConfig) -> RollupResult<Self> {
        Self::with_verifier(config, Arc::new(TranscriptVerifier))
    }

    pub fn with_verifier(config: RollupConfig, verifier: Arc<dyn ProofVerifier>) -> RollupResult<Self> {
        config.validate()?;
        Ok(Self { config, verifier })
    }
}

impl fmt::Debug for FoldContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FoldContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
