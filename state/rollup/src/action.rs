//! Queued protocol actions

use crate::state::ActionCursor;
use crate::RollupResult;
use curve25519_dalek::ristretto::RistrettoPoint;
use quorum_elgamal::EncryptedVector;
use quorum_hash::{hash_bytes, Field};
use quorum_threshold::{ResponseContribution, Round1Contribution, Round2Contribution};
use serde::{Deserialize, Serialize};

/// One state-changing request. Immutable once queued; the rollup consumes
/// each exactly once, in queue order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    CreateCommittee {
        members: Vec<RistrettoPoint>,
        threshold: u64,
    },
    GenerateKey {
        committee_id: u64,
        key_id: u64,
    },
    ContributeRound1 {
        committee_id: u64,
        key_id: u64,
        member_id: u64,
        contribution: Round1Contribution,
    },
    FinalizeRound1 {
        committee_id: u64,
        key_id: u64,
        contributions: Vec<Round1Contribution>,
    },
    ContributeRound2 {
        committee_id: u64,
        key_id: u64,
        member_id: u64,
        contribution: Round2Contribution,
    },
    FinalizeRound2 {
        committee_id: u64,
        key_id: u64,
        contributions: Vec<Round2Contribution>,
    },
    DeprecateKey {
        committee_id: u64,
        key_id: u64,
    },
    SubmitEncryption {
        request_id: u64,
        committee_id: u64,
        key_id: u64,
        submission: EncryptedVector,
    },
    ContributeResponse {
        request_id: u64,
        member_id: u64,
        contribution: ResponseContribution,
    },
    ResolveRequest {
        request_id: u64,
        responders: Vec<u64>,
        result: Vec<u64>,
    },
}

impl Action {
    pub fn kind(&self) -> &'static str {
        match self {
            Action::CreateCommittee { .. } => "create_committee",
            Action::GenerateKey { .. } => "generate_key",
            Action::ContributeRound1 { .. } => "contribute_round1",
            Action::FinalizeRound1 { .. } => "finalize_round1",
            Action::ContributeRound2 { .. } => "contribute_round2",
            Action::FinalizeRound2 { .. } => "finalize_round2",
            Action::DeprecateKey { .. } => "deprecate_key",
            Action::SubmitEncryption { .. } => "submit_encryption",
            Action::ContributeResponse { .. } => "contribute_response",
            Action::ResolveRequest { .. } => "resolve_request",
        }
    }

    /// Canonical bincode encoding
    pub fn to_bytes(&self) -> RollupResult<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Field digest appended to the action hash chain
    pub fn digest(&self) -> RollupResult<Field> {
        Ok(hash_bytes(&self.to_bytes()?))
    }
}

/// An action as recorded by the substrate at dispatch time
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAction {
    pub action: Action,
    /// Position in the queue since genesis
    pub sequence: u64,
    /// Chain value after this action was appended
    pub cursor_after: ActionCursor,
}
