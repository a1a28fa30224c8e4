//! Per-step witnesses
//!
//! A step witness is a bag of storage openings against the roots the step
//! starts from, plus the raw values behind leaves the transition must read.
//! Every storage is written at most once per step, so a write's new root is
//! its opening's path recomputed with the new leaf.

use crate::records::{CommitteeSetting, RequestRecord, StorageKind};
use quorum_hash::{field_hex, Field};
use quorum_storage::{index_key, IndexedWitness};
use quorum_threshold::{GroupCommitments, ResponseContribution};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessEntry {
    pub storage: StorageKind,
    /// Full index or prefix
    pub index: Vec<u64>,
    /// Claimed current leaf at `index`
    #[serde(with = "field_hex")]
    pub leaf: Field,
    pub path: IndexedWitness,
}

impl WitnessEntry {
    pub fn describe(&self) -> String {
        format!("{}[{}]", self.storage.name(), index_key(&self.index))
    }
}

/// Raw values the transition needs to interpret leaves
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepHints {
    pub setting: Option<CommitteeSetting>,
    pub request: Option<RequestRecord>,
    /// Commitments behind a request's key, for checking response proofs
    #[serde(default)]
    pub key: Option<GroupCommitments>,
    /// Aligned with a resolve action's responders
    pub responses: Vec<ResponseContribution>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepWitness {
    pub entries: Vec<WitnessEntry>,
    pub hints: StepHints,
}

impl StepWitness {
    pub fn entry(&self, storage: StorageKind, index: &[u64]) -> Option<&WitnessEntry> {
        self.entries
            .iter()
            .find(|e| e.storage == storage && e.index == index)
    }
}
