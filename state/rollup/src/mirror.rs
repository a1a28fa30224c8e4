//! Off-chain mirror of every protocol storage
//!
//! The mirror holds raw values and full trees, produces step witnesses for
//! queued actions, and replays accepted actions so its roots track the
//! fold chain.

use crate::action::Action;
use crate::encoding::{
    sealed_leaf, KeyStatusLeaf, MemberLeaf, PublicKeyLeaf, RequestLeaf, ResponseLeaf, Round1Leaf,
    Round2Leaf, SettingLeaf,
};
use crate::errors::RollupError;
use crate::records::{CommitteeSetting, KeyStatus, RequestRecord, RequestStatus, StorageKind};
use crate::state::{RollupState, StorageRoots};
use crate::witness::{StepHints, StepWitness, WitnessEntry};
use crate::{RollupConfig, RollupResult};
use curve25519_dalek::ristretto::RistrettoPoint;
use quorum_elgamal::EncryptedVector;
use quorum_storage::{IndexedStorage, LeafEncoding, StorageSnapshot};
use quorum_threshold::{
    aggregate_commitments, GroupCommitments, ResponseContribution, Round1Contribution, Round2Contribution,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn opening<E: LeafEncoding>(
    kind: StorageKind,
    storage: &IndexedStorage<E>,
    index: &[u64],
) -> Option<WitnessEntry> {
    // Unopenable slots (sealed, out of range) are left out; the transition
    // reports them when it needs them.
    let path = storage.get_witness(index).ok()?;
    let leaf = storage.leaf(index).ok()?;
    Some(WitnessEntry {
        storage: kind,
        index: index.to_vec(),
        leaf,
        path,
    })
}

#[derive(Clone, Debug)]
pub struct ProtocolStorage {
    config: RollupConfig,
    next_committee_id: u64,
    members: IndexedStorage<MemberLeaf>,
    settings: IndexedStorage<SettingLeaf>,
    key_status: IndexedStorage<KeyStatusLeaf>,
    round1: IndexedStorage<Round1Leaf>,
    round2: IndexedStorage<Round2Leaf>,
    public_keys: IndexedStorage<PublicKeyLeaf>,
    requests: IndexedStorage<RequestLeaf>,
    responses: IndexedStorage<ResponseLeaf>,
}

impl ProtocolStorage {
    pub fn new(config: RollupConfig) -> RollupResult<Self> {
        config.validate()?;
        Ok(Self {
            members: IndexedStorage::new(config.layout(StorageKind::Members))?,
            settings: IndexedStorage::new(config.layout(StorageKind::Settings))?,
            key_status: IndexedStorage::new(config.layout(StorageKind::KeyStatus))?,
            round1: IndexedStorage::new(config.layout(StorageKind::Round1))?,
            round2: IndexedStorage::new(config.layout(StorageKind::Round2))?,
            public_keys: IndexedStorage::new(config.layout(StorageKind::PublicKeys))?,
            requests: IndexedStorage::new(config.layout(StorageKind::Requests))?,
            responses: IndexedStorage::new(config.layout(StorageKind::Responses))?,
            next_committee_id: 0,
            config,
        })
    }

    pub fn config(&self) -> &RollupConfig {
        &self.config
    }

    pub fn next_committee_id(&self) -> u64 {
        self.next_committee_id
    }

    pub fn state(&self) -> RollupState {
        RollupState {
            roots: StorageRoots {
                members: self.members.root(),
                settings: self.settings.root(),
                key_status: self.key_status.root(),
                round1: self.round1.root(),
                round2: self.round2.root(),
                public_keys: self.public_keys.root(),
                requests: self.requests.root(),
                responses: self.responses.root(),
            },
            next_committee_id: self.next_committee_id,
        }
    }

    fn open(&self, kind: StorageKind, index: &[u64]) -> Option<WitnessEntry> {
        match kind {
            StorageKind::Members => opening(kind, &self.members, index),
            StorageKind::Settings => opening(kind, &self.settings, index),
            StorageKind::KeyStatus => opening(kind, &self.key_status, index),
            StorageKind::Round1 => opening(kind, &self.round1, index),
            StorageKind::Round2 => opening(kind, &self.round2, index),
            StorageKind::PublicKeys => opening(kind, &self.public_keys, index),
            StorageKind::Requests => opening(kind, &self.requests, index),
            StorageKind::Responses => opening(kind, &self.responses, index),
        }
    }

    /// Openings and hints `action` needs against the current roots
    pub fn witness_for(&self, action: &Action) -> RollupResult<StepWitness> {
        let mut wanted: Vec<(StorageKind, Vec<u64>)> = Vec::new();
        let mut hints = StepHints::default();

        match action {
            Action::CreateCommittee { .. } => {
                let id = self.next_committee_id;
                wanted.push((StorageKind::Settings, vec![id]));
                wanted.push((StorageKind::Members, vec![id]));
            }
            Action::GenerateKey { committee_id, key_id }
            | Action::DeprecateKey { committee_id, key_id } => {
                let key_index = self.config.key_index(*committee_id, *key_id)?;
                wanted.push((StorageKind::Settings, vec![*committee_id]));
                wanted.push((StorageKind::KeyStatus, vec![key_index]));
                hints.setting = self.setting(*committee_id);
            }
            Action::ContributeRound1 {
                committee_id,
                key_id,
                member_id,
                ..
            } => {
                let key_index = self.config.key_index(*committee_id, *key_id)?;
                wanted.push((StorageKind::KeyStatus, vec![key_index]));
                wanted.push((StorageKind::Settings, vec![*committee_id]));
                wanted.push((StorageKind::Round1, vec![key_index, *member_id]));
                hints.setting = self.setting(*committee_id);
            }
            Action::FinalizeRound1 { committee_id, key_id, .. } => {
                let key_index = self.config.key_index(*committee_id, *key_id)?;
                wanted.push((StorageKind::KeyStatus, vec![key_index]));
                wanted.push((StorageKind::Settings, vec![*committee_id]));
                wanted.push((StorageKind::Round1, vec![key_index]));
                wanted.push((StorageKind::PublicKeys, vec![key_index]));
                hints.setting = self.setting(*committee_id);
            }
            Action::ContributeRound2 {
                committee_id,
                key_id,
                member_id,
                ..
            } => {
                let key_index = self.config.key_index(*committee_id, *key_id)?;
                wanted.push((StorageKind::KeyStatus, vec![key_index]));
                wanted.push((StorageKind::Settings, vec![*committee_id]));
                wanted.push((StorageKind::Round2, vec![key_index, *member_id]));
                hints.setting = self.setting(*committee_id);
            }
            Action::FinalizeRound2 { committee_id, key_id, .. } => {
                let key_index = self.config.key_index(*committee_id, *key_id)?;
                wanted.push((StorageKind::KeyStatus, vec![key_index]));
                wanted.push((StorageKind::Settings, vec![*committee_id]));
                wanted.push((StorageKind::Round2, vec![key_index]));
                hints.setting = self.setting(*committee_id);
            }
            Action::SubmitEncryption {
                request_id,
                committee_id,
                key_id,
                ..
            } => {
                let key_index = self.config.key_index(*committee_id, *key_id)?;
                wanted.push((StorageKind::KeyStatus, vec![key_index]));
                wanted.push((StorageKind::Requests, vec![*request_id]));
                hints.request = self.request(*request_id).cloned();
            }
            Action::ContributeResponse {
                request_id,
                member_id,
                ..
            } => {
                wanted.push((StorageKind::Requests, vec![*request_id]));
                wanted.push((StorageKind::Responses, vec![*request_id, *member_id]));
                if let Some(record) = self.request(*request_id) {
                    let committee_id = self.config.committee_of(record.key_index);
                    wanted.push((StorageKind::Settings, vec![committee_id]));
                    wanted.push((StorageKind::PublicKeys, vec![record.key_index]));
                    hints.setting = self.setting(committee_id);
                    hints.key = self.public_keys.raw(&[record.key_index]).cloned();
                    hints.request = Some(record.clone());
                }
            }
            Action::ResolveRequest {
                request_id,
                responders,
                ..
            } => {
                wanted.push((StorageKind::Requests, vec![*request_id]));
                if let Some(record) = self.request(*request_id) {
                    let committee_id = self.config.committee_of(record.key_index);
                    wanted.push((StorageKind::Settings, vec![committee_id]));
                    hints.setting = self.setting(committee_id);
                    hints.request = Some(record.clone());
                }
                for responder in responders {
                    wanted.push((StorageKind::Responses, vec![*request_id, *responder]));
                    if let Some(response) = self.responses.raw(&[*request_id, *responder]) {
                        hints.responses.push(response.clone());
                    }
                }
            }
        }

        let mut entries: Vec<WitnessEntry> = Vec::with_capacity(wanted.len());
        for (kind, index) in wanted {
            if entries.iter().any(|e| e.storage == kind && e.index == index) {
                continue;
            }
            if let Some(entry) = self.open(kind, &index) {
                entries.push(entry);
            }
        }
        Ok(StepWitness { entries, hints })
    }

    /// Replay an accepted action on the mirror
    pub fn apply(&mut self, action: &Action) -> RollupResult<()> {
        match action {
            Action::CreateCommittee { members, threshold } => {
                let id = self.next_committee_id;
                let setting = CommitteeSetting {
                    threshold: *threshold,
                    size: members.len() as u64,
                };
                self.settings.update_raw_leaf(&[id], setting)?;
                self.members.replace_subtree(&[id], members.clone())?;
                self.next_committee_id = id + 1;
            }
            Action::GenerateKey { committee_id, key_id } => {
                self.set_status(*committee_id, *key_id, KeyStatus::Round1)?;
            }
            Action::ContributeRound1 {
                committee_id,
                key_id,
                member_id,
                contribution,
            } => {
                let key_index = self.config.key_index(*committee_id, *key_id)?;
                self.round1
                    .update_raw_leaf(&[key_index, *member_id], contribution.clone())?;
            }
            Action::FinalizeRound1 {
                committee_id,
                key_id,
                contributions,
            } => {
                let key_index = self.config.key_index(*committee_id, *key_id)?;
                let group = aggregate_commitments(contributions)?;
                self.round1.seal_prefix(&[key_index], sealed_leaf())?;
                self.public_keys.update_raw_leaf(&[key_index], group)?;
                self.set_status(*committee_id, *key_id, KeyStatus::Round2)?;
            }
            Action::ContributeRound2 {
                committee_id,
                key_id,
                member_id,
                contribution,
            } => {
                let key_index = self.config.key_index(*committee_id, *key_id)?;
                self.round2
                    .update_raw_leaf(&[key_index, *member_id], contribution.clone())?;
            }
            Action::FinalizeRound2 { committee_id, key_id, .. } => {
                let key_index = self.config.key_index(*committee_id, *key_id)?;
                self.round2.seal_prefix(&[key_index], sealed_leaf())?;
                self.set_status(*committee_id, *key_id, KeyStatus::Active)?;
            }
            Action::DeprecateKey { committee_id, key_id } => {
                self.set_status(*committee_id, *key_id, KeyStatus::Deprecated)?;
            }
            Action::SubmitEncryption {
                request_id,
                committee_id,
                key_id,
                submission,
            } => {
                let key_index = self.config.key_index(*committee_id, *key_id)?;
                let record = match self.request(*request_id) {
                    Some(existing) => {
                        let mut record = existing.clone();
                        record.accumulator.add_assign(submission)?;
                        record
                    }
                    None => RequestRecord::open(key_index, submission.clone()),
                };
                self.requests.update_raw_leaf(&[*request_id], record)?;
            }
            Action::ContributeResponse {
                request_id,
                member_id,
                contribution,
            } => {
                let mut record = self.expect_request(*request_id)?;
                self.responses
                    .update_raw_leaf(&[*request_id, *member_id], contribution.clone())?;
                record.status = RequestStatus::Responding;
                self.requests.update_raw_leaf(&[*request_id], record)?;
            }
            Action::ResolveRequest {
                request_id, result, ..
            } => {
                let mut record = self.expect_request(*request_id)?;
                record.status = RequestStatus::Resolved;
                record.result = Some(result.clone());
                self.requests.update_raw_leaf(&[*request_id], record)?;
            }
        }
        Ok(())
    }

    fn set_status(&mut self, committee_id: u64, key_id: u64, status: KeyStatus) -> RollupResult<()> {
        let key_index = self.config.key_index(committee_id, key_id)?;
        Ok(self.key_status.update_raw_leaf(&[key_index], status)?)
    }

    fn expect_request(&self, request_id: u64) -> RollupResult<RequestRecord> {
        self.request(request_id).cloned().ok_or_else(|| {
            RollupError::InvalidAction(format!("request {} is not open", request_id))
        })
    }

    /// Member public keys of a committee, by member id
    pub fn committee_members(&self, committee_id: u64) -> Vec<RistrettoPoint> {
        self.members
            .raws_under(&[committee_id])
            .into_iter()
            .map(|(_, point)| point)
            .collect()
    }

    pub fn setting(&self, committee_id: u64) -> Option<CommitteeSetting> {
        self.settings.raw(&[committee_id]).copied()
    }

    pub fn key_status(&self, committee_id: u64, key_id: u64) -> RollupResult<KeyStatus> {
        let key_index = self.config.key_index(committee_id, key_id)?;
        Ok(self
            .key_status
            .raw(&[key_index])
            .copied()
            .unwrap_or(KeyStatus::Empty))
    }

    pub fn round1_contributions(&self, committee_id: u64, key_id: u64) -> RollupResult<Vec<(u64, Round1Contribution)>> {
        let key_index = self.config.key_index(committee_id, key_id)?;
        Ok(self.round1.raws_under(&[key_index]))
    }

    pub fn round2_contributions(&self, committee_id: u64, key_id: u64) -> RollupResult<Vec<(u64, Round2Contribution)>> {
        let key_index = self.config.key_index(committee_id, key_id)?;
        Ok(self.round2.raws_under(&[key_index]))
    }

    pub fn public_key(&self, committee_id: u64, key_id: u64) -> RollupResult<Option<RistrettoPoint>> {
        let key_index = self.config.key_index(committee_id, key_id)?;
        Ok(self.public_keys.raw(&[key_index]).map(GroupCommitments::public_key))
    }

    pub fn request(&self, request_id: u64) -> Option<&RequestRecord> {
        self.requests.raw(&[request_id])
    }

    /// Accumulated ciphertext of a request
    pub fn accumulator(&self, request_id: u64) -> Option<&EncryptedVector> {
        self.request(request_id).map(|record| &record.accumulator)
    }

    pub fn responses(&self, request_id: u64) -> Vec<(u64, ResponseContribution)> {
        self.responses.raws_under(&[request_id])
    }

    pub fn snapshot(&self) -> ProtocolSnapshot {
        ProtocolSnapshot {
            config: self.config.clone(),
            next_committee_id: self.next_committee_id,
            members: self.members.snapshot(),
            settings: self.settings.snapshot(),
            key_status: self.key_status.snapshot(),
            round1: self.round1.snapshot(),
            round2: self.round2.snapshot(),
            public_keys: self.public_keys.snapshot(),
            requests: self.requests.snapshot(),
            responses: self.responses.snapshot(),
        }
    }

    pub fn from_snapshot(snapshot: ProtocolSnapshot) -> RollupResult<Self> {
        snapshot.config.validate()?;
        Ok(Self {
            config: snapshot.config,
            next_committee_id: snapshot.next_committee_id,
            members: IndexedStorage::from_snapshot(snapshot.members)?,
            settings: IndexedStorage::from_snapshot(snapshot.settings)?,
            key_status: IndexedStorage::from_snapshot(snapshot.key_status)?,
            round1: IndexedStorage::from_snapshot(snapshot.round1)?,
            round2: IndexedStorage::from_snapshot(snapshot.round2)?,
            public_keys: IndexedStorage::from_snapshot(snapshot.public_keys)?,
            requests: IndexedStorage::from_snapshot(snapshot.requests)?,
            responses: IndexedStorage::from_snapshot(snapshot.responses)?,
        })
    }

    /// Write the mirror as JSON
    pub fn save(&self, path: impl AsRef<Path>) -> RollupResult<()> {
        let json = serde_json::to_string_pretty(&self.snapshot())?;
        std::fs::write(path.as_ref(), json)
            .map_err(|e| RollupError::Serialization(format!("{}: {}", path.as_ref().display(), e)))
    }

    pub fn load(path: impl AsRef<Path>) -> RollupResult<Self> {
        let json = std::fs::read_to_string(path.as_ref())
            .map_err(|e| RollupError::Serialization(format!("{}: {}", path.as_ref().display(), e)))?;
        let snapshot: ProtocolSnapshot = serde_json::from_str(&json)?;
        Self::from_snapshot(snapshot)
    }
}

/// Persisted form of a `ProtocolStorage`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProtocolSnapshot {
    pub config: RollupConfig,
    pub next_committee_id: u64,
    pub members: StorageSnapshot<RistrettoPoint>,
    pub settings: StorageSnapshot<CommitteeSetting>,
    pub key_status: StorageSnapshot<KeyStatus>,
    pub round1: StorageSnapshot<Round1Contribution>,
    pub round2: StorageSnapshot<Round2Contribution>,
    pub public_keys: StorageSnapshot<GroupCommitments>,
    pub requests: StorageSnapshot<RequestRecord>,
    pub responses: StorageSnapshot<ResponseContribution>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transition::apply_action;
    use curve25519_dalek::scalar::Scalar;
    use quorum_elgamal::generator;
    use quorum_storage::StorageError;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn small_config() -> RollupConfig {
        RollupConfig {
            committee_height: 4,
            member_height: 3,
            key_height: 6,
            request_height: 6,
            keys_per_committee: 4,
            ..RollupConfig::default()
        }
    }

    fn create_action(size: usize, threshold: u64) -> Action {
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        let members = (0..size)
            .map(|_| generator() * Scalar::random(&mut rng))
            .collect();
        Action::CreateCommittee { members, threshold }
    }

    /// Fold `action` against the mirror's own witness and replay it
    fn step(mirror: &mut ProtocolStorage, action: &Action) -> RollupResult<RollupState> {
        let witness = mirror.witness_for(action)?;
        let next = apply_action(mirror.config(), &mirror.state(), action, &witness)?;
        mirror.apply(action)?;
        assert_eq!(mirror.state(), next);
        Ok(next)
    }

    #[test]
    fn test_create_and_generate_track_roots() {
        let mut mirror = ProtocolStorage::new(small_config()).unwrap();
        step(&mut mirror, &create_action(3, 2)).unwrap();
        assert_eq!(mirror.next_committee_id(), 1);
        assert_eq!(mirror.committee_members(0).len(), 3);
        assert_eq!(mirror.setting(0), Some(CommitteeSetting { threshold: 2, size: 3 }));

        step(&mut mirror, &Action::GenerateKey { committee_id: 0, key_id: 1 }).unwrap();
        assert_eq!(mirror.key_status(0, 1).unwrap(), KeyStatus::Round1);
        assert_eq!(mirror.key_status(0, 0).unwrap(), KeyStatus::Empty);
    }

    #[test]
    fn test_replayed_action_rejected() {
        let mut mirror = ProtocolStorage::new(small_config()).unwrap();
        step(&mut mirror, &create_action(3, 2)).unwrap();
        let generate = Action::GenerateKey { committee_id: 0, key_id: 0 };
        step(&mut mirror, &generate).unwrap();

        let witness = mirror.witness_for(&generate).unwrap();
        assert!(matches!(
            apply_action(mirror.config(), &mirror.state(), &generate, &witness),
            Err(RollupError::WitnessMismatch(_))
        ));
    }

    #[test]
    fn test_unknown_committee_rejected() {
        let mirror = ProtocolStorage::new(small_config()).unwrap();
        let generate = Action::GenerateKey { committee_id: 2, key_id: 0 };
        let witness = mirror.witness_for(&generate).unwrap();
        assert!(matches!(
            apply_action(mirror.config(), &mirror.state(), &generate, &witness),
            Err(RollupError::WitnessMismatch(_))
        ));
    }

    #[test]
    fn test_witness_from_other_state_rejected() {
        let mut mirror = ProtocolStorage::new(small_config()).unwrap();
        let stale = mirror.clone();
        step(&mut mirror, &create_action(3, 2)).unwrap();

        // Openings taken before the committee existed
        let generate = Action::GenerateKey { committee_id: 0, key_id: 0 };
        let witness = stale.witness_for(&generate).unwrap();
        assert!(matches!(
            apply_action(mirror.config(), &mirror.state(), &generate, &witness),
            Err(RollupError::WitnessMismatch(_))
        ));
    }

    #[test]
    fn test_members_tree_is_explicit() {
        let mut mirror = ProtocolStorage::new(small_config()).unwrap();
        assert_eq!(
            mirror.members.update_raw_leaf(&[0, 0], generator()),
            Err(StorageError::Level2TreeMissing { prefix: "0".into() })
        );
        step(&mut mirror, &create_action(2, 1)).unwrap();
        assert!(mirror.members.has_subtree(&[0]));
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let mut mirror = ProtocolStorage::new(small_config()).unwrap();
        step(&mut mirror, &create_action(3, 2)).unwrap();
        step(&mut mirror, &Action::GenerateKey { committee_id: 0, key_id: 2 }).unwrap();

        let json = serde_json::to_string(&mirror.snapshot()).unwrap();
        let snapshot: ProtocolSnapshot = serde_json::from_str(&json).unwrap();
        let restored = ProtocolStorage::from_snapshot(snapshot).unwrap();
        assert_eq!(restored.state(), mirror.state());
        assert_eq!(restored.key_status(0, 2).unwrap(), KeyStatus::Round1);
    }

    #[test]
    fn test_corrupted_snapshot_rejected() {
        let mut mirror = ProtocolStorage::new(small_config()).unwrap();
        step(&mut mirror, &create_action(3, 2)).unwrap();
        let mut snapshot = mirror.snapshot();
        snapshot.settings.level1_root = quorum_hash::Field::from(1u64);
        assert!(matches!(
            ProtocolStorage::from_snapshot(snapshot),
            Err(RollupError::Storage(StorageError::SnapshotMismatch(_)))
        ));
    }
}
