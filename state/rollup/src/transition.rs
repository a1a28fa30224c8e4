//! Deterministic state transitions
//!
//! `apply_action` only sees roots and a step witness. Every read is an
//! opening against the pre-step root; every write replaces one leaf through
//! the same opening.

use crate::action::Action;
use crate::encoding::{
    sealed_leaf, KeyStatusLeaf, MemberLeaf, PublicKeyLeaf, RequestLeaf, ResponseLeaf, Round1Leaf,
    Round2Leaf, SettingLeaf,
};
use crate::errors::RollupError;
use crate::records::{CommitteeSetting, KeyStatus, RequestRecord, RequestStatus, StorageKind};
use crate::state::RollupState;
use crate::witness::{StepWitness, WitnessEntry};
use crate::{RollupConfig, RollupResult};
use ark_ff::Zero;
use curve25519_dalek::ristretto::RistrettoPoint;
use quorum_elgamal::combine_shares;
use quorum_hash::Field;
use quorum_storage::{index_key, subtree_root, LeafEncoding};
use quorum_threshold::{
    aggregate_commitments, lagrange_coefficients, verify_response, GroupCommitments, Round1Contribution,
    Round2Contribution,
};

struct Step<'a> {
    config: &'a RollupConfig,
    state: &'a RollupState,
    witness: &'a StepWitness,
    next: RollupState,
    written: Vec<StorageKind>,
}

impl<'a> Step<'a> {
    fn new(config: &'a RollupConfig, state: &'a RollupState, witness: &'a StepWitness) -> Self {
        Self {
            config,
            state,
            witness,
            next: *state,
            written: Vec::new(),
        }
    }

    fn open(&self, storage: StorageKind, index: &[u64]) -> RollupResult<&'a WitnessEntry> {
        let witness: &'a StepWitness = self.witness;
        let entry = witness.entry(storage, index).ok_or_else(|| {
            RollupError::WitnessMismatch(format!(
                "no opening for {}[{}]",
                storage.name(),
                index_key(index)
            ))
        })?;
        if !entry
            .path
            .verify(&self.state.roots.get(storage), index, &entry.leaf)
        {
            return Err(RollupError::WitnessMismatch(format!(
                "{} does not open against the current root",
                entry.describe()
            )));
        }
        Ok(entry)
    }

    fn read(&self, storage: StorageKind, index: &[u64]) -> RollupResult<Field> {
        Ok(self.open(storage, index)?.leaf)
    }

    fn read_empty(&self, storage: StorageKind, index: &[u64]) -> RollupResult<()> {
        if self.read(storage, index)?.is_zero() {
            Ok(())
        } else {
            Err(RollupError::DuplicateContribution {
                storage,
                index: index_key(index),
            })
        }
    }

    fn write(&mut self, storage: StorageKind, index: &[u64], leaf: Field) -> RollupResult<()> {
        if self.written.contains(&storage) {
            return Err(RollupError::WitnessMismatch(format!(
                "second write to {} in one step",
                storage.name()
            )));
        }
        let entry = self.open(storage, index)?;
        self.next.roots.set(storage, entry.path.calculate_root(&leaf));
        self.written.push(storage);
        Ok(())
    }

    fn expect_status(&self, key_index: u64, expected: KeyStatus) -> RollupResult<()> {
        let leaf = self.read(StorageKind::KeyStatus, &[key_index])?;
        if leaf != KeyStatusLeaf::calculate_leaf(&expected) {
            return Err(RollupError::WitnessMismatch(format!(
                "key {} is not in status {:?}",
                key_index, expected
            )));
        }
        Ok(())
    }

    fn set_status(&mut self, key_index: u64, status: KeyStatus) -> RollupResult<()> {
        self.write(
            StorageKind::KeyStatus,
            &[key_index],
            KeyStatusLeaf::calculate_leaf(&status),
        )
    }

    fn setting(&self, committee_id: u64) -> RollupResult<CommitteeSetting> {
        let leaf = self.read(StorageKind::Settings, &[committee_id])?;
        if leaf.is_zero() {
            return Err(RollupError::WitnessMismatch(format!(
                "committee {} does not exist",
                committee_id
            )));
        }
        let setting = self.witness.hints.setting.ok_or_else(|| {
            RollupError::WitnessMismatch("missing committee setting hint".into())
        })?;
        if SettingLeaf::calculate_leaf(&setting) != leaf {
            return Err(RollupError::WitnessMismatch(format!(
                "setting hint does not match committee {}",
                committee_id
            )));
        }
        Ok(setting)
    }

    fn request(&self, request_id: u64) -> RollupResult<RequestRecord> {
        let leaf = self.read(StorageKind::Requests, &[request_id])?;
        if leaf.is_zero() {
            return Err(RollupError::WitnessMismatch(format!(
                "request {} is not open",
                request_id
            )));
        }
        let record = self.witness.hints.request.clone().ok_or_else(|| {
            RollupError::WitnessMismatch("missing request record hint".into())
        })?;
        if RequestLeaf::calculate_leaf(&record) != leaf {
            return Err(RollupError::WitnessMismatch(format!(
                "request hint does not match request {}",
                request_id
            )));
        }
        Ok(record)
    }

    fn key_commitments(&self, key_index: u64) -> RollupResult<GroupCommitments> {
        let leaf = self.read(StorageKind::PublicKeys, &[key_index])?;
        if leaf.is_zero() {
            return Err(RollupError::WitnessMismatch(format!(
                "key {} has no public key",
                key_index
            )));
        }
        let group = self.witness.hints.key.clone().ok_or_else(|| {
            RollupError::WitnessMismatch("missing key commitments hint".into())
        })?;
        if PublicKeyLeaf::calculate_leaf(&group) != leaf {
            return Err(RollupError::WitnessMismatch(format!(
                "key hint does not match key {}",
                key_index
            )));
        }
        Ok(group)
    }

    fn member_index(&self, member_id: u64, setting: &CommitteeSetting) -> RollupResult<()> {
        if member_id >= setting.size {
            return Err(RollupError::InvalidContribution(format!(
                "member {} outside committee of {}",
                member_id, setting.size
            )));
        }
        Ok(())
    }

    fn rebuilt_subtree(&self, leaves: &[Field]) -> RollupResult<Field> {
        Ok(subtree_root(self.config.member_height, leaves)?)
    }
}

/// Check `action` against `witness` and return the state after it
pub fn apply_action(
    config: &RollupConfig,
    state: &RollupState,
    action: &Action,
    witness: &StepWitness,
) -> RollupResult<RollupState> {
    let mut step = Step::new(config, state, witness);

    match action {
        Action::CreateCommittee { members, threshold } => {
            create_committee(&mut step, members, *threshold)?
        }

        Action::GenerateKey { committee_id, key_id } => {
            let key_index = config.key_index(*committee_id, *key_id)?;
            step.setting(*committee_id)?;
            step.expect_status(key_index, KeyStatus::Empty)?;
            step.set_status(key_index, KeyStatus::Round1)?;
        }

        Action::ContributeRound1 {
            committee_id,
            key_id,
            member_id,
            contribution,
        } => {
            let key_index = config.key_index(*committee_id, *key_id)?;
            step.expect_status(key_index, KeyStatus::Round1)?;
            let setting = step.setting(*committee_id)?;
            step.member_index(*member_id, &setting)?;
            check_round1(contribution, &setting)?;

            let index = [key_index, *member_id];
            step.read_empty(StorageKind::Round1, &index)?;
            step.write(
                StorageKind::Round1,
                &index,
                Round1Leaf::calculate_leaf(contribution),
            )?;
        }

        Action::FinalizeRound1 {
            committee_id,
            key_id,
            contributions,
        } => {
            let key_index = config.key_index(*committee_id, *key_id)?;
            step.expect_status(key_index, KeyStatus::Round1)?;
            let setting = step.setting(*committee_id)?;
            check_count(contributions.len(), &setting)?;
            for contribution in contributions {
                check_round1(contribution, &setting)?;
            }

            let leaves: Vec<Field> = contributions.iter().map(Round1Leaf::calculate_leaf).collect();
            if step.rebuilt_subtree(&leaves)? != step.read(StorageKind::Round1, &[key_index])? {
                return Err(RollupError::WitnessMismatch(format!(
                    "contributions do not rebuild the round-1 tree of key {}",
                    key_index
                )));
            }
            let group = aggregate_commitments(contributions)?;
            step.read_empty(StorageKind::PublicKeys, &[key_index])?;

            step.write(StorageKind::Round1, &[key_index], sealed_leaf())?;
            step.write(
                StorageKind::PublicKeys,
                &[key_index],
                PublicKeyLeaf::calculate_leaf(&group),
            )?;
            step.set_status(key_index, KeyStatus::Round2)?;
        }

        Action::ContributeRound2 {
            committee_id,
            key_id,
            member_id,
            contribution,
        } => {
            let key_index = config.key_index(*committee_id, *key_id)?;
            step.expect_status(key_index, KeyStatus::Round2)?;
            let setting = step.setting(*committee_id)?;
            step.member_index(*member_id, &setting)?;
            check_round2(contribution, *member_id, &setting)?;

            let index = [key_index, *member_id];
            step.read_empty(StorageKind::Round2, &index)?;
            step.write(
                StorageKind::Round2,
                &index,
                Round2Leaf::calculate_leaf(contribution),
            )?;
        }

        Action::FinalizeRound2 {
            committee_id,
            key_id,
            contributions,
        } => {
            let key_index = config.key_index(*committee_id, *key_id)?;
            step.expect_status(key_index, KeyStatus::Round2)?;
            let setting = step.setting(*committee_id)?;
            check_count(contributions.len(), &setting)?;
            for (dealer, contribution) in contributions.iter().enumerate() {
                check_round2(contribution, dealer as u64, &setting)?;
            }

            let leaves: Vec<Field> = contributions.iter().map(Round2Leaf::calculate_leaf).collect();
            if step.rebuilt_subtree(&leaves)? != step.read(StorageKind::Round2, &[key_index])? {
                return Err(RollupError::WitnessMismatch(format!(
                    "contributions do not rebuild the round-2 tree of key {}",
                    key_index
                )));
            }
            step.write(StorageKind::Round2, &[key_index], sealed_leaf())?;
            step.set_status(key_index, KeyStatus::Active)?;
        }

        Action::DeprecateKey { committee_id, key_id } => {
            let key_index = config.key_index(*committee_id, *key_id)?;
            step.expect_status(key_index, KeyStatus::Active)?;
            step.set_status(key_index, KeyStatus::Deprecated)?;
        }

        Action::SubmitEncryption {
            request_id,
            committee_id,
            key_id,
            submission,
        } => {
            let key_index = config.key_index(*committee_id, *key_id)?;
            step.expect_status(key_index, KeyStatus::Active)?;
            submission.validate()?;

            let leaf = step.read(StorageKind::Requests, &[*request_id])?;
            let record = if leaf.is_zero() {
                RequestRecord::open(key_index, submission.clone())
            } else {
                let mut record = step.request(*request_id)?;
                if record.status != RequestStatus::Accumulating {
                    return Err(RollupError::WitnessMismatch(format!(
                        "request {} no longer accepts submissions",
                        request_id
                    )));
                }
                if record.key_index != key_index {
                    return Err(RollupError::InvalidAction(format!(
                        "request {} is bound to key {}",
                        request_id, record.key_index
                    )));
                }
                record.accumulator.add_assign(submission)?;
                record
            };
            step.write(
                StorageKind::Requests,
                &[*request_id],
                RequestLeaf::calculate_leaf(&record),
            )?;
        }

        Action::ContributeResponse {
            request_id,
            member_id,
            contribution,
        } => {
            let mut record = step.request(*request_id)?;
            if record.status == RequestStatus::Resolved {
                return Err(RollupError::WitnessMismatch(format!(
                    "request {} is already resolved",
                    request_id
                )));
            }
            let setting = step.setting(config.committee_of(record.key_index))?;
            step.member_index(*member_id, &setting)?;
            if contribution.dimension() != record.dimension() {
                return Err(RollupError::InvalidContribution(format!(
                    "response has {} dimensions, request has {}",
                    contribution.dimension(),
                    record.dimension()
                )));
            }
            let group = step.key_commitments(record.key_index)?;
            let verification_key = group.verification_key(*member_id as usize);
            if !verify_response(&verification_key, &record.accumulator.r, contribution) {
                return Err(RollupError::InvalidContribution(format!(
                    "response of member {} fails its decryption proof",
                    member_id
                )));
            }

            let index = [*request_id, *member_id];
            step.read_empty(StorageKind::Responses, &index)?;
            step.write(
                StorageKind::Responses,
                &index,
                ResponseLeaf::calculate_leaf(contribution),
            )?;

            record.status = RequestStatus::Responding;
            step.write(
                StorageKind::Requests,
                &[*request_id],
                RequestLeaf::calculate_leaf(&record),
            )?;
        }

        Action::ResolveRequest {
            request_id,
            responders,
            result,
        } => resolve_request(&mut step, *request_id, responders, result)?,
    }

    Ok(step.next)
}

fn create_committee(step: &mut Step<'_>, members: &[RistrettoPoint], threshold: u64) -> RollupResult<()> {
    let config = step.config;
    let committee_id = step.state.next_committee_id;
    let size = members.len() as u64;

    if committee_id >= config.committee_capacity() {
        return Err(RollupError::InvalidAction(format!(
            "committee capacity {} exhausted",
            config.committee_capacity()
        )));
    }
    if size == 0 || size > config.member_capacity() {
        return Err(RollupError::InvalidAction(format!(
            "committee size {} outside 1..={}",
            size,
            config.member_capacity()
        )));
    }
    if threshold == 0 || threshold > size {
        return Err(RollupError::InvalidAction(format!(
            "threshold {} outside 1..={}",
            threshold, size
        )));
    }

    step.read_empty(StorageKind::Settings, &[committee_id])?;
    step.read_empty(StorageKind::Members, &[committee_id])?;

    let setting = CommitteeSetting { threshold, size };
    let member_leaves: Vec<Field> = members.iter().map(MemberLeaf::calculate_leaf).collect();
    let members_root = step.rebuilt_subtree(&member_leaves)?;

    step.write(
        StorageKind::Settings,
        &[committee_id],
        SettingLeaf::calculate_leaf(&setting),
    )?;
    step.write(StorageKind::Members, &[committee_id], members_root)?;
    step.next.next_committee_id = committee_id + 1;
    Ok(())
}

fn resolve_request(
    step: &mut Step<'_>,
    request_id: u64,
    responders: &[u64],
    result: &[u64],
) -> RollupResult<()> {
    let config = step.config;
    let mut record = step.request(request_id)?;
    if record.status != RequestStatus::Responding {
        return Err(RollupError::WitnessMismatch(format!(
            "request {} is not collecting responses",
            request_id
        )));
    }
    let setting = step.setting(config.committee_of(record.key_index))?;
    for responder in responders {
        step.member_index(*responder, &setting)?;
    }
    let indices: Vec<usize> = responders.iter().map(|r| *r as usize).collect();
    let lambdas = lagrange_coefficients(&indices, setting.threshold as usize)?;

    let witness: &StepWitness = step.witness;
    let responses = &witness.hints.responses;
    if responses.len() != responders.len() {
        return Err(RollupError::WitnessMismatch(format!(
            "{} response hints for {} responders",
            responses.len(),
            responders.len()
        )));
    }
    let dimension = record.dimension();
    for (responder, response) in responders.iter().zip(responses) {
        let leaf = step.read(StorageKind::Responses, &[request_id, *responder])?;
        if leaf.is_zero() || ResponseLeaf::calculate_leaf(response) != leaf {
            return Err(RollupError::WitnessMismatch(format!(
                "response of member {} to request {} does not match",
                responder, request_id
            )));
        }
        if response.dimension() != dimension {
            return Err(RollupError::InvalidContribution(format!(
                "response of member {} has {} dimensions",
                responder,
                response.dimension()
            )));
        }
    }
    if result.len() != dimension {
        return Err(RollupError::InvalidContribution(format!(
            "result has {} values, request has {} dimensions",
            result.len(),
            dimension
        )));
    }

    let partials: Vec<Vec<RistrettoPoint>> = responses.iter().map(|r| r.d.clone()).collect();
    let combined = combine_shares(&partials, &lambdas)?;
    for (k, value) in result.iter().enumerate() {
        if config.domain.encode_point(*value) + combined[k] != record.accumulator.m[k] {
            return Err(RollupError::InvalidContribution(format!(
                "claimed value {} does not decrypt dimension {}",
                value, k
            )));
        }
    }

    record.status = RequestStatus::Resolved;
    record.result = Some(result.to_vec());
    step.write(
        StorageKind::Requests,
        &[request_id],
        RequestLeaf::calculate_leaf(&record),
    )
}

fn check_count(count: usize, setting: &CommitteeSetting) -> RollupResult<()> {
    if count as u64 != setting.size {
        return Err(RollupError::InvalidContribution(format!(
            "{} contributions for committee of {}",
            count, setting.size
        )));
    }
    Ok(())
}

fn check_round1(contribution: &Round1Contribution, setting: &CommitteeSetting) -> RollupResult<()> {
    if contribution.commitments.len() as u64 != setting.threshold {
        return Err(RollupError::InvalidContribution(format!(
            "round-1 contribution has {} commitments, threshold is {}",
            contribution.commitments.len(),
            setting.threshold
        )));
    }
    Ok(())
}

fn check_round2(
    contribution: &Round2Contribution,
    member_id: u64,
    setting: &CommitteeSetting,
) -> RollupResult<()> {
    if contribution.encrypted_shares.len() as u64 != setting.size {
        return Err(RollupError::InvalidContribution(format!(
            "round-2 contribution has {} shares, committee has {}",
            contribution.encrypted_shares.len(),
            setting.size
        )));
    }
    for (slot, share) in contribution.encrypted_shares.iter().enumerate() {
        if share.is_sentinel() != (slot as u64 == member_id) {
            return Err(RollupError::InvalidContribution(format!(
                "round-2 slot {} of member {} has the wrong sentinel state",
                slot, member_id
            )));
        }
    }
    Ok(())
}
