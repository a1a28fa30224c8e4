//! Committed rollup state and the action cursor

use crate::records::StorageKind;
use ark_ff::Zero;
use quorum_hash::{field_hex, field_to_hex, hash_fields, hash_two, Field};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Root of every protocol storage
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageRoots {
    #[serde(with = "field_hex")]
    pub members: Field,
    #[serde(with = "field_hex")]
    pub settings: Field,
    #[serde(with = "field_hex")]
    pub key_status: Field,
    #[serde(with = "field_hex")]
    pub round1: Field,
    #[serde(with = "field_hex")]
    pub round2: Field,
    #[serde(with = "field_hex")]
    pub public_keys: Field,
    #[serde(with = "field_hex")]
    pub requests: Field,
    #[serde(with = "field_hex")]
    pub responses: Field,
}

impl Default for StorageRoots {
    fn default() -> Self {
        Self {
            members: Field::zero(),
            settings: Field::zero(),
            key_status: Field::zero(),
            round1: Field::zero(),
            round2: Field::zero(),
            public_keys: Field::zero(),
            requests: Field::zero(),
            responses: Field::zero(),
        }
    }
}

impl StorageRoots {
    pub fn get(&self, kind: StorageKind) -> Field {
        match kind {
            StorageKind::Members => self.members,
            StorageKind::Settings => self.settings,
            StorageKind::KeyStatus => self.key_status,
            StorageKind::Round1 => self.round1,
            StorageKind::Round2 => self.round2,
            StorageKind::PublicKeys => self.public_keys,
            StorageKind::Requests => self.requests,
            StorageKind::Responses => self.responses,
        }
    }

    pub fn set(&mut self, kind: StorageKind, root: Field) {
        let slot = match kind {
            StorageKind::Members => &mut self.members,
            StorageKind::Settings => &mut self.settings,
            StorageKind::KeyStatus => &mut self.key_status,
            StorageKind::Round1 => &mut self.round1,
            StorageKind::Round2 => &mut self.round2,
            StorageKind::PublicKeys => &mut self.public_keys,
            StorageKind::Requests => &mut self.requests,
            StorageKind::Responses => &mut self.responses,
        };
        *slot = root;
    }
}

/// Everything the substrate commits to, as one root
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupState {
    pub roots: StorageRoots,
    pub next_committee_id: u64,
}

impl RollupState {
    /// Poseidon hash of all storage roots and the committee counter
    pub fn commitment(&self) -> Field {
        let mut inputs: Vec<Field> = StorageKind::ALL
            .iter()
            .map(|kind| self.roots.get(*kind))
            .collect();
        inputs.push(Field::from(self.next_committee_id));
        hash_fields(&inputs)
    }
}

/// Running hash over every dispatched action
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionCursor(#[serde(with = "field_hex")] pub Field);

impl ActionCursor {
    pub fn genesis() -> Self {
        Self(Field::zero())
    }

    /// `cursor' = H(cursor, digest)`
    pub fn advance(&self, action_digest: &Field) -> Self {
        Self(hash_two(&self.0, action_digest))
    }
}

impl Default for ActionCursor {
    fn default() -> Self {
        Self::genesis()
    }
}

impl fmt::Debug for ActionCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = field_to_hex(&self.0);
        write!(f, "ActionCursor({}..)", &hex[..16])
    }
}

impl fmt::Display for ActionCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", field_to_hex(&self.0))
    }
}

/// What the substrate holds after a successful commit
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    #[serde(with = "field_hex")]
    pub root: Field,
    pub cursor: ActionCursor,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roots_get_set() {
        let mut roots = StorageRoots::default();
        for (i, kind) in StorageKind::ALL.iter().enumerate() {
            roots.set(*kind, Field::from(i as u64 + 1));
        }
        for (i, kind) in StorageKind::ALL.iter().enumerate() {
            assert_eq!(roots.get(*kind), Field::from(i as u64 + 1));
        }
    }

    #[test]
    fn test_commitment_binds_counter() {
        let a = RollupState::default();
        let b = RollupState {
            next_committee_id: 1,
            ..a
        };
        assert_ne!(a.commitment(), b.commitment());
    }

    #[test]
    fn test_cursor_chain_is_order_sensitive() {
        let d1 = Field::from(1u64);
        let d2 = Field::from(2u64);
        let genesis = ActionCursor::genesis();
        assert_ne!(
            genesis.advance(&d1).advance(&d2),
            genesis.advance(&d2).advance(&d1)
        );
    }
}
