//! Leaf encodings for each protocol storage

use crate::records::{CommitteeSetting, KeyStatus, RequestRecord};
use curve25519_dalek::ristretto::RistrettoPoint;
use once_cell::sync::Lazy;
use quorum_hash::{hash_bytes, hash_fields, Field};
use quorum_storage::LeafEncoding;
use quorum_threshold::{GroupCommitments, ResponseContribution, Round1Contribution, Round2Contribution};

static SEALED_LEAF: Lazy<Field> = Lazy::new(|| hash_bytes(b"quorum sealed contribution subtree"));

/// Level-1 leaf written over a consumed contribution subtree
pub fn sealed_leaf() -> Field {
    *SEALED_LEAF
}

fn point_leaf(point: &RistrettoPoint) -> Field {
    hash_bytes(point.compress().as_bytes())
}

pub struct MemberLeaf;

impl LeafEncoding for MemberLeaf {
    type Raw = RistrettoPoint;
    const NAME: &'static str = "members";

    fn calculate_leaf(raw: &RistrettoPoint) -> Field {
        point_leaf(raw)
    }
}

pub struct SettingLeaf;

impl LeafEncoding for SettingLeaf {
    type Raw = CommitteeSetting;
    const NAME: &'static str = "settings";

    fn calculate_leaf(raw: &CommitteeSetting) -> Field {
        hash_fields(&[Field::from(raw.threshold), Field::from(raw.size)])
    }
}

/// Status leaves are the status value itself, so `Empty` is the zero leaf
pub struct KeyStatusLeaf;

impl LeafEncoding for KeyStatusLeaf {
    type Raw = KeyStatus;
    const NAME: &'static str = "key_status";

    fn calculate_leaf(raw: &KeyStatus) -> Field {
        Field::from(raw.as_u64())
    }
}

pub struct Round1Leaf;

impl LeafEncoding for Round1Leaf {
    type Raw = Round1Contribution;
    const NAME: &'static str = "round1";

    fn calculate_leaf(raw: &Round1Contribution) -> Field {
        hash_bytes(&raw.to_bytes())
    }
}

pub struct Round2Leaf;

impl LeafEncoding for Round2Leaf {
    type Raw = Round2Contribution;
    const NAME: &'static str = "round2";

    fn calculate_leaf(raw: &Round2Contribution) -> Field {
        hash_bytes(&raw.to_bytes())
    }
}

/// Aggregate commitments; entry 0 is the group public key
pub struct PublicKeyLeaf;

impl LeafEncoding for PublicKeyLeaf {
    type Raw = GroupCommitments;
    const NAME: &'static str = "public_keys";

    fn calculate_leaf(raw: &GroupCommitments) -> Field {
        hash_bytes(&raw.to_bytes())
    }
}

pub struct RequestLeaf;

impl LeafEncoding for RequestLeaf {
    type Raw = RequestRecord;
    const NAME: &'static str = "requests";

    fn calculate_leaf(raw: &RequestRecord) -> Field {
        hash_bytes(&raw.to_bytes())
    }
}

pub struct ResponseLeaf;

impl LeafEncoding for ResponseLeaf {
    type Raw = ResponseContribution;
    const NAME: &'static str = "responses";

    fn calculate_leaf(raw: &ResponseContribution) -> Field {
        hash_bytes(&raw.to_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_ff::Zero;

    #[test]
    fn test_empty_status_is_zero_leaf() {
        assert!(KeyStatusLeaf::calculate_leaf(&KeyStatus::Empty).is_zero());
        assert!(!KeyStatusLeaf::calculate_leaf(&KeyStatus::Round1).is_zero());
    }

    #[test]
    fn test_setting_leaf_binds_both_fields() {
        let a = SettingLeaf::calculate_leaf(&CommitteeSetting { threshold: 2, size: 3 });
        let b = SettingLeaf::calculate_leaf(&CommitteeSetting { threshold: 3, size: 2 });
        assert_ne!(a, b);
    }

    #[test]
    fn test_sealed_leaf_is_stable() {
        assert_eq!(sealed_leaf(), sealed_leaf());
        assert!(!sealed_leaf().is_zero());
    }
}
