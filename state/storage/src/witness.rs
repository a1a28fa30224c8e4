//! Membership witnesses

use crate::tree::node_hash;
use quorum_hash::{field_hex_vec, Field};
use serde::{Deserialize, Serialize};

/// Sibling path through one tree level
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleWitness {
    /// Siblings from the leaf level upwards
    #[serde(with = "field_hex_vec")]
    pub siblings: Vec<Field>,
    pub index: u64,
}

impl MerkleWitness {
    pub fn height(&self) -> usize {
        self.siblings.len()
    }

    /// Root implied by placing `leaf` at this witness' position
    pub fn calculate_root(&self, leaf: &Field) -> Field {
        let mut current = *leaf;
        let mut position = self.index;
        for sibling in &self.siblings {
            current = if position & 1 == 0 {
                node_hash(&current, sibling)
            } else {
                node_hash(sibling, &current)
            };
            position >>= 1;
        }
        current
    }

    /// Leaf position encoded by the path directions
    pub fn calculate_index(&self) -> u64 {
        if self.siblings.len() >= 64 {
            return self.index;
        }
        self.index & ((1u64 << self.siblings.len()) - 1)
    }
}

/// Witness through every level of an indexed storage, innermost level first.
///
/// Taken at a prefix of a deeper storage, it has fewer levels and proves the
/// subtree root stored at that prefix.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedWitness {
    pub levels: Vec<MerkleWitness>,
}

impl IndexedWitness {
    pub fn calculate_root(&self, leaf: &Field) -> Field {
        self.levels
            .iter()
            .fold(*leaf, |current, level| level.calculate_root(&current))
    }

    /// Composite index, outermost level first
    pub fn calculate_index(&self) -> Vec<u64> {
        self.levels
            .iter()
            .rev()
            .map(MerkleWitness::calculate_index)
            .collect()
    }

    /// `leaf` sits at `index` under `root`
    pub fn verify(&self, root: &Field, index: &[u64], leaf: &Field) -> bool {
        self.calculate_index() == index && self.calculate_root(leaf) == *root
    }
}
