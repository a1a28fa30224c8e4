//! Sparse fixed-height Poseidon Merkle tree
//!
//! A node whose children are both zero is itself zero, so an empty tree has a
//! zero root and a missing subtree is indistinguishable from an all-zero one.
//! Only non-zero nodes are stored.

use crate::errors::StorageError;
use crate::witness::MerkleWitness;
use crate::StorageResult;
use ark_ff::Zero;
use quorum_hash::{hash_two, Field};
use std::collections::{BTreeMap, HashMap};

/// Largest supported tree height
pub const MAX_HEIGHT: u8 = 32;

/// Parent hash under the zero-subtree convention
pub fn node_hash(left: &Field, right: &Field) -> Field {
    if left.is_zero() && right.is_zero() {
        Field::zero()
    } else {
        hash_two(left, right)
    }
}

/// Root of a tree of `height` whose leaves are `leaves[0..]` followed by zeros
pub fn subtree_root(height: u8, leaves: &[Field]) -> StorageResult<Field> {
    let mut tree = SparseMerkleTree::new(height)?;
    for (i, leaf) in leaves.iter().enumerate() {
        tree.set_leaf(i as u64, *leaf)?;
    }
    Ok(tree.root())
}

#[derive(Clone, Debug, PartialEq)]
pub struct SparseMerkleTree {
    height: u8,
    /// Non-zero nodes keyed by (level, position); level 0 holds leaves
    nodes: HashMap<(u8, u64), Field>,
}

impl SparseMerkleTree {
    pub fn new(height: u8) -> StorageResult<Self> {
        if height == 0 || height > MAX_HEIGHT {
            return Err(StorageError::InvalidLayout(format!(
                "tree height {} outside 1..={}",
                height, MAX_HEIGHT
            )));
        }
        Ok(Self {
            height,
            nodes: HashMap::new(),
        })
    }

    pub fn height(&self) -> u8 {
        self.height
    }

    pub fn capacity(&self) -> u64 {
        1u64 << self.height
    }

    pub fn root(&self) -> Field {
        self.node(self.height, 0)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn leaf(&self, index: u64) -> Field {
        self.node(0, index)
    }

    fn node(&self, level: u8, position: u64) -> Field {
        self.nodes
            .get(&(level, position))
            .copied()
            .unwrap_or_else(Field::zero)
    }

    fn put(&mut self, level: u8, position: u64, value: Field) {
        if value.is_zero() {
            self.nodes.remove(&(level, position));
        } else {
            self.nodes.insert((level, position), value);
        }
    }

    fn check_index(&self, index: u64) -> StorageResult<()> {
        if index >= self.capacity() {
            return Err(StorageError::IndexOutOfRange {
                index,
                capacity: self.capacity(),
            });
        }
        Ok(())
    }

    /// Write a leaf and recompute its path to the root
    pub fn set_leaf(&mut self, index: u64, value: Field) -> StorageResult<()> {
        self.check_index(index)?;

        self.put(0, index, value);
        let mut position = index;
        for level in 0..self.height {
            let left = self.node(level, position & !1);
            let right = self.node(level, position | 1);
            position >>= 1;
            self.put(level + 1, position, node_hash(&left, &right));
        }
        Ok(())
    }

    /// Sibling path for `index`, leaf level first
    pub fn witness(&self, index: u64) -> StorageResult<MerkleWitness> {
        self.check_index(index)?;

        let mut siblings = Vec::with_capacity(self.height as usize);
        let mut position = index;
        for level in 0..self.height {
            siblings.push(self.node(level, position ^ 1));
            position >>= 1;
        }
        Ok(MerkleWitness { siblings, index })
    }

    /// Non-zero leaves in index order
    pub fn leaves(&self) -> BTreeMap<u64, Field> {
        self.nodes
            .iter()
            .filter(|((level, _), _)| *level == 0)
            .map(|((_, position), value)| (*position, *value))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_root_is_zero() {
        let tree = SparseMerkleTree::new(8).unwrap();
        assert!(tree.root().is_zero());
        assert!(tree.is_empty());
    }

    #[test]
    fn test_invalid_height() {
        assert!(SparseMerkleTree::new(0).is_err());
        assert!(SparseMerkleTree::new(MAX_HEIGHT + 1).is_err());
    }

    #[test]
    fn test_set_and_clear_leaf() {
        let mut tree = SparseMerkleTree::new(4).unwrap();
        tree.set_leaf(5, Field::from(9u64)).unwrap();
        assert!(!tree.root().is_zero());
        assert_eq!(tree.leaf(5), Field::from(9u64));

        tree.set_leaf(5, Field::zero()).unwrap();
        assert!(tree.root().is_zero());
        assert!(tree.is_empty());
    }

    #[test]
    fn test_out_of_range() {
        let mut tree = SparseMerkleTree::new(2).unwrap();
        assert_eq!(
            tree.set_leaf(4, Field::from(1u64)),
            Err(StorageError::IndexOutOfRange { index: 4, capacity: 4 })
        );
        assert!(tree.witness(4).is_err());
    }

    #[test]
    fn test_root_matches_dense_computation() {
        let values: Vec<Field> = (1..=4u64).map(Field::from).collect();
        let expected = node_hash(
            &node_hash(&values[0], &values[1]),
            &node_hash(&values[2], &values[3]),
        );
        assert_eq!(subtree_root(2, &values).unwrap(), expected);
    }

    #[test]
    fn test_witness_recomputes_root() {
        let mut tree = SparseMerkleTree::new(6).unwrap();
        for i in [0u64, 3, 17, 63] {
            tree.set_leaf(i, Field::from(i + 100)).unwrap();
        }
        for i in [0u64, 3, 17, 63, 40] {
            let witness = tree.witness(i).unwrap();
            assert_eq!(witness.calculate_index(), i);
            assert_eq!(witness.calculate_root(&tree.leaf(i)), tree.root());
        }
    }
}
