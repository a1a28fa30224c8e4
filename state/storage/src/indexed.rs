//! Indexed commitment storage
//!
//! An `IndexedStorage` nests sparse trees: the level-1 tree is keyed by the
//! first index component, and each of its leaves is either a plain leaf
//! (arity 1) or the root of a subtree keyed by the next component. Subtrees
//! are addressed by their index prefix.

use crate::errors::StorageError;
use crate::tree::{SparseMerkleTree, MAX_HEIGHT};
use crate::witness::{IndexedWitness, MerkleWitness};
use crate::StorageResult;
use ark_ff::Zero;
use quorum_hash::Field;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

/// Leaf hashing for one kind of stored value
pub trait LeafEncoding {
    type Raw: Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned;

    /// Short name used in logs and snapshots
    const NAME: &'static str;

    fn calculate_leaf(raw: &Self::Raw) -> Field;
}

/// Field elements stored as-is
#[derive(Clone, Copy, Debug)]
pub struct FieldLeaf;

impl LeafEncoding for FieldLeaf {
    type Raw = u64;
    const NAME: &'static str = "field";

    fn calculate_leaf(raw: &u64) -> Field {
        Field::from(*raw)
    }
}

/// How subtree operations treat a prefix that has no tree yet
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubtreePolicy {
    /// Missing subtrees are created empty on demand
    Implicit,
    /// Subtrees must be created (or replaced) before use
    Explicit,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageLayout {
    /// Tree height per level, outermost first; the length is the index arity
    pub heights: Vec<u8>,
    pub policy: SubtreePolicy,
}

impl StorageLayout {
    pub fn new(heights: Vec<u8>, policy: SubtreePolicy) -> StorageResult<Self> {
        if heights.is_empty() || heights.len() > 3 {
            return Err(StorageError::InvalidLayout(format!(
                "arity {} outside 1..=3",
                heights.len()
            )));
        }
        if let Some(h) = heights.iter().find(|h| **h == 0 || **h > MAX_HEIGHT) {
            return Err(StorageError::InvalidLayout(format!("tree height {}", h)));
        }
        Ok(Self { heights, policy })
    }

    pub fn arity(&self) -> usize {
        self.heights.len()
    }

    /// Number of slots at `level` (zero-based)
    pub fn capacity(&self, level: usize) -> u64 {
        1u64 << self.heights[level]
    }
}

/// Stored leaf with its optional raw preimage
#[derive(Clone, Debug, PartialEq)]
pub struct LeafEntry<R> {
    pub raw: Option<R>,
    pub leaf: Field,
}

/// Render an index path as `"a.b.c"`
pub fn index_key(index: &[u64]) -> String {
    index
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

/// Parse `"a.b.c"` back into an index path
pub fn parse_index_key(key: &str) -> StorageResult<Vec<u64>> {
    key.split('.')
        .map(|part| {
            part.parse::<u64>()
                .map_err(|e| StorageError::Serialization(format!("index {:?}: {}", key, e)))
        })
        .collect()
}

pub struct IndexedStorage<E: LeafEncoding> {
    layout: StorageLayout,
    level1: SparseMerkleTree,
    subtrees: BTreeMap<Vec<u64>, SparseMerkleTree>,
    leaves: BTreeMap<Vec<u64>, LeafEntry<E::Raw>>,
    sealed: BTreeMap<Vec<u64>, Field>,
    _encoding: PhantomData<E>,
}

impl<E: LeafEncoding> Clone for IndexedStorage<E> {
    fn clone(&self) -> Self {
        Self {
            layout: self.layout.clone(),
            level1: self.level1.clone(),
            subtrees: self.subtrees.clone(),
            leaves: self.leaves.clone(),
            sealed: self.sealed.clone(),
            _encoding: PhantomData,
        }
    }
}

impl<E: LeafEncoding> fmt::Debug for IndexedStorage<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexedStorage")
            .field("kind", &E::NAME)
            .field("arity", &self.layout.arity())
            .field("root", &quorum_hash::field_to_hex(&self.root()))
            .field("leaves", &self.leaves.len())
            .field("sealed", &self.sealed.len())
            .finish()
    }
}

impl<E: LeafEncoding> IndexedStorage<E> {
    pub fn new(layout: StorageLayout) -> StorageResult<Self> {
        let layout = StorageLayout::new(layout.heights, layout.policy)?;
        Ok(Self {
            level1: SparseMerkleTree::new(layout.heights[0])?,
            layout,
            subtrees: BTreeMap::new(),
            leaves: BTreeMap::new(),
            sealed: BTreeMap::new(),
            _encoding: PhantomData,
        })
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    pub fn arity(&self) -> usize {
        self.layout.arity()
    }

    pub fn root(&self) -> Field {
        self.level1.root()
    }

    /// Leaf hash at a full index or a prefix (the subtree root or its seal)
    pub fn leaf(&self, index: &[u64]) -> StorageResult<Field> {
        self.check_index(index, true)?;
        if let Some(sentinel) = self.sealed.get(index) {
            return Ok(*sentinel);
        }
        if let Some(prefix) = self.sealed_prefix_of(index) {
            return Err(StorageError::Sealed { prefix: index_key(prefix) });
        }
        let (prefix, last) = index.split_at(index.len() - 1);
        let tree = if prefix.is_empty() {
            Some(&self.level1)
        } else {
            self.subtrees.get(prefix)
        };
        Ok(tree.map(|t| t.leaf(last[0])).unwrap_or_else(Field::zero))
    }

    /// Raw preimage at a full index, when one was written
    pub fn raw(&self, index: &[u64]) -> Option<&E::Raw> {
        self.leaves.get(index).and_then(|entry| entry.raw.as_ref())
    }

    /// Every non-zero full-index leaf, in index order
    pub fn entries(&self) -> impl Iterator<Item = (&Vec<u64>, &LeafEntry<E::Raw>)> {
        self.leaves.iter()
    }

    /// Raw values stored under a prefix, ordered by their last index component
    pub fn raws_under(&self, prefix: &[u64]) -> Vec<(u64, E::Raw)> {
        self.leaves
            .iter()
            .filter(|(index, _)| index.len() == prefix.len() + 1 && index.starts_with(prefix))
            .filter_map(|(index, entry)| entry.raw.clone().map(|raw| (index[prefix.len()], raw)))
            .collect()
    }

    pub fn is_sealed(&self, index: &[u64]) -> bool {
        self.sealed_prefix_of(index).is_some()
    }

    pub fn has_subtree(&self, prefix: &[u64]) -> bool {
        self.subtrees.contains_key(prefix)
    }

    /// Witness for a full index or a prefix
    pub fn get_witness(&self, index: &[u64]) -> StorageResult<IndexedWitness> {
        self.check_index(index, true)?;
        if let Some(prefix) = self.sealed_prefix_of(index) {
            if prefix.len() < index.len() {
                return Err(StorageError::Sealed { prefix: index_key(prefix) });
            }
        }

        let mut levels = Vec::with_capacity(index.len());
        for depth in (0..index.len()).rev() {
            let prefix = &index[..depth];
            let position = index[depth];
            let witness = if depth == 0 {
                self.level1.witness(position)?
            } else {
                match self.subtrees.get(prefix) {
                    Some(tree) => tree.witness(position)?,
                    None => self.missing_subtree_witness(prefix, depth, position)?,
                }
            };
            levels.push(witness);
        }
        Ok(IndexedWitness { levels })
    }

    fn missing_subtree_witness(
        &self,
        prefix: &[u64],
        depth: usize,
        position: u64,
    ) -> StorageResult<MerkleWitness> {
        if self.layout.policy == SubtreePolicy::Explicit {
            return Err(StorageError::Level2TreeMissing {
                prefix: index_key(prefix),
            });
        }
        SparseMerkleTree::new(self.layout.heights[depth])?.witness(position)
    }

    /// Create an empty subtree at `prefix`; a no-op if it already exists
    pub fn create_subtree(&mut self, prefix: &[u64]) -> StorageResult<()> {
        self.check_prefix(prefix)?;
        self.ensure_unsealed(prefix)?;
        if !self.subtrees.contains_key(prefix) {
            let tree = SparseMerkleTree::new(self.layout.heights[prefix.len()])?;
            self.subtrees.insert(prefix.to_vec(), tree);
        }
        Ok(())
    }

    /// Set the leaf hash at a full index, dropping any raw preimage
    pub fn update_leaf(&mut self, index: &[u64], leaf: Field) -> StorageResult<()> {
        self.write(index, LeafEntry { raw: None, leaf })
    }

    /// Store a raw value and its leaf hash at a full index
    pub fn update_raw_leaf(&mut self, index: &[u64], raw: E::Raw) -> StorageResult<()> {
        let leaf = E::calculate_leaf(&raw);
        self.write(index, LeafEntry { raw: Some(raw), leaf })
    }

    fn write(&mut self, index: &[u64], entry: LeafEntry<E::Raw>) -> StorageResult<()> {
        self.check_index(index, false)?;
        self.ensure_unsealed(index)?;

        let (prefix, last) = index.split_at(index.len() - 1);
        if !prefix.is_empty() && !self.subtrees.contains_key(prefix) {
            if self.layout.policy == SubtreePolicy::Explicit {
                return Err(StorageError::Level2TreeMissing {
                    prefix: index_key(prefix),
                });
            }
            for depth in 1..=prefix.len() {
                self.create_subtree(&prefix[..depth])?;
            }
        }

        if prefix.is_empty() {
            self.level1.set_leaf(last[0], entry.leaf)?;
        } else if let Some(tree) = self.subtrees.get_mut(prefix) {
            tree.set_leaf(last[0], entry.leaf)?;
        }

        if entry.leaf.is_zero() && entry.raw.is_none() {
            self.leaves.remove(index);
        } else {
            self.leaves.insert(index.to_vec(), entry);
        }
        self.propagate(prefix)
    }

    /// Push subtree roots up from `prefix` to the level-1 tree
    fn propagate(&mut self, prefix: &[u64]) -> StorageResult<()> {
        for depth in (1..=prefix.len()).rev() {
            let child = &prefix[..depth];
            let root = self
                .subtrees
                .get(child)
                .map(SparseMerkleTree::root)
                .unwrap_or_else(Field::zero);
            let (parent, last) = child.split_at(depth - 1);
            if parent.is_empty() {
                self.level1.set_leaf(last[0], root)?;
            } else {
                self.subtree_mut(parent)?.set_leaf(last[0], root)?;
            }
        }
        Ok(())
    }

    fn subtree_mut(&mut self, prefix: &[u64]) -> StorageResult<&mut SparseMerkleTree> {
        if !self.subtrees.contains_key(prefix) {
            let tree = SparseMerkleTree::new(self.layout.heights[prefix.len()])?;
            self.subtrees.insert(prefix.to_vec(), tree);
        }
        self.subtrees
            .get_mut(prefix)
            .ok_or_else(|| StorageError::Level2TreeMissing {
                prefix: index_key(prefix),
            })
    }

    /// Replace the whole subtree under `prefix` with `raws` at positions `0..`
    pub fn replace_subtree(&mut self, prefix: &[u64], raws: Vec<E::Raw>) -> StorageResult<()> {
        self.check_prefix(prefix)?;
        if prefix.len() + 1 != self.arity() {
            return Err(StorageError::ArityMismatch {
                expected: self.arity() - 1,
                got: prefix.len(),
            });
        }
        self.ensure_unsealed(prefix)?;
        let capacity = self.layout.capacity(prefix.len());
        if raws.len() as u64 > capacity {
            return Err(StorageError::IndexOutOfRange {
                index: raws.len() as u64 - 1,
                capacity,
            });
        }

        self.leaves
            .retain(|index, _| !(index.len() > prefix.len() && index.starts_with(prefix)));
        let mut tree = SparseMerkleTree::new(self.layout.heights[prefix.len()])?;
        for (position, raw) in raws.into_iter().enumerate() {
            let leaf = E::calculate_leaf(&raw);
            tree.set_leaf(position as u64, leaf)?;
            let mut index = prefix.to_vec();
            index.push(position as u64);
            self.leaves.insert(index, LeafEntry { raw: Some(raw), leaf });
        }
        self.subtrees.insert(prefix.to_vec(), tree);
        self.propagate(prefix)
    }

    /// Drop everything under `prefix` and pin its parent leaf to `sentinel`.
    /// Later writes under the prefix fail with `Sealed`.
    pub fn seal_prefix(&mut self, prefix: &[u64], sentinel: Field) -> StorageResult<()> {
        self.check_prefix(prefix)?;
        self.ensure_unsealed(prefix)?;

        self.leaves
            .retain(|index, _| !(index.len() > prefix.len() && index.starts_with(prefix)));
        self.subtrees
            .retain(|key, _| !(key.len() >= prefix.len() && key.starts_with(prefix)));

        let (parent, last) = prefix.split_at(prefix.len() - 1);
        if parent.is_empty() {
            self.level1.set_leaf(last[0], sentinel)?;
        } else {
            self.subtree_mut(parent)?.set_leaf(last[0], sentinel)?;
            self.propagate(parent)?;
        }
        self.sealed.insert(prefix.to_vec(), sentinel);
        Ok(())
    }

    pub fn sealed(&self) -> &BTreeMap<Vec<u64>, Field> {
        &self.sealed
    }

    /// Root of every subtree, keyed by prefix
    pub fn subtree_roots(&self) -> BTreeMap<Vec<u64>, Field> {
        self.subtrees
            .iter()
            .map(|(prefix, tree)| (prefix.clone(), tree.root()))
            .collect()
    }

    fn sealed_prefix_of<'a>(&self, index: &'a [u64]) -> Option<&'a [u64]> {
        (1..=index.len())
            .map(|depth| &index[..depth])
            .find(|prefix| self.sealed.contains_key(*prefix))
    }

    fn ensure_unsealed(&self, index: &[u64]) -> StorageResult<()> {
        match self.sealed_prefix_of(index) {
            Some(prefix) => Err(StorageError::Sealed {
                prefix: index_key(prefix),
            }),
            None => Ok(()),
        }
    }

    fn check_prefix(&self, prefix: &[u64]) -> StorageResult<()> {
        if prefix.is_empty() || prefix.len() >= self.arity() {
            return Err(StorageError::ArityMismatch {
                expected: self.arity().saturating_sub(1).max(1),
                got: prefix.len(),
            });
        }
        self.check_bounds(prefix)
    }

    fn check_index(&self, index: &[u64], allow_prefix: bool) -> StorageResult<()> {
        let arity = self.arity();
        let valid = if allow_prefix {
            !index.is_empty() && index.len() <= arity
        } else {
            index.len() == arity
        };
        if !valid {
            return Err(StorageError::ArityMismatch {
                expected: arity,
                got: index.len(),
            });
        }
        self.check_bounds(index)
    }

    fn check_bounds(&self, index: &[u64]) -> StorageResult<()> {
        for (level, component) in index.iter().enumerate() {
            let capacity = self.layout.capacity(level);
            if *component >= capacity {
                return Err(StorageError::IndexOutOfRange {
                    index: *component,
                    capacity,
                });
            }
        }
        Ok(())
    }
}
