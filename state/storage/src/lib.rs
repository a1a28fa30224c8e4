//! Indexed Commitment Storage
//!
//! Off-chain mirror of the protocol's commitment trees. Only roots are
//! committed; everything else (leaves, raw values, witnesses) is computed
//! here and handed to the fold chain.
//!
//! # Architecture
//! ```text
//!          level-1 root
//!         /            \
//!   leaf(keyIndex)   leaf(keyIndex')      <- level-1 tree
//!       |
//!   level-2 root                           <- subtree per prefix
//!    /   |   \
//!  m0   m1   m2                            <- per-member leaves
//! ```
//!
//! Absent subtrees hash to zero, so a missing level-2 tree and an empty one
//! give the same level-1 leaf.

pub mod errors;
pub mod indexed;
pub mod snapshot;
pub mod tree;
pub mod witness;

pub use errors::StorageError;
pub use indexed::{
    index_key, parse_index_key, FieldLeaf, IndexedStorage, LeafEncoding, LeafEntry,
    StorageLayout, SubtreePolicy,
};
pub use snapshot::{HexField, LeafRecord, StorageSnapshot};
pub use tree::{node_hash, subtree_root, SparseMerkleTree, MAX_HEIGHT};
pub use witness::{IndexedWitness, MerkleWitness};

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;
    use ark_ff::Zero;
    use proptest::prelude::*;
    use quorum_hash::Field;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_witness_roundtrip(writes in proptest::collection::vec((0u64..16, 0u64..16, 1u64..1000), 1..12)) {
            let layout = StorageLayout::new(vec![4, 4], SubtreePolicy::Implicit).unwrap();
            let mut storage = IndexedStorage::<FieldLeaf>::new(layout).unwrap();
            for (i, j, v) in &writes {
                storage.update_raw_leaf(&[*i, *j], *v).unwrap();
            }

            for (i, j, _) in &writes {
                let index = [*i, *j];
                let leaf = storage.leaf(&index).unwrap();
                let witness = storage.get_witness(&index).unwrap();
                prop_assert_eq!(witness.calculate_root(&leaf), storage.root());
                prop_assert_eq!(witness.calculate_index(), index.to_vec());

                // Any other leaf value at the same position yields a different root
                let other = leaf + Field::from(1u64);
                prop_assert_ne!(witness.calculate_root(&other), storage.root());
            }
        }

        #[test]
        fn prop_witness_taken_before_write_opens_new_root(
            explicit in any::<bool>(),
            prior in proptest::collection::vec((0u64..16, 0u64..16, 1u64..1000), 0..8),
            (i, j, v) in (0u64..16, 0u64..16, 1u64..1000),
        ) {
            let policy = if explicit { SubtreePolicy::Explicit } else { SubtreePolicy::Implicit };
            let layout = StorageLayout::new(vec![4, 4], policy).unwrap();
            let mut storage = IndexedStorage::<FieldLeaf>::new(layout).unwrap();
            for (a, b, w) in &prior {
                if explicit {
                    storage.create_subtree(&[*a]).unwrap();
                }
                storage.update_raw_leaf(&[*a, *b], *w).unwrap();
            }
            if explicit {
                storage.create_subtree(&[i]).unwrap();
            }

            let witness = storage.get_witness(&[i, j]).unwrap();
            storage.update_raw_leaf(&[i, j], v).unwrap();
            prop_assert_eq!(
                witness.calculate_root(&FieldLeaf::calculate_leaf(&v)),
                storage.root()
            );
        }

        #[test]
        fn prop_root_independent_of_write_order(values in proptest::collection::btree_map(0u64..64, 1u64..1000, 1..10)) {
            let layout = StorageLayout::new(vec![6], SubtreePolicy::Implicit).unwrap();
            let mut forward = IndexedStorage::<FieldLeaf>::new(layout.clone()).unwrap();
            let mut backward = IndexedStorage::<FieldLeaf>::new(layout).unwrap();

            for (i, v) in values.iter() {
                forward.update_raw_leaf(&[*i], *v).unwrap();
            }
            for (i, v) in values.iter().rev() {
                backward.update_raw_leaf(&[*i], *v).unwrap();
            }
            prop_assert_eq!(forward.root(), backward.root());
            prop_assert!(!forward.root().is_zero());
        }
    }
}
