//! Persisted storage layout
//!
//! ```json
//! {
//!   "kind": "round1",
//!   "layout": { "heights": [12, 8], "policy": "Implicit" },
//!   "level1_root": "<hex>",
//!   "level2_roots": { "3": "<hex>" },
//!   "leaves": { "3.0": { "raw": { ... }, "leaf": "<hex>" } },
//!   "sealed": {}
//! }
//! ```

use crate::errors::StorageError;
use crate::indexed::{index_key, parse_index_key, IndexedStorage, LeafEncoding, StorageLayout};
use crate::StorageResult;
use quorum_hash::{field_hex, field_to_hex, Field};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Hex-encoded field element
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HexField(#[serde(with = "field_hex")] pub Field);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeafRecord<R> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<R>,
    #[serde(with = "field_hex")]
    pub leaf: Field,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StorageSnapshot<R> {
    pub kind: String,
    pub layout: StorageLayout,
    #[serde(with = "field_hex")]
    pub level1_root: Field,
    pub level2_roots: BTreeMap<String, HexField>,
    pub leaves: BTreeMap<String, LeafRecord<R>>,
    pub sealed: BTreeMap<String, HexField>,
}

impl<E: LeafEncoding> IndexedStorage<E> {
    pub fn snapshot(&self) -> StorageSnapshot<E::Raw> {
        StorageSnapshot {
            kind: E::NAME.to_string(),
            layout: self.layout().clone(),
            level1_root: self.root(),
            level2_roots: self
                .subtree_roots()
                .into_iter()
                .map(|(prefix, root)| (index_key(&prefix), HexField(root)))
                .collect(),
            leaves: self
                .entries()
                .map(|(index, entry)| {
                    (
                        index_key(index),
                        LeafRecord {
                            raw: entry.raw.clone(),
                            leaf: entry.leaf,
                        },
                    )
                })
                .collect(),
            sealed: self
                .sealed()
                .iter()
                .map(|(prefix, sentinel)| (index_key(prefix), HexField(*sentinel)))
                .collect(),
        }
    }

    /// Rebuild a storage and check every recorded root against the rebuilt one
    pub fn from_snapshot(snapshot: StorageSnapshot<E::Raw>) -> StorageResult<Self> {
        if snapshot.kind != E::NAME {
            return Err(StorageError::SnapshotMismatch(format!(
                "snapshot kind {} loaded as {}",
                snapshot.kind,
                E::NAME
            )));
        }
        let mut storage = Self::new(snapshot.layout)?;

        for prefix in snapshot.level2_roots.keys() {
            storage.create_subtree(&parse_index_key(prefix)?)?;
        }

        for (key, record) in snapshot.leaves {
            let index = parse_index_key(&key)?;
            match record.raw {
                Some(raw) => {
                    let leaf = E::calculate_leaf(&raw);
                    if leaf != record.leaf {
                        return Err(StorageError::SnapshotMismatch(format!(
                            "leaf {} does not match its raw value",
                            key
                        )));
                    }
                    storage.update_raw_leaf(&index, raw)?;
                }
                None => storage.update_leaf(&index, record.leaf)?,
            }
        }

        for (key, sentinel) in &snapshot.sealed {
            storage.seal_prefix(&parse_index_key(key)?, sentinel.0)?;
        }

        let rebuilt = storage.subtree_roots();
        for (key, expected) in &snapshot.level2_roots {
            let prefix = parse_index_key(key)?;
            // Sealed prefixes drop their subtrees
            if storage.is_sealed(&prefix) {
                continue;
            }
            if rebuilt.get(&prefix) != Some(&expected.0) {
                return Err(StorageError::SnapshotMismatch(format!(
                    "level-2 root at {}",
                    key
                )));
            }
        }
        if storage.root() != snapshot.level1_root {
            return Err(StorageError::SnapshotMismatch(format!(
                "level-1 root {} rebuilt as {}",
                field_to_hex(&snapshot.level1_root),
                field_to_hex(&storage.root())
            )));
        }
        Ok(storage)
    }

    pub fn to_json(&self) -> StorageResult<String> {
        serde_json::to_string_pretty(&self.snapshot())
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> StorageResult<Self> {
        let snapshot: StorageSnapshot<E::Raw> =
            serde_json::from_str(json).map_err(|e| StorageError::Serialization(e.to_string()))?;
        Self::from_snapshot(snapshot)
    }
}
