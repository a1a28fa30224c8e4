//! Protocol records stored in the commitment trees

use quorum_elgamal::EncryptedVector;
use serde::{Deserialize, Serialize};

/// The eight protocol storages, in state-root order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StorageKind {
    Members,
    Settings,
    KeyStatus,
    Round1,
    Round2,
    PublicKeys,
    Requests,
    Responses,
}

impl StorageKind {
    pub const ALL: [StorageKind; 8] = [
        StorageKind::Members,
        StorageKind::Settings,
        StorageKind::KeyStatus,
        StorageKind::Round1,
        StorageKind::Round2,
        StorageKind::PublicKeys,
        StorageKind::Requests,
        StorageKind::Responses,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StorageKind::Members => "members",
            StorageKind::Settings => "settings",
            StorageKind::KeyStatus => "key_status",
            StorageKind::Round1 => "round1",
            StorageKind::Round2 => "round2",
            StorageKind::PublicKeys => "public_keys",
            StorageKind::Requests => "requests",
            StorageKind::Responses => "responses",
        }
    }
}

/// Key lifecycle; only ever advances
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum KeyStatus {
    Empty = 0,
    Round1 = 1,
    Round2 = 2,
    Active = 3,
    Deprecated = 4,
}

impl KeyStatus {
    pub fn as_u64(self) -> u64 {
        self as u64
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitteeSetting {
    pub threshold: u64,
    pub size: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    /// Open for submissions
    Accumulating,
    /// At least one response recorded; submissions closed
    Responding,
    Resolved,
}

impl RequestStatus {
    fn tag(self) -> u8 {
        match self {
            RequestStatus::Accumulating => 1,
            RequestStatus::Responding => 2,
            RequestStatus::Resolved => 3,
        }
    }
}

/// A decryption request: the running ciphertext sum bound to one key
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub key_index: u64,
    pub status: RequestStatus,
    pub accumulator: EncryptedVector,
    pub result: Option<Vec<u64>>,
}

impl RequestRecord {
    pub fn open(key_index: u64, submission: EncryptedVector) -> Self {
        Self {
            key_index,
            status: RequestStatus::Accumulating,
            accumulator: submission,
            result: None,
        }
    }

    pub fn dimension(&self) -> usize {
        self.accumulator.dimension()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.key_index.to_le_bytes());
        out.push(self.status.tag());
        out.extend_from_slice(&self.accumulator.to_bytes());
        match &self.result {
            Some(values) => {
                out.push(1);
                out.extend_from_slice(&(values.len() as u64).to_le_bytes());
                for v in values {
                    out.extend_from_slice(&v.to_le_bytes());
                }
            }
            None => out.push(0),
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use curve25519_dalek::constants::RISTRETTO_BASEPOINT_POINT;

    #[test]
    fn test_status_order() {
        assert!(KeyStatus::Empty < KeyStatus::Round1);
        assert!(KeyStatus::Active < KeyStatus::Deprecated);
        assert_eq!(KeyStatus::Active.as_u64(), 3);
    }

    #[test]
    fn test_request_bytes_cover_result() {
        let accumulator = EncryptedVector {
            r: vec![RISTRETTO_BASEPOINT_POINT],
            m: vec![RISTRETTO_BASEPOINT_POINT],
        };
        let mut record = RequestRecord::open(7, accumulator);
        let open = record.to_bytes();
        record.status = RequestStatus::Resolved;
        record.result = Some(vec![0]);
        assert_ne!(open, record.to_bytes());
    }
}
