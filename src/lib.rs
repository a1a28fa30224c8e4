//! QUORUM: Threshold Committees over a Folded Action Rollup
//!
//! This is the root crate that re-exports all QUORUM components and wires the
//! member and aggregator roles on top of them.
//!
//! ## Architecture Overview
//!
//! Committees of N members jointly generate an ElGamal key that any T of
//! them can use for decryption. Clients submit encrypted vectors, which are
//! summed homomorphically; the committee then decrypts only the sum. Every
//! state change is a queued action folded into a proof chain, and only the
//! final root lands on the settlement substrate.
//!
//! ## Crate Organization
//!
//! - `quorum-hash`: Poseidon hashing over BN254
//! - `quorum-elgamal`: Ristretto ElGamal vectors, share transport, decoding
//! - `quorum-threshold`: Feldman DKG rounds, Lagrange interpolation
//! - `quorum-storage`: indexed sparse Merkle storage with witnesses
//! - `quorum-rollup`: actions, transitions, fold chain, substrate

pub mod aggregator;
pub mod config;
pub mod context;
pub mod errors;
pub mod logging;
pub mod member;

pub use quorum_elgamal as elgamal;
pub use quorum_hash as hash;
pub use quorum_rollup as rollup;
pub use quorum_storage as storage;
pub use quorum_threshold as threshold;

pub use aggregator::{build_chain_on, Aggregator, ChainOutcome, ProcessReport};
pub use config::{ConfigError, QuorumConfig};
pub use context::ProtocolContext;
pub use errors::{AggregatorError, AggregatorResult};
pub use member::MemberSession;

/// QUORUM protocol version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::aggregator::{Aggregator, ChainOutcome, ProcessReport};
    pub use crate::config::QuorumConfig;
    pub use crate::context::ProtocolContext;
    pub use crate::errors::{AggregatorError, AggregatorResult};
    pub use crate::member::MemberSession;
    pub use quorum_elgamal::{EncryptedVector, MemberKeypair, PlaintextDomain};
    pub use quorum_rollup::{
        Action, ActionCursor, CommitteeSetting, KeyStatus, LocalSubstrate, RequestStatus,
        RollupError, Substrate,
    };
}
