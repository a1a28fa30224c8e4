//! Explicit protocol context
//!
//! Everything that used to be process-wide (index limits, plaintext domain,
//! queue bound, proof verifier) travels in one `ProtocolContext`.

use crate::config::{ConfigError, QuorumConfig};
use crate::errors::AggregatorResult;
use quorum_elgamal::PlaintextDomain;
use quorum_rollup::{FoldContext, LocalSubstrate, ProofVerifier, RollupConfig, TranscriptVerifier};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct ProtocolContext {
    config: QuorumConfig,
    fold: FoldContext,
}

impl ProtocolContext {
    pub fn new(config: QuorumConfig) -> AggregatorResult<Self> {
        Self::with_verifier(config, Arc::new(TranscriptVerifier))
    }

    pub fn with_verifier(config: QuorumConfig, verifier: Arc<dyn ProofVerifier>) -> AggregatorResult<Self> {
        config.validate()?;
        let fold = FoldContext::with_verifier(config.rollup(), verifier)?;
        Ok(Self { config, fold })
    }

    /// Context for local runs and tests
    pub fn local() -> AggregatorResult<Self> {
        Self::new(QuorumConfig::local())
    }

    pub fn config(&self) -> &QuorumConfig {
        &self.config
    }

    pub fn rollup(&self) -> &RollupConfig {
        &self.fold.config
    }

    pub fn fold(&self) -> &FoldContext {
        &self.fold
    }

    pub fn domain(&self) -> &PlaintextDomain {
        &self.fold.config.domain
    }

    pub fn queue_capacity(&self) -> usize {
        self.config.queue.capacity
    }

    /// In-process substrate sharing this context's queue bound and verifier
    pub fn local_substrate(&self) -> LocalSubstrate {
        LocalSubstrate::with_verifier(self.queue_capacity(), Arc::clone(&self.fold.verifier))
    }
}

impl TryFrom<QuorumConfig> for ProtocolContext {
    type Error = ConfigError;

    fn try_from(config: QuorumConfig) -> Result<Self, Self::Error> {
        Self::new(config).map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}
