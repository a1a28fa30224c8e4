//! Protocol Configuration
//!
//! Handles loading and saving protocol configuration from TOML files.

use std::fs;
use std::path::{Path, PathBuf};

use quorum_elgamal::PlaintextDomain;
use quorum_rollup::RollupConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Full protocol configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuorumConfig {
    /// Tree heights and index limits
    #[serde(default)]
    pub limits: LimitSettings,

    /// Plaintext encoding for submissions
    #[serde(default)]
    pub plaintext: PlaintextSettings,

    /// Action queue settings
    #[serde(default)]
    pub queue: QueueSettings,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl QuorumConfig {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    /// Small trees for tests and local runs
    pub fn local() -> Self {
        Self {
            limits: LimitSettings {
                committee_height: 4,
                member_height: 4,
                key_height: 8,
                request_height: 8,
                keys_per_committee: 8,
            },
            queue: QueueSettings { capacity: 256 },
            ..Default::default()
        }
    }

    /// Rollup parameters derived from this configuration
    pub fn rollup(&self) -> RollupConfig {
        RollupConfig {
            committee_height: self.limits.committee_height,
            member_height: self.limits.member_height,
            key_height: self.limits.key_height,
            request_height: self.limits.request_height,
            keys_per_committee: self.limits.keys_per_committee,
            domain: PlaintextDomain {
                unit: self.plaintext.unit,
                bound: self.plaintext.bound,
            },
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue.capacity == 0 {
            return Err(ConfigError::Invalid(
                "Queue capacity must be greater than 0".to_string(),
            ));
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            return Err(ConfigError::Invalid(format!(
                "Unknown log format: {}",
                self.logging.format
            )));
        }

        self.rollup()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

/// Tree heights and index limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitSettings {
    /// log2 of the maximum committee count
    pub committee_height: u8,

    /// log2 of the maximum committee size
    pub member_height: u8,

    /// log2 of the key tree capacity
    pub key_height: u8,

    /// log2 of the maximum request count
    pub request_height: u8,

    /// Keys each committee may generate
    pub keys_per_committee: u64,
}

impl Default for LimitSettings {
    fn default() -> Self {
        let rollup = RollupConfig::default();
        Self {
            committee_height: rollup.committee_height,
            member_height: rollup.member_height,
            key_height: rollup.key_height,
            request_height: rollup.request_height,
            keys_per_committee: rollup.keys_per_committee,
        }
    }
}

/// Plaintext encoding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaintextSettings {
    /// Scaling unit applied to every submitted value
    pub unit: u64,

    /// Largest value the aggregator will search for
    pub bound: u64,
}

impl Default for PlaintextSettings {
    fn default() -> Self {
        let domain = PlaintextDomain::default();
        Self {
            unit: domain.unit,
            bound: domain.bound,
        }
    }
}

/// Action queue settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSettings {
    /// Maximum queued, uncommitted actions
    pub capacity: usize,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            capacity: quorum_rollup::substrate::DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level
    pub level: String,

    /// Output format (text, json)
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}
