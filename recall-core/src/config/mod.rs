pub mod defaults;
mod index_config;
mod model_args;
mod observability_config;
mod retrieval_config;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use index_config::IndexConfig;
pub use model_args::ModelArgs;
pub use observability_config::ObservabilityConfig;
pub use retrieval_config::RetrievalConfig;

use crate::errors::{RecallError, RecallResult};

/// Top-level configuration. Every section falls back to its defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecallConfig {
    pub index: IndexConfig,
    pub retrieval: RetrievalConfig,
    pub encoder: ModelArgs,
    pub observability: ObservabilityConfig,
}

impl RecallConfig {
    /// Parse a TOML document. Missing sections and keys take their defaults.
    pub fn from_toml(source: &str) -> RecallResult<Self> {
        toml::from_str(source).map_err(|e| RecallError::Config {
            reason: e.to_string(),
        })
    }

    /// Read and parse a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> RecallResult<Self> {
        let source = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&source)
    }

    /// Serialize back to TOML.
    pub fn to_toml(&self) -> RecallResult<String> {
        toml::to_string(self).map_err(|e| RecallError::Config {
            reason: e.to_string(),
        })
    }
}
