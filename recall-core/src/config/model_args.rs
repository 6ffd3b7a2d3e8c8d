use std::path::Path;

use serde::{Deserialize, Serialize};

use super::defaults;
use crate::errors::{EncoderError, RecallResult};

/// Encoder hyperparameters, persisted as `args.json` next to the checkpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelArgs {
    pub layers: usize,
    pub embed_dim: usize,
    pub ff_embed_dim: usize,
    /// Attention heads inside each transformer layer (not retrieval heads).
    pub num_heads: usize,
    pub dropout: f32,
    pub output_dim: usize,
}

impl Default for ModelArgs {
    fn default() -> Self {
        Self {
            layers: defaults::DEFAULT_LAYERS,
            embed_dim: defaults::DEFAULT_EMBED_DIM,
            ff_embed_dim: defaults::DEFAULT_FF_EMBED_DIM,
            num_heads: defaults::DEFAULT_ATTENTION_HEADS,
            dropout: defaults::DEFAULT_DROPOUT,
            output_dim: defaults::DEFAULT_OUTPUT_DIM,
        }
    }
}

impl ModelArgs {
    /// Read `args.json`. A missing or malformed file is a checkpoint load failure.
    pub fn load(path: impl AsRef<Path>) -> RecallResult<Self> {
        let path = path.as_ref();
        let fail = |reason: String| EncoderError::CheckpointLoadFailed {
            path: path.display().to_string(),
            reason,
        };
        let content = std::fs::read_to_string(path).map_err(|e| fail(e.to_string()))?;
        Ok(serde_json::from_str(&content).map_err(|e| fail(e.to_string()))?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> RecallResult<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("args.json");
        let args = ModelArgs {
            layers: 1,
            output_dim: 16,
            ..ModelArgs::default()
        };
        args.save(&path).unwrap();
        assert_eq!(ModelArgs::load(&path).unwrap(), args);
    }

    #[test]
    fn missing_args_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ModelArgs::load(dir.path().join("args.json")).is_err());
    }
}
