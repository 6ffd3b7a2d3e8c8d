//! MemoryBank: the memory pool, its feature table, and the max-norm scalar,
//! loaded together so their alignment is checked once at startup.

use std::path::Path;

use tracing::info;

use crate::constants::{CANDIDATES_FILE, FEATURES_FILE, MAX_NORM_FILE};
use crate::errors::{MemoryError, RecallResult};
use crate::memory::{FeatureTable, MemoryPool};

#[derive(Debug, Clone)]
pub struct MemoryBank {
    pool: MemoryPool,
    features: FeatureTable,
    max_norm: f32,
}

impl MemoryBank {
    /// # Errors
    /// `LengthMismatch` if pool and feature table are not index-aligned.
    pub fn new(pool: MemoryPool, features: FeatureTable, max_norm: f32) -> RecallResult<Self> {
        if pool.len() != features.len() {
            return Err(MemoryError::LengthMismatch {
                pool: pool.len(),
                features: features.len(),
            }
            .into());
        }
        Ok(Self {
            pool,
            features,
            max_norm,
        })
    }

    /// Load `candidates.txt`, `feat.bin` and `max_norm.json` from `dir`.
    pub fn load(dir: impl AsRef<Path>) -> RecallResult<Self> {
        let dir = dir.as_ref();
        let pool = MemoryPool::load(dir.join(CANDIDATES_FILE))?;
        let features = FeatureTable::load(dir.join(FEATURES_FILE))?;
        let max_norm = load_max_norm(dir.join(MAX_NORM_FILE))?;
        let bank = Self::new(pool, features, max_norm)?;
        info!(
            candidates = bank.len(),
            dims = bank.features.dims(),
            max_norm,
            "memory bank loaded"
        );
        Ok(bank)
    }

    /// Write the three files into `dir`, creating it if needed.
    pub fn save(&self, dir: impl AsRef<Path>) -> RecallResult<()> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        self.pool.save(dir.join(CANDIDATES_FILE))?;
        self.features.save(dir.join(FEATURES_FILE))?;
        save_max_norm(dir.join(MAX_NORM_FILE), self.max_norm)
    }

    pub fn pool(&self) -> &MemoryPool {
        &self.pool
    }

    pub fn features(&self) -> &FeatureTable {
        &self.features
    }

    pub fn max_norm(&self) -> f32 {
        self.max_norm
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }
}

/// Read the max-norm scalar. It must be a finite positive number.
pub fn load_max_norm(path: impl AsRef<Path>) -> RecallResult<f32> {
    let path = path.as_ref();
    let fail = |reason: String| MemoryError::LoadFailed {
        path: path.display().to_string(),
        reason,
    };
    let content = std::fs::read_to_string(path).map_err(|e| fail(e.to_string()))?;
    let value: f32 = serde_json::from_str(content.trim()).map_err(|e| fail(e.to_string()))?;
    if !value.is_finite() || value <= 0.0 {
        return Err(fail(format!("max norm must be finite and positive, got {value}")).into());
    }
    Ok(value)
}

pub fn save_max_norm(path: impl AsRef<Path>, max_norm: f32) -> RecallResult<()> {
    std::fs::write(path.as_ref(), serde_json::to_string(&max_norm)?)?;
    Ok(())
}
