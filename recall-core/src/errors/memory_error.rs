/// Memory pool and feature table errors.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("memory load failed: {path}: {reason}")]
    LoadFailed { path: String, reason: String },

    #[error("memory pool has {pool} candidates but feature table has {features} rows")]
    LengthMismatch { pool: usize, features: usize },

    #[error("candidate id {id} out of bounds for memory pool of size {pool_size}")]
    CandidateOutOfBounds { id: usize, pool_size: usize },

    #[error("feature dimension mismatch: expected {expected}, got {actual}")]
    FeatureDimMismatch { expected: usize, actual: usize },
}
