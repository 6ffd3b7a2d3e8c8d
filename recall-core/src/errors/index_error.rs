/// Approximate vector index errors.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("index load failed: {path}: {reason}")]
    LoadFailed { path: String, reason: String },

    #[error("index corrupt: {path}: {details}")]
    Corrupt { path: String, details: String },

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("index holds no vectors")]
    EmptyIndex,

    #[error("index has not been trained")]
    NotTrained,

    #[error("invalid index parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },
}
