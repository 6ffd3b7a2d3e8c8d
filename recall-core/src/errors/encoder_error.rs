/// Encoder and checkpoint errors.
#[derive(Debug, thiserror::Error)]
pub enum EncoderError {
    #[error("checkpoint load failed: {path}: {reason}")]
    CheckpointLoadFailed { path: String, reason: String },

    #[error("missing parameter in state dict: {name}")]
    MissingParameter { name: String },

    #[error("shape mismatch for {name}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("empty token batch")]
    EmptyBatch,

    #[error("head count mismatch: expected {expected}, got {actual}")]
    HeadMismatch { expected: usize, actual: usize },
}
