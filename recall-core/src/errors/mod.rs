mod encoder_error;
mod index_error;
mod memory_error;
mod retrieval_error;

pub use encoder_error::EncoderError;
pub use index_error::IndexError;
pub use memory_error::MemoryError;
pub use retrieval_error::RetrievalError;

/// Workspace-wide error type. Subsystem errors convert into it with `?`.
#[derive(Debug, thiserror::Error)]
pub enum RecallError {
    #[error(transparent)]
    IndexError(#[from] IndexError),

    #[error(transparent)]
    EncoderError(#[from] EncoderError),

    #[error(transparent)]
    MemoryError(#[from] MemoryError),

    #[error(transparent)]
    RetrievalError(#[from] RetrievalError),

    #[error("configuration error: {reason}")]
    Config { reason: String },

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type RecallResult<T> = Result<T, RecallError>;
