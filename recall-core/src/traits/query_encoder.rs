use ndarray::Array2;

use crate::device::Device;
use crate::errors::RecallResult;
use crate::models::EncodedQuery;

/// Maps a token batch to per-head query vectors.
pub trait IQueryEncoder: Send + Sync {
    /// Encode `(seq_len, batch)` token ids into `(heads, batch, dim)` vectors
    /// plus the encoder's hidden states.
    fn encode(&self, src_tokens: &Array2<usize>) -> RecallResult<EncodedQuery>;

    /// Number of retrieval heads. Single-projection encoders report 1.
    fn num_heads(&self) -> usize;

    /// Dimension of each query vector.
    fn output_dim(&self) -> usize;

    /// Device the encoder's outputs are produced on.
    fn device(&self) -> Device;
}
