use ndarray::{Array2, Array3};

use crate::device::Located;

/// Output of a query encoder.
#[derive(Debug, Clone)]
pub struct EncodedQuery {
    /// Layer-normalized query vectors, shape `(heads, batch, dim)`.
    pub vectors: Located<Array3<f32>>,
    /// Encoder hidden states, shape `(seq_len, batch, embed_dim)`. Passed through untouched.
    pub src: Array3<f32>,
    /// `true` at padding positions, shape `(seq_len, batch)`.
    pub src_mask: Array2<bool>,
}
