use ndarray::Array2;

use crate::errors::{RecallResult, RetrievalError};

/// A batch of queries plus the gold target of each, used only for
/// self-hit exclusion.
#[derive(Debug, Clone)]
pub struct QueryBatch {
    /// Token ids, shape `(seq_len, batch)`.
    pub src_tokens: Array2<usize>,
    /// Gold target tokens, one entry per query.
    pub tgt_raw_sents: Vec<Vec<String>>,
}

impl QueryBatch {
    /// # Errors
    /// `BatchMismatch` if the gold list does not have one entry per column.
    pub fn new(src_tokens: Array2<usize>, tgt_raw_sents: Vec<Vec<String>>) -> RecallResult<Self> {
        if src_tokens.ncols() != tgt_raw_sents.len() {
            return Err(RetrievalError::BatchMismatch {
                queries: src_tokens.ncols(),
                gold: tgt_raw_sents.len(),
            }
            .into());
        }
        Ok(Self {
            src_tokens,
            tgt_raw_sents,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.src_tokens.ncols()
    }

    pub fn seq_len(&self) -> usize {
        self.src_tokens.nrows()
    }
}
