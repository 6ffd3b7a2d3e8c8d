use ndarray::{Array2, Array3};

/// The retrieval bundle handed to the downstream generator.
///
/// Axis order everywhere is `(topk, heads, batch)`; token columns are that
/// order flattened.
#[derive(Debug, Clone)]
pub struct MemoryRetrieval {
    /// Memory token ids, shape `(mem_len, topk * heads * batch)`. `mem_len`
    /// is capped relative to the query length, so sequences may be cut short.
    pub all_mem_tokens: Array2<usize>,
    /// Exact relevance scores, shape `(topk, heads, batch)`.
    pub all_mem_scores: Array3<f32>,
    /// Normalized scores recovered from index distances, same shape. Approximate.
    pub index_scores: Array3<f32>,
    /// Selected candidate ids, same shape.
    pub indices: Array3<usize>,
    /// Text of every selected candidate, per query, ordered topk-major then head.
    pub retrieval_raw_sents: Vec<Vec<Vec<String>>>,
}

/// Encoder pass-through plus the retrieval bundle.
#[derive(Debug, Clone)]
pub struct RetrieverOutput {
    pub src: Array3<f32>,
    pub src_mask: Array2<bool>,
    pub mem: MemoryRetrieval,
}
