//! Turn selected candidate ids into memory tokens, features, and scores.

use ndarray::{s, Array2, Array3, Array4, ArrayView3, Axis};

use recall_core::constants::EOS;
use recall_core::errors::{MemoryError, RecallResult};
use recall_core::memory::{FeatureTable, MemoryPool};
use recall_core::vocab::{lists_to_tensor, Vocab};
use recall_observability::tracing_setup::events;

/// Longest memory sequence kept for a query of `query_len` tokens:
/// `floor(ratio * query_len)`.
pub fn mem_len_cap(query_len: usize, ratio: f64) -> usize {
    (ratio * query_len as f64).floor() as usize
}

/// Token tensor `(mem_len, ids.len())` of the candidates in `ids`, each
/// followed by `<eos>`, right-padded, then cut to `max_len` rows.
pub fn gather_tokens(pool: &MemoryPool, ids: &[usize], vocab: &Vocab, max_len: usize) -> RecallResult<Array2<usize>> {
    let lists = ids
        .iter()
        .map(|&id| {
            let mut tokens: Vec<&str> = pool.get(id)?.iter().map(String::as_str).collect();
            tokens.push(EOS);
            Ok(tokens)
        })
        .collect::<RecallResult<Vec<_>>>()?;
    let tokens = lists_to_tensor(&lists, vocab);
    if tokens.nrows() > max_len {
        events::memory_truncated(tokens.nrows(), max_len);
        return Ok(tokens.slice(s![..max_len, ..]).to_owned());
    }
    Ok(tokens)
}

/// Feature rows for `indices` `(topk, heads, batch)`, shaped
/// `(topk, heads, batch, dim)`.
pub fn gather_features(features: &FeatureTable, indices: &Array3<usize>) -> RecallResult<Array4<f32>> {
    let (topk, heads, batch) = indices.dim();
    let dim = features.dims();
    let mut out = Array4::<f32>::zeros((topk, heads, batch, dim));
    for ((k, h, b), &id) in indices.indexed_iter() {
        out.slice_mut(s![k, h, b, ..]).assign(&features.row(id)?);
    }
    Ok(out)
}

/// Exact relevance scores `(topk, heads, batch)`: `q · f / max_norm²`.
///
/// `queries` is `(heads, batch, dim)`; `features` is `(topk, heads, batch, dim)`.
pub fn exact_scores(queries: ArrayView3<'_, f32>, features: &Array4<f32>, max_norm: f32) -> RecallResult<Array3<f32>> {
    let q_dim = queries.len_of(Axis(2));
    let f_dim = features.len_of(Axis(3));
    if q_dim != f_dim {
        return Err(MemoryError::FeatureDimMismatch {
            expected: q_dim,
            actual: f_dim,
        }
        .into());
    }
    let norm_sq = max_norm * max_norm;
    let products = features * &queries.insert_axis(Axis(0));
    Ok(products.sum_axis(Axis(3)) / norm_sq)
}
