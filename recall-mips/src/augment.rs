//! Max-norm augmentation and its inverse.

use ndarray::{Array2, ArrayView2};

use recall_core::errors::{IndexError, RecallResult};

/// Relative slack allowed when a data norm exceeds the supplied max norm.
const NORM_TOLERANCE: f32 = 1e-4;

/// Largest L2 norm over the rows of `vectors`.
pub fn max_norm(vectors: ArrayView2<'_, f32>) -> f32 {
    vectors
        .rows()
        .into_iter()
        .map(|r| r.dot(&r).sqrt())
        .fold(0.0f32, f32::max)
}

/// Append a zero coordinate to every query row. Norms are unchanged.
pub fn augment_query(vectors: ArrayView2<'_, f32>) -> Array2<f32> {
    let (n, d) = vectors.dim();
    Array2::from_shape_fn((n, d + 1), |(i, j)| if j < d { vectors[[i, j]] } else { 0.0 })
}

/// Append `sqrt(max_norm² − ‖x‖²)` to every data row, so all augmented rows
/// share the norm `max_norm`.
///
/// # Errors
/// `InvalidParameter` if a row is longer than `max_norm` beyond rounding slack.
pub fn augment_data(vectors: ArrayView2<'_, f32>, max_norm: f32) -> RecallResult<Array2<f32>> {
    let max_sq = max_norm * max_norm;
    let mut extra = Vec::with_capacity(vectors.nrows());
    for (i, row) in vectors.rows().into_iter().enumerate() {
        let sq = row.dot(&row);
        if sq.sqrt() > max_norm * (1.0 + NORM_TOLERANCE) {
            return Err(IndexError::InvalidParameter {
                name: "max_norm".to_string(),
                reason: format!(
                    "row {i} has norm {} above max norm {max_norm}",
                    sq.sqrt()
                ),
            }
            .into());
        }
        extra.push((max_sq - sq).max(0.0).sqrt());
    }
    let (n, d) = vectors.dim();
    Ok(Array2::from_shape_fn((n, d + 1), |(i, j)| {
        if j < d {
            vectors[[i, j]]
        } else {
            extra[i]
        }
    }))
}

/// Inner product recovered from one augmented L2 distance.
pub fn l2_to_ip_single(distance: f32, query_sq_norm: f32, max_norm: f32) -> f32 {
    (query_sq_norm + max_norm * max_norm - distance) / 2.0
}

/// Row-wise [`l2_to_ip_single`]. `distances[i]` belongs to `queries.row(i)`.
/// Rows of `distances` may be ragged.
pub fn l2_to_ip(distances: &[Vec<f32>], queries: ArrayView2<'_, f32>, max_norm: f32) -> Vec<Vec<f32>> {
    distances
        .iter()
        .zip(queries.rows())
        .map(|(row, q)| {
            let q_sq = q.dot(&q);
            row.iter()
                .map(|&d| l2_to_ip_single(d, q_sq, max_norm))
                .collect()
        })
        .collect()
}
