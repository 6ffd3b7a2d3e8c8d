use ndarray::ArrayView2;

use crate::errors::RecallResult;
use crate::models::SearchHits;

/// Nearest-neighbour search by squared L2 distance.
pub trait IVectorIndex: Send + Sync {
    /// Search `k` neighbours for every row of `queries`.
    fn search(&self, queries: ArrayView2<'_, f32>, k: usize) -> RecallResult<SearchHits>;

    /// Dimension of indexed vectors.
    fn dim(&self) -> usize;

    /// Number of indexed vectors.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
