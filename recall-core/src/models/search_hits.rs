/// Per-query neighbours from a vector index, nearest first.
///
/// Rows may hold fewer than `k` entries when the probed part of the index
/// contains fewer vectors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchHits {
    pub ids: Vec<Vec<usize>>,
    /// Squared L2 distances in the index's (augmented) space.
    pub distances: Vec<Vec<f32>>,
}

impl SearchHits {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
