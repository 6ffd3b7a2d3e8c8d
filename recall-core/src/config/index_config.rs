use serde::{Deserialize, Serialize};

use super::defaults;

/// Approximate vector index configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Index kind: "flat" (exact) or "ivf_flat".
    pub kind: String,
    /// Number of inverted lists. Clamped to the vector count at build time.
    pub nlist: usize,
    /// Lists probed per query. Trades recall for latency.
    pub nprobe: usize,
    /// Lloyd iterations when training the coarse quantizer.
    pub kmeans_iterations: usize,
    /// Seed for coarse quantizer initialisation.
    pub seed: u64,
    /// Search query rows in parallel.
    pub parallel_search: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            kind: defaults::DEFAULT_INDEX_KIND.to_string(),
            nlist: defaults::DEFAULT_NLIST,
            nprobe: defaults::DEFAULT_NPROBE,
            kmeans_iterations: defaults::DEFAULT_KMEANS_ITERATIONS,
            seed: defaults::DEFAULT_INDEX_SEED,
            parallel_search: defaults::DEFAULT_PARALLEL_SEARCH,
        }
    }
}
