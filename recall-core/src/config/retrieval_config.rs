use serde::{Deserialize, Serialize};

use super::defaults;

/// Retriever configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Independent retrieval heads.
    pub num_heads: usize,
    /// Candidates kept per (head, query) after self-hit exclusion.
    pub topk: usize,
    /// Memory tokens are cut to `floor(mem_len_ratio * query_len)`.
    pub mem_len_ratio: f64,
    /// Allow a candidate identical to the gold target to be retrieved.
    pub allow_hit: bool,
    /// Placement of encoder outputs: "host" or "accelerator:<n>".
    pub device: String,
    /// Candidates encoded per batch when building a memory bank.
    pub build_batch_size: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            num_heads: defaults::DEFAULT_NUM_HEADS,
            topk: defaults::DEFAULT_TOPK,
            mem_len_ratio: defaults::DEFAULT_MEM_LEN_RATIO,
            allow_hit: defaults::DEFAULT_ALLOW_HIT,
            device: defaults::DEFAULT_DEVICE.to_string(),
            build_batch_size: defaults::DEFAULT_BUILD_BATCH_SIZE,
        }
    }
}
