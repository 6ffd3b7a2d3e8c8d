// Single source of truth for all default values.

// --- Index ---
pub const DEFAULT_INDEX_KIND: &str = "ivf_flat";
pub const DEFAULT_NLIST: usize = 1024;
pub const DEFAULT_NPROBE: usize = 64;
pub const DEFAULT_KMEANS_ITERATIONS: usize = 20;
pub const DEFAULT_INDEX_SEED: u64 = 42;
pub const DEFAULT_PARALLEL_SEARCH: bool = true;

// --- Retrieval ---
pub const DEFAULT_NUM_HEADS: usize = 1;
pub const DEFAULT_TOPK: usize = 5;
pub const DEFAULT_MEM_LEN_RATIO: f64 = 1.5;
pub const DEFAULT_ALLOW_HIT: bool = false;
pub const DEFAULT_DEVICE: &str = "host";
pub const DEFAULT_BUILD_BATCH_SIZE: usize = 128;

// --- Encoder ---
pub const DEFAULT_LAYERS: usize = 3;
pub const DEFAULT_EMBED_DIM: usize = 512;
pub const DEFAULT_FF_EMBED_DIM: usize = 2048;
pub const DEFAULT_ATTENTION_HEADS: usize = 8;
pub const DEFAULT_DROPOUT: f32 = 0.1;
pub const DEFAULT_OUTPUT_DIM: usize = 128;

// --- Observability ---
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_JSON_LOGS: bool = true;
