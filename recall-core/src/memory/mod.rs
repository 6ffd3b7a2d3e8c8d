mod bank;
mod features;
mod pool;

pub use bank::{load_max_norm, save_max_norm, MemoryBank};
pub use features::FeatureTable;
pub use pool::MemoryPool;
