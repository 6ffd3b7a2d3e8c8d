//! # recall-core
//!
//! Foundation crate for the recall retrieval system.
//! Defines the shared types, traits, errors, config, and constants.
//! Every other crate in the workspace depends on this.

pub mod config;
pub mod constants;
pub mod device;
pub mod errors;
pub mod memory;
pub mod models;
pub mod traits;
pub mod vocab;

// Re-export the most commonly used types at the crate root.
pub use config::RecallConfig;
pub use device::{Device, Located};
pub use errors::{RecallError, RecallResult};
pub use memory::{FeatureTable, MemoryBank, MemoryPool};
pub use vocab::{Vocab, Vocabs};
