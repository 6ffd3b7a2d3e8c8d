//! # recall-observability
//!
//! Structured tracing for the retrieval pipeline: subscriber setup,
//! span definitions per operation, and structured log events.

pub mod tracing_setup;

pub use tracing_setup::{init_from_config, init_tracing, init_tracing_with_filter};
