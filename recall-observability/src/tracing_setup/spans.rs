//! Span definitions per operation: retrieval, index search, encoding, bank build.

/// Create a retrieval span.
#[macro_export]
macro_rules! retrieval_span {
    ($batch:expr, $heads:expr, $topk:expr) => {
        tracing::info_span!("recall.retrieval", batch = $batch, heads = $heads, topk = $topk)
    };
}

/// Create an index search span.
#[macro_export]
macro_rules! index_search_span {
    ($queries:expr, $k:expr) => {
        tracing::debug_span!("recall.index_search", queries = $queries, k = $k)
    };
}

/// Create an encoding span.
#[macro_export]
macro_rules! encode_span {
    ($role:expr, $batch:expr) => {
        tracing::debug_span!("recall.encode", role = %$role, batch = $batch)
    };
}

/// Create a memory bank build span.
#[macro_export]
macro_rules! build_span {
    ($candidates:expr) => {
        tracing::info_span!("recall.build", candidates = $candidates)
    };
}

/// Span names as constants for programmatic use.
pub mod names {
    pub const RETRIEVAL: &str = "recall.retrieval";
    pub const INDEX_SEARCH: &str = "recall.index_search";
    pub const ENCODE: &str = "recall.encode";
    pub const BUILD: &str = "recall.build";
}
