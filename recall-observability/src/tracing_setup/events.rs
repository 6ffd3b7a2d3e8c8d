//! Structured log events for key pipeline operations.
//!
//! Each function emits a `tracing` event with structured fields.

/// Log an index load.
pub fn index_loaded(path: &str, kind: &str, vectors: usize, nprobe: usize) {
    tracing::info!(
        event = "index_loaded",
        path = %path,
        kind = %kind,
        vectors = vectors,
        nprobe = nprobe,
        "index loaded"
    );
}

/// Log a move of data between devices.
pub fn device_transfer(what: &str, from: &str, to: &str) {
    tracing::debug!(
        event = "device_transfer",
        what = %what,
        from = %from,
        to = %to,
        "device transfer"
    );
}

/// Log how many candidates self-hit exclusion removed from one batch.
pub fn candidates_excluded(excluded: usize, lists: usize) {
    tracing::debug!(
        event = "candidates_excluded",
        excluded = excluded,
        lists = lists,
        "self-hit candidates excluded"
    );
}

/// Log a memory-token truncation.
pub fn memory_truncated(from_len: usize, to_len: usize) {
    tracing::debug!(
        event = "memory_truncated",
        from_len = from_len,
        to_len = to_len,
        "memory tokens truncated"
    );
}

/// Log completion of a memory bank build.
pub fn bank_built(output_dir: &str, candidates: usize, max_norm: f32) {
    tracing::info!(
        event = "bank_built",
        output_dir = %output_dir,
        candidates = candidates,
        max_norm = max_norm,
        "memory bank built"
    );
}
