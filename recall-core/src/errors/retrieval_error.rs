/// Retrieval consistency errors.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error(
        "self-hit exclusion left {survivors} of {topk} candidates for head {head}, query {query}"
    )]
    ExclusionUnderfill {
        head: usize,
        query: usize,
        topk: usize,
        survivors: usize,
    },

    #[error("batch mismatch: {queries} queries but {gold} gold targets")]
    BatchMismatch { queries: usize, gold: usize },
}
