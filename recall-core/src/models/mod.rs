mod encoded_query;
mod query_batch;
mod retrieval_output;
mod search_hits;

pub use encoded_query::EncodedQuery;
pub use query_batch::QueryBatch;
pub use retrieval_output::{MemoryRetrieval, RetrieverOutput};
pub use search_hits::SearchHits;
