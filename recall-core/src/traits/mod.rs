mod query_encoder;
mod vector_index;

pub use query_encoder::IQueryEncoder;
pub use vector_index::IVectorIndex;
