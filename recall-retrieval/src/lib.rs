//! # recall-retrieval
//!
//! Dense retrieval over a memory bank.
//!
//! ```text
//! QueryBatch ─► IQueryEncoder ─► augment_query ─► IVectorIndex::search(topk + 1)
//!            ─► l2_to_ip / M² ─► self-hit exclusion ─► gather tokens + features
//!            ─► exact scores ─► RetrieverOutput
//! ```
//!
//! [`MemoryBankBuilder`] produces the directory [`Retriever::from_pretrained`] reads.

pub mod builder;
pub mod exclusion;
pub mod gather;
pub mod retriever;

pub use builder::{encode_candidates, MemoryBankBuilder};
pub use exclusion::select_candidates;
pub use gather::mem_len_cap;
pub use retriever::Retriever;
