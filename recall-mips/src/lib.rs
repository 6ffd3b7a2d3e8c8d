//! # recall-mips
//!
//! Maximum inner-product search emulated on an L2 index.
//!
//! Data vectors are padded with `sqrt(M² − ‖x‖²)` where `M` is the largest
//! norm in the set; queries are padded with `0`. Then
//! `‖q' − x'‖² = ‖q‖² + M² − 2·q·x`, so the L2 nearest neighbours in the
//! augmented space are the inner-product maxima in the original space, and
//! [`l2_to_ip`] recovers `q·x` from a returned distance.
//!
//! ## Architecture
//!
//! ```text
//! MipsIndex (IVectorIndex)
//! ├── Flat      (exhaustive scan)
//! └── IvfFlat   (k-means coarse quantizer, nprobe lists scanned)
//! persist       (checksummed binary blob)
//! augment       (augment_query / augment_data / l2_to_ip)
//! ```

pub mod augment;
pub mod index;
pub mod kmeans;
pub mod persist;

pub use augment::{augment_data, augment_query, l2_to_ip, l2_to_ip_single, max_norm};
pub use index::{IndexKind, MipsIndex};
