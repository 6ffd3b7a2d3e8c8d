//! # recall-encoders
//!
//! Query and response encoders for dense retrieval.
//!
//! - [`MonoEncoder`]: transformer backbone over `(seq_len, batch)` token ids.
//! - [`ProjEncoder`]: one layer-normalized vector per sequence.
//! - [`MultiProjEncoder`]: `heads` vectors per sequence from one backbone pass.
//! - [`MatchingModel`]: in-batch contrastive scoring of query/response pairs.
//!
//! Weights persist as JSON state dicts ([`StateDict`]).

pub mod layers;
pub mod loss;
pub mod matching;
pub mod mono;
pub mod multi_proj;
pub mod proj;
pub mod state_dict;

pub use matching::{contrastive_loss, MatchingModel, MatchingOutput};
pub use mono::MonoEncoder;
pub use multi_proj::MultiProjEncoder;
pub use proj::ProjEncoder;
pub use state_dict::{StateDict, TensorData};
