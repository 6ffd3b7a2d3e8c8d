//! Shared helpers for retrieval integration tests.
#![allow(dead_code)]

use ndarray::{Array2, Array3};

use recall_core::config::IndexConfig;
use recall_core::device::{Device, Located};
use recall_core::errors::RecallResult;
use recall_core::memory::{FeatureTable, MemoryBank, MemoryPool};
use recall_core::models::EncodedQuery;
use recall_core::traits::IQueryEncoder;
use recall_core::vocab::Vocab;
use recall_mips::MipsIndex;

/// Returns the same `(heads, batch, dim)` vectors for any token batch.
pub struct FixedEncoder {
    pub vectors: Array3<f32>,
    pub device: Device,
}

impl FixedEncoder {
    /// `vectors[head][query][dim]`.
    pub fn from_nested(vectors: &[Vec<Vec<f32>>]) -> Self {
        let heads = vectors.len();
        let batch = vectors[0].len();
        let dim = vectors[0][0].len();
        Self {
            vectors: Array3::from_shape_fn((heads, batch, dim), |(h, b, d)| vectors[h][b][d]),
            device: Device::Host,
        }
    }
}

impl IQueryEncoder for FixedEncoder {
    fn encode(&self, src_tokens: &Array2<usize>) -> RecallResult<EncodedQuery> {
        let (seq, bsz) = src_tokens.dim();
        Ok(EncodedQuery {
            vectors: Located::new(self.vectors.clone(), self.device),
            src: Array3::from_elem((seq, bsz, 2), 0.5),
            src_mask: src_tokens.mapv(|t| t == 0),
        })
    }

    fn num_heads(&self) -> usize {
        self.vectors.dim().0
    }

    fn output_dim(&self) -> usize {
        self.vectors.dim().2
    }

    fn device(&self) -> Device {
        self.device
    }
}

pub fn flat_config() -> IndexConfig {
    IndexConfig {
        kind: "flat".to_string(),
        ..IndexConfig::default()
    }
}

/// A bank over `lines` with `features`, and an exact index built from it.
pub fn bank_and_index<S: AsRef<str>>(lines: &[S], features: &[Vec<f32>]) -> (MemoryBank, MipsIndex) {
    let table = FeatureTable::from_rows(features).unwrap();
    let (index, max_norm) = MipsIndex::build(table.view(), &flat_config()).unwrap();
    let pool = MemoryPool::from_lines(lines.iter().map(|l| l.as_ref()));
    (MemoryBank::new(pool, table, max_norm).unwrap(), index)
}

/// Vocabulary holding every whitespace token of `lines`.
pub fn vocab_for<S: AsRef<str>>(lines: &[S]) -> Vocab {
    Vocab::from_tokens(
        lines
            .iter()
            .flat_map(|l| l.as_ref().split_whitespace().map(str::to_string).collect::<Vec<_>>()),
    )
}

pub fn tokens(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}
