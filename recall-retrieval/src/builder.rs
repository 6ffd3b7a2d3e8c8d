//! MemoryBankBuilder: encode a candidate corpus with the response encoder,
//! build the MIPS index over it, and write a directory that
//! [`Retriever::from_pretrained`](crate::Retriever::from_pretrained) can load.

use std::path::Path;

use ndarray::{s, Array2};
use tracing::info;

use recall_core::config::{IndexConfig, ModelArgs, RecallConfig};
use recall_core::constants::MIPS_INDEX_FILE;
use recall_core::errors::{IndexError, RecallResult};
use recall_core::memory::{FeatureTable, MemoryBank, MemoryPool};
use recall_core::vocab::{lists_to_tensor_with_bos, Vocab};
use recall_encoders::{MatchingModel, ProjEncoder};
use recall_mips::MipsIndex;
use recall_observability::tracing_setup::events;

pub struct MemoryBankBuilder<'a> {
    model: &'a MatchingModel,
    args: &'a ModelArgs,
    tgt_vocab: &'a Vocab,
    index_config: IndexConfig,
    batch_size: usize,
}

impl<'a> MemoryBankBuilder<'a> {
    pub fn new(model: &'a MatchingModel, args: &'a ModelArgs, tgt_vocab: &'a Vocab, index_config: IndexConfig) -> Self {
        Self {
            model,
            args,
            tgt_vocab,
            index_config,
            batch_size: recall_core::config::defaults::DEFAULT_BUILD_BATCH_SIZE,
        }
    }

    /// Builder whose index section, encode batch size and persisted
    /// hyperparameters all come from `config`.
    pub fn from_config(model: &'a MatchingModel, tgt_vocab: &'a Vocab, config: &'a RecallConfig) -> Self {
        Self::new(model, &config.encoder, tgt_vocab, config.index.clone())
            .with_batch_size(config.retrieval.build_batch_size)
    }

    /// Candidates encoded per forward pass. Zero is treated as one.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// One response-encoder vector per candidate, in pool order.
    pub fn encode_pool(&self, pool: &MemoryPool) -> RecallResult<FeatureTable> {
        encode_candidates(&self.model.response_encoder, pool, self.tgt_vocab, self.batch_size)
    }

    /// Encode `pool` and index it. The bank's max norm is the one used to
    /// augment the index.
    pub fn build(&self, pool: MemoryPool) -> RecallResult<(MemoryBank, MipsIndex)> {
        if pool.is_empty() {
            return Err(IndexError::EmptyIndex.into());
        }
        let _span = recall_observability::build_span!(pool.len()).entered();
        let features = self.encode_pool(&pool)?;
        let (index, max_norm) = MipsIndex::build(features.view(), &self.index_config)?;
        let bank = MemoryBank::new(pool, features, max_norm)?;
        Ok((bank, index))
    }

    /// [`MemoryBankBuilder::build`], then write the bank, the index, both
    /// encoder checkpoints and `args.json` into `output_dir`.
    pub fn build_to_dir(&self, pool: MemoryPool, output_dir: impl AsRef<Path>) -> RecallResult<MemoryBank> {
        let dir = output_dir.as_ref();
        let (bank, index) = self.build(pool)?;
        self.model.save(self.args, dir)?;
        bank.save(dir)?;
        index.save(dir.join(MIPS_INDEX_FILE))?;
        events::bank_built(&dir.display().to_string(), bank.len(), bank.max_norm());
        Ok(bank)
    }
}

/// Encode every candidate (prefixed with `<bos>`) in batches of `batch_size`.
pub fn encode_candidates(
    encoder: &ProjEncoder,
    pool: &MemoryPool,
    vocab: &Vocab,
    batch_size: usize,
) -> RecallResult<FeatureTable> {
    let candidates: Vec<&[String]> = pool.iter().collect();
    let mut features = Array2::<f32>::zeros((candidates.len(), encoder.output_dim()));
    let batch_size = batch_size.max(1);
    for (chunk_no, chunk) in candidates.chunks(batch_size).enumerate() {
        let lists: Vec<Vec<&str>> = chunk
            .iter()
            .map(|c| c.iter().map(String::as_str).collect())
            .collect();
        let tokens = lists_to_tensor_with_bos(&lists, vocab);
        let encoded = encoder.forward(&tokens)?;
        let start = chunk_no * batch_size;
        features
            .slice_mut(s![start..start + chunk.len(), ..])
            .assign(&encoded);
    }
    info!(candidates = candidates.len(), batch_size, "candidates encoded");
    Ok(FeatureTable::new(features))
}
