//! Retriever: encode a query batch, search the memory index, drop self-hits,
//! and gather the memory bundle for the downstream generator.
//!
//! Query row `i` of the flattened `(heads * batch, dim)` matrix belongs to
//! head `i / batch` and query `i % batch`. Every tensor in the bundle is laid
//! out `(topk, heads, batch)`.

use std::path::Path;

use ndarray::{Array2, Array3};
use tracing::debug;

use recall_core::config::{ModelArgs, RecallConfig};
use recall_core::constants::{ARGS_FILE, MIPS_INDEX_FILE, QUERY_ENCODER_FILE, RESPONSE_ENCODER_FILE};
use recall_core::device::{Device, Located};
use recall_core::errors::{EncoderError, IndexError, MemoryError, RecallResult, RetrievalError};
use recall_core::memory::MemoryBank;
use recall_core::models::{MemoryRetrieval, QueryBatch, RetrieverOutput};
use recall_core::traits::{IQueryEncoder, IVectorIndex};
use recall_core::vocab::{Vocab, Vocabs};
use recall_encoders::{MultiProjEncoder, ProjEncoder, StateDict};
use recall_mips::{augment_query, l2_to_ip, MipsIndex};
use recall_observability::tracing_setup::events;

use crate::exclusion::select_candidates;
use crate::gather::{exact_scores, gather_features, gather_tokens, mem_len_cap};

/// One ranked search result: candidate id, normalized index score, and
/// whether it is the query's own gold target.
#[derive(Debug, Clone, Copy)]
struct Ranked {
    id: usize,
    score: f32,
    self_hit: bool,
}

/// Dense retriever over a fixed memory bank.
#[derive(Debug)]
pub struct Retriever<E, I> {
    encoder: E,
    index: I,
    bank: MemoryBank,
    tgt_vocab: Vocab,
    topk: usize,
    mem_len_ratio: f64,
    allow_hit: bool,
}

impl<E: IQueryEncoder, I: IVectorIndex> Retriever<E, I> {
    /// Wire an encoder, an index built over `bank`'s features, and the bank.
    ///
    /// # Errors
    /// Fails when the index, the bank and the encoder disagree on size or
    /// dimension, or when `topk` is zero.
    pub fn new(encoder: E, index: I, bank: MemoryBank, tgt_vocab: Vocab, topk: usize) -> RecallResult<Self> {
        if topk == 0 {
            return Err(IndexError::InvalidParameter {
                name: "topk".to_string(),
                reason: "must be at least 1".to_string(),
            }
            .into());
        }
        if index.dim() != encoder.output_dim() + 1 {
            return Err(IndexError::DimensionMismatch {
                expected: encoder.output_dim() + 1,
                actual: index.dim(),
            }
            .into());
        }
        if bank.features().dims() != encoder.output_dim() {
            return Err(MemoryError::FeatureDimMismatch {
                expected: encoder.output_dim(),
                actual: bank.features().dims(),
            }
            .into());
        }
        if index.len() != bank.len() {
            return Err(MemoryError::LengthMismatch {
                pool: bank.len(),
                features: index.len(),
            }
            .into());
        }
        Ok(Self {
            encoder,
            index,
            bank,
            tgt_vocab,
            topk,
            mem_len_ratio: recall_core::config::defaults::DEFAULT_MEM_LEN_RATIO,
            allow_hit: recall_core::config::defaults::DEFAULT_ALLOW_HIT,
        })
    }

    /// Override the memory length cap ratio.
    pub fn with_mem_len_ratio(mut self, ratio: f64) -> Self {
        self.mem_len_ratio = ratio;
        self
    }

    /// Set the gold-target policy used by [`Retriever::retrieve`].
    pub fn with_allow_hit(mut self, allow_hit: bool) -> Self {
        self.allow_hit = allow_hit;
        self
    }

    pub fn allow_hit(&self) -> bool {
        self.allow_hit
    }

    pub fn encoder(&self) -> &E {
        &self.encoder
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    pub fn bank(&self) -> &MemoryBank {
        &self.bank
    }

    pub fn num_heads(&self) -> usize {
        self.encoder.num_heads()
    }

    pub fn topk(&self) -> usize {
        self.topk
    }

    /// [`Retriever::work`] with the retriever's own `allow_hit` setting.
    pub fn retrieve(&self, batch: &QueryBatch) -> RecallResult<RetrieverOutput> {
        self.work(batch, self.allow_hit)
    }

    /// Retrieve `topk` memories per head for every query in `batch`.
    ///
    /// With `allow_hit == false`, a candidate whose tokens equal the query's
    /// gold target is skipped and the next-ranked candidate takes its place.
    /// Memory tokens are silently cut to `floor(mem_len_ratio * seq_len)` rows.
    ///
    /// # Errors
    /// `ExclusionUnderfill` when fewer than `topk` candidates survive for any
    /// (head, query); `CandidateOutOfBounds` when the index returns an id the
    /// pool does not hold.
    pub fn work(&self, batch: &QueryBatch, allow_hit: bool) -> RecallResult<RetrieverOutput> {
        let bsz = batch.batch_size();
        let num_heads = self.encoder.num_heads();
        let topk = self.topk;
        let _span = recall_observability::retrieval_span!(bsz, num_heads, topk).entered();

        let encoded = self.encoder.encode(&batch.src_tokens)?;
        let source_device = encoded.vectors.device();
        let vectors = encoded.vectors.to(Device::Host, "query_vectors").into_inner();
        let (heads, vec_bsz, dim) = vectors.dim();
        if heads != num_heads {
            return Err(EncoderError::HeadMismatch {
                expected: num_heads,
                actual: heads,
            }
            .into());
        }
        if vec_bsz != bsz {
            return Err(EncoderError::ShapeMismatch {
                name: "query_vectors".to_string(),
                expected: vec![num_heads, bsz, dim],
                actual: vec![heads, vec_bsz, dim],
            }
            .into());
        }

        let flat = Array2::from_shape_fn((heads * bsz, dim), |(i, d)| vectors[[i / bsz, i % bsz, d]]);
        let augmented = augment_query(flat.view());
        let hits = self.index.search(augmented.view(), topk + 1)?;

        let max_norm = self.bank.max_norm();
        let norm_sq = max_norm * max_norm;
        let inner_products = l2_to_ip(&hits.distances, augmented.view(), max_norm);

        let pool = self.bank.pool();
        let mut indices = Array3::<usize>::zeros((topk, heads, bsz));
        let mut index_scores = Array3::<f32>::zeros((topk, heads, bsz));
        let mut self_hits = 0;
        for (i, (ids, ips)) in hits.ids.iter().zip(&inner_products).enumerate() {
            let (bid, hid) = (i % bsz, i / bsz);
            let gold = batch.tgt_raw_sents[bid].as_slice();
            let ranked = ids
                .iter()
                .zip(ips)
                .map(|(&id, &ip)| {
                    Ok(Ranked {
                        id,
                        score: ip / norm_sq,
                        self_hit: !allow_hit && pool.get(id)? == gold,
                    })
                })
                .collect::<RecallResult<Vec<_>>>()?;
            self_hits += ranked.iter().filter(|r| r.self_hit).count();

            let kept = select_candidates(&ranked, |r| r.self_hit, topk);
            if kept.len() != topk {
                return Err(RetrievalError::ExclusionUnderfill {
                    head: hid,
                    query: bid,
                    topk,
                    survivors: kept.len(),
                }
                .into());
            }
            for (k, r) in kept.iter().enumerate() {
                indices[[k, hid, bid]] = r.id;
                index_scores[[k, hid, bid]] = r.score;
            }
        }
        if !allow_hit {
            events::candidates_excluded(self_hits, heads * bsz);
        }

        let flat_ids: Vec<usize> = indices.iter().copied().collect();
        let max_mem_len = mem_len_cap(batch.seq_len(), self.mem_len_ratio);
        let all_mem_tokens = gather_tokens(pool, &flat_ids, &self.tgt_vocab, max_mem_len)?;
        let mem_feats = gather_features(self.bank.features(), &indices)?;
        let all_mem_scores = Located::on_host(exact_scores(vectors.view(), &mem_feats, max_norm)?)
            .to(source_device, "memory_scores")
            .into_inner();

        let retrieval_raw_sents = (0..bsz)
            .map(|b| {
                let mut sents = Vec::with_capacity(topk * heads);
                for k in 0..topk {
                    for h in 0..heads {
                        sents.push(pool.get(indices[[k, h, b]])?.to_vec());
                    }
                }
                Ok(sents)
            })
            .collect::<RecallResult<Vec<_>>>()?;

        debug!(
            mem_len = all_mem_tokens.nrows(),
            memories = flat_ids.len(),
            "retrieval gathered"
        );

        Ok(RetrieverOutput {
            src: encoded.src,
            src_mask: encoded.src_mask,
            mem: MemoryRetrieval {
                all_mem_tokens,
                all_mem_scores,
                index_scores,
                indices,
                retrieval_raw_sents,
            },
        })
    }
}

impl Retriever<MultiProjEncoder, MipsIndex> {
    /// Load a retriever from a directory written by
    /// [`MemoryBankBuilder`](crate::MemoryBankBuilder) or a trained
    /// matching model plus its bank files.
    ///
    /// The query checkpoint may hold a single-head projection, which is
    /// tiled across `num_heads`, or an already multi-head one. With
    /// `load_response_encoder`, the response encoder is returned as well.
    pub fn from_pretrained(
        num_heads: usize,
        vocabs: &Vocabs,
        input_dir: impl AsRef<Path>,
        nprobe: usize,
        topk: usize,
        device: Device,
        load_response_encoder: bool,
    ) -> RecallResult<(Self, Option<ProjEncoder>)> {
        let dir = input_dir.as_ref();
        let args = ModelArgs::load(dir.join(ARGS_FILE))?;

        let query_sd = StateDict::load(dir.join(QUERY_ENCODER_FILE))?;
        let single_head = query_sd.get("proj.weight")?.shape.first() == Some(&args.output_dim);
        let encoder = if single_head {
            MultiProjEncoder::from_projencoder_state(num_heads, query_sd, &vocabs.src, &args)?
        } else {
            MultiProjEncoder::from_state(num_heads, &query_sd, &vocabs.src, &args)?
        }
        .to_device(device);

        let mut index = MipsIndex::load(dir.join(MIPS_INDEX_FILE), nprobe)?;
        index.to_device(device);
        let bank = MemoryBank::load(dir)?;

        let response_encoder = if load_response_encoder {
            Some(
                ProjEncoder::from_pretrained(&vocabs.tgt, &args, dir.join(RESPONSE_ENCODER_FILE))?
                    .to_device(device),
            )
        } else {
            None
        };

        let retriever = Self::new(encoder, index, bank, vocabs.tgt.clone(), topk)?;
        Ok((retriever, response_encoder))
    }

    /// [`Retriever::from_pretrained`] driven by a [`RecallConfig`].
    pub fn from_config(
        config: &RecallConfig,
        vocabs: &Vocabs,
        input_dir: impl AsRef<Path>,
        load_response_encoder: bool,
    ) -> RecallResult<(Self, Option<ProjEncoder>)> {
        let device: Device = config.retrieval.device.parse()?;
        let (retriever, response) = Self::from_pretrained(
            config.retrieval.num_heads,
            vocabs,
            input_dir,
            config.index.nprobe,
            config.retrieval.topk,
            device,
            load_response_encoder,
        )?;
        let retriever = retriever
            .with_mem_len_ratio(config.retrieval.mem_len_ratio)
            .with_allow_hit(config.retrieval.allow_hit);
        Ok((retriever, response))
    }
}
