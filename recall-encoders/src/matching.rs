//! Query/response pair scorer trained with in-batch negatives.

use std::path::Path;

use ndarray::{Array1, Array2, ArrayView2, Axis};

use recall_core::config::{ModelArgs, RecallConfig};
use recall_core::constants::{ARGS_FILE, QUERY_ENCODER_FILE, RESPONSE_ENCODER_FILE};
use recall_core::errors::{EncoderError, RecallResult};
use recall_core::vocab::Vocabs;

use crate::loss::{diagonal_accuracy, label_smoothed_nll_loss, log_softmax_rows};
use crate::proj::ProjEncoder;

/// Loss and accuracy over one batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchingOutput {
    /// Label-smoothed cross-entropy, averaged over the batch.
    pub loss: f32,
    /// Fraction of queries whose best-scoring response is their own.
    pub acc: f32,
    pub bsz: usize,
}

#[derive(Debug, Clone)]
pub struct MatchingModel {
    pub query_encoder: ProjEncoder,
    pub response_encoder: ProjEncoder,
}

impl MatchingModel {
    pub fn new(query_encoder: ProjEncoder, response_encoder: ProjEncoder) -> Self {
        Self {
            query_encoder,
            response_encoder,
        }
    }

    /// Score every query against every response in the batch; query `i`
    /// pairs with response `i`.
    pub fn forward(
        &self,
        query: &Array2<usize>,
        response: &Array2<usize>,
        label_smoothing: f32,
    ) -> RecallResult<MatchingOutput> {
        let (q, r) = self.encode_pair(query, response)?;
        let scores = q.dot(&r.t());
        Ok(contrastive_loss(scores.view(), label_smoothing))
    }

    /// Paired scores only: `sum(q_i * r_i)` per position.
    pub fn work(&self, query: &Array2<usize>, response: &Array2<usize>) -> RecallResult<Array1<f32>> {
        let (q, r) = self.encode_pair(query, response)?;
        Ok((q * r).sum_axis(Axis(1)))
    }

    fn encode_pair(
        &self,
        query: &Array2<usize>,
        response: &Array2<usize>,
    ) -> RecallResult<(Array2<f32>, Array2<f32>)> {
        if query.ncols() != response.ncols() {
            return Err(EncoderError::ShapeMismatch {
                name: "response batch".to_string(),
                expected: vec![query.ncols()],
                actual: vec![response.ncols()],
            }
            .into());
        }
        let q = {
            let _span = recall_observability::encode_span!("query", query.ncols()).entered();
            self.query_encoder.forward(query)?
        };
        let r = {
            let _span = recall_observability::encode_span!("response", response.ncols()).entered();
            self.response_encoder.forward(response)?
        };
        Ok((q, r))
    }

    /// Write both encoder checkpoints and `args.json` into `output_dir`.
    pub fn save(&self, model_args: &ModelArgs, output_dir: impl AsRef<Path>) -> RecallResult<()> {
        let dir = output_dir.as_ref();
        std::fs::create_dir_all(dir)?;
        self.query_encoder.save(dir.join(QUERY_ENCODER_FILE))?;
        self.response_encoder.save(dir.join(RESPONSE_ENCODER_FILE))?;
        model_args.save(dir.join(ARGS_FILE))
    }

    /// Fresh encoders: the query side over the source vocabulary, the
    /// response side over the target vocabulary.
    pub fn from_params(vocabs: &Vocabs, args: &ModelArgs, seed: u64) -> RecallResult<Self> {
        Ok(Self::new(
            ProjEncoder::new(&vocabs.src, args, seed)?,
            ProjEncoder::new(&vocabs.tgt, args, seed.wrapping_add(1))?,
        ))
    }

    /// [`MatchingModel::from_params`] with the `[encoder]` section of `config`.
    pub fn from_config(vocabs: &Vocabs, config: &RecallConfig, seed: u64) -> RecallResult<Self> {
        Self::from_params(vocabs, &config.encoder, seed)
    }

    pub fn from_pretrained(vocabs: &Vocabs, input_dir: impl AsRef<Path>) -> RecallResult<Self> {
        let dir = input_dir.as_ref();
        let args = ModelArgs::load(dir.join(ARGS_FILE))?;
        Ok(Self::new(
            ProjEncoder::from_pretrained(&vocabs.src, &args, dir.join(QUERY_ENCODER_FILE))?,
            ProjEncoder::from_pretrained(&vocabs.tgt, &args, dir.join(RESPONSE_ENCODER_FILE))?,
        ))
    }
}

/// In-batch contrastive loss over a `(bsz, bsz)` score matrix whose gold
/// labels are the diagonal.
pub fn contrastive_loss(scores: ArrayView2<'_, f32>, label_smoothing: f32) -> MatchingOutput {
    let bsz = scores.nrows();
    let gold: Vec<usize> = (0..bsz).collect();
    let acc = diagonal_accuracy(scores);
    let lprobs = log_softmax_rows(scores);
    let (loss, _) = label_smoothed_nll_loss(lprobs.view(), &gold, label_smoothing);
    MatchingOutput {
        loss: if bsz == 0 { 0.0 } else { loss / bsz as f32 },
        acc,
        bsz,
    }
}
