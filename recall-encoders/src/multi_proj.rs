//! Multi-head projection encoder.
//!
//! One shared [`MonoEncoder`] pass feeds a single `embed_dim -> heads * output_dim`
//! projection; each head's slice is layer-normalized on its own. A trained
//! single-head [`ProjEncoder`](crate::ProjEncoder) checkpoint can seed every
//! head via [`MultiProjEncoder::from_pretrained_projencoder`].

use std::path::Path;

use ndarray::{Array2, Array3};
use rand::rngs::StdRng;
use rand::SeedableRng;

use recall_core::config::ModelArgs;
use recall_core::device::{Device, Located};
use recall_core::errors::{EncoderError, RecallResult};
use recall_core::models::EncodedQuery;
use recall_core::traits::IQueryEncoder;
use recall_core::vocab::Vocab;

use crate::layers::{layer_norm_rows, Linear};
use crate::mono::{first_position, MonoEncoder};
use crate::state_dict::StateDict;

#[derive(Debug, Clone)]
pub struct MultiProjEncoder {
    encoder: MonoEncoder,
    proj: Linear,
    num_heads: usize,
    output_dim: usize,
    device: Device,
}

impl MultiProjEncoder {
    pub fn new(num_heads: usize, vocab: &Vocab, args: &ModelArgs, seed: u64) -> RecallResult<Self> {
        check_heads(num_heads)?;
        let mut rng = StdRng::seed_from_u64(seed);
        let encoder = MonoEncoder::new(vocab, args, &mut rng)?;
        let proj = Linear::init(&mut rng, args.embed_dim, num_heads * args.output_dim);
        Ok(Self {
            encoder,
            proj,
            num_heads,
            output_dim: args.output_dim,
            device: Device::Host,
        })
    }

    pub fn from_state(
        num_heads: usize,
        sd: &StateDict,
        vocab: &Vocab,
        args: &ModelArgs,
    ) -> RecallResult<Self> {
        check_heads(num_heads)?;
        Ok(Self {
            encoder: MonoEncoder::from_state(&sd.sub_dict("encoder"), vocab, args)?,
            proj: Linear::from_state(sd, "proj", args.embed_dim, num_heads * args.output_dim)?,
            num_heads,
            output_dim: args.output_dim,
            device: Device::Host,
        })
    }

    /// Load a multi-head checkpoint.
    pub fn from_pretrained(
        num_heads: usize,
        vocab: &Vocab,
        args: &ModelArgs,
        path: impl AsRef<Path>,
    ) -> RecallResult<Self> {
        Self::from_state(num_heads, &StateDict::load(path)?, vocab, args)
    }

    /// Build from a single-head `ProjEncoder` checkpoint by tiling its
    /// projection weight and bias `num_heads` times. Every head starts out
    /// identical to the source encoder.
    pub fn from_pretrained_projencoder(
        num_heads: usize,
        vocab: &Vocab,
        args: &ModelArgs,
        path: impl AsRef<Path>,
    ) -> RecallResult<Self> {
        Self::from_projencoder_state(num_heads, StateDict::load(path)?, vocab, args)
    }

    /// [`MultiProjEncoder::from_pretrained_projencoder`] over an already loaded state dict.
    pub fn from_projencoder_state(
        num_heads: usize,
        mut sd: StateDict,
        vocab: &Vocab,
        args: &ModelArgs,
    ) -> RecallResult<Self> {
        check_heads(num_heads)?;
        // Validate the single-head shapes before tiling.
        sd.matrix("proj.weight", args.output_dim, args.embed_dim)?;
        sd.vector("proj.bias", args.output_dim)?;
        let weight = sd.replicate("proj.weight", num_heads)?;
        let bias = sd.replicate("proj.bias", num_heads)?;
        sd.insert("proj.weight", weight);
        sd.insert("proj.bias", bias);
        Self::from_state(num_heads, &sd, vocab, args)
    }

    pub fn state_dict(&self) -> StateDict {
        let mut sd = StateDict::new();
        sd.extend_prefixed("encoder", self.encoder.state_dict());
        self.proj.write_state(&mut sd, "proj");
        sd
    }

    pub fn save(&self, path: impl AsRef<Path>) -> RecallResult<()> {
        self.state_dict().save(path)
    }

    pub fn to_device(mut self, device: Device) -> Self {
        if self.device != device {
            recall_observability::tracing_setup::events::device_transfer(
                "multi_proj_encoder",
                &self.device.to_string(),
                &device.to_string(),
            );
            self.device = device;
        }
        self
    }

    /// `(seq_len, batch)` ids to `(heads, batch, output_dim)` vectors.
    pub fn forward(&self, input_ids: &Array2<usize>) -> RecallResult<Array3<f32>> {
        Ok(self.forward_with_src(input_ids)?.0)
    }

    pub fn forward_with_src(
        &self,
        input_ids: &Array2<usize>,
    ) -> RecallResult<(Array3<f32>, Array3<f32>, Array2<bool>)> {
        let (src, src_mask) = self.encoder.forward(input_ids)?;
        let projected = self.proj.forward(first_position(&src));
        let batch = projected.nrows();

        // (batch, heads * out) viewed as (batch * heads, out) so each head
        // normalizes independently.
        let mut per_head = projected
            .into_shape_with_order((batch * self.num_heads, self.output_dim))
            .map_err(|_| EncoderError::ShapeMismatch {
                name: "proj.output".to_string(),
                expected: vec![batch * self.num_heads, self.output_dim],
                actual: vec![batch, self.num_heads * self.output_dim],
            })?;
        layer_norm_rows(&mut per_head);

        let out = Array3::from_shape_fn((self.num_heads, batch, self.output_dim), |(h, b, d)| {
            per_head[[b * self.num_heads + h, d]]
        });
        Ok((out, src, src_mask))
    }
}

impl IQueryEncoder for MultiProjEncoder {
    fn encode(&self, src_tokens: &Array2<usize>) -> RecallResult<EncodedQuery> {
        let _span = recall_observability::encode_span!("multi_proj", src_tokens.ncols()).entered();
        let (out, src, src_mask) = self.forward_with_src(src_tokens)?;
        Ok(EncodedQuery {
            vectors: Located::new(out, self.device),
            src,
            src_mask,
        })
    }

    fn num_heads(&self) -> usize {
        self.num_heads
    }

    fn output_dim(&self) -> usize {
        self.output_dim
    }

    fn device(&self) -> Device {
        self.device
    }
}

fn check_heads(num_heads: usize) -> RecallResult<()> {
    if num_heads == 0 {
        return Err(EncoderError::HeadMismatch {
            expected: 1,
            actual: 0,
        }
        .into());
    }
    Ok(())
}
