//! Single-head projection encoder: `layer_norm(proj(encoder(x)[0]))`.

use std::path::Path;

use ndarray::{Array2, Array3, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;

use recall_core::config::ModelArgs;
use recall_core::device::{Device, Located};
use recall_core::errors::RecallResult;
use recall_core::models::EncodedQuery;
use recall_core::traits::IQueryEncoder;
use recall_core::vocab::Vocab;

use crate::layers::{layer_norm_rows, Linear};
use crate::mono::{first_position, MonoEncoder};
use crate::state_dict::StateDict;

/// Encodes a token batch into one normalized vector per sequence.
#[derive(Debug, Clone)]
pub struct ProjEncoder {
    encoder: MonoEncoder,
    proj: Linear,
    device: Device,
}

impl ProjEncoder {
    /// Fresh weights from a seeded RNG.
    pub fn new(vocab: &Vocab, args: &ModelArgs, seed: u64) -> RecallResult<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        let encoder = MonoEncoder::new(vocab, args, &mut rng)?;
        let proj = Linear::init(&mut rng, args.embed_dim, args.output_dim);
        Ok(Self {
            encoder,
            proj,
            device: Device::Host,
        })
    }

    pub fn from_state(sd: &StateDict, vocab: &Vocab, args: &ModelArgs) -> RecallResult<Self> {
        Ok(Self {
            encoder: MonoEncoder::from_state(&sd.sub_dict("encoder"), vocab, args)?,
            proj: Linear::from_state(sd, "proj", args.embed_dim, args.output_dim)?,
            device: Device::Host,
        })
    }

    /// Load a checkpoint written by [`ProjEncoder::save`].
    pub fn from_pretrained(vocab: &Vocab, args: &ModelArgs, path: impl AsRef<Path>) -> RecallResult<Self> {
        let sd = StateDict::load(path)?;
        Self::from_state(&sd, vocab, args)
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

    pub fn output_dim(&self) -> usize {
        self.proj.output_dim()
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Re-tag the encoder's outputs for `device`.
    pub fn to_device(mut self, device: Device) -> Self {
        if self.device != device {
            recall_observability::tracing_setup::events::device_transfer(
                "proj_encoder",
                &self.device.to_string(),
                &device.to_string(),
            );
            self.device = device;
        }
        self
    }

    /// `(seq_len, batch)` ids to `(batch, output_dim)` vectors.
    pub fn forward(&self, input_ids: &Array2<usize>) -> RecallResult<Array2<f32>> {
        Ok(self.forward_with_src(input_ids)?.0)
    }

    /// Like [`ProjEncoder::forward`], also returning the hidden states and padding mask.
    pub fn forward_with_src(
        &self,
        input_ids: &Array2<usize>,
    ) -> RecallResult<(Array2<f32>, Array3<f32>, Array2<bool>)> {
        let (src, src_mask) = self.encoder.forward(input_ids)?;
        let mut out = self.proj.forward(first_position(&src));
        layer_norm_rows(&mut out);
        Ok((out, src, src_mask))
    }
}

impl IQueryEncoder for ProjEncoder {
    fn encode(&self, src_tokens: &Array2<usize>) -> RecallResult<EncodedQuery> {
        let _span = recall_observability::encode_span!("proj", src_tokens.ncols()).entered();
        let (out, src, src_mask) = self.forward_with_src(src_tokens)?;
        Ok(EncodedQuery {
            vectors: Located::new(out.insert_axis(Axis(0)), self.device),
            src,
            src_mask,
        })
    }

    fn num_heads(&self) -> usize {
        1
    }

    fn output_dim(&self) -> usize {
        self.proj.output_dim()
    }

    fn device(&self) -> Device {
        self.device
    }
}
