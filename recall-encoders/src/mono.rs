//! MonoEncoder: the shared transformer encoder under the projection heads.
//!
//! Token embedding scaled by `sqrt(embed_dim)` plus sinusoidal positions,
//! layer-normed, then `layers` post-LN transformer blocks with padding-masked
//! multi-head self-attention and a GELU feed-forward.

use ndarray::{s, Array2, Array3, ArrayView2};
use rand::Rng;

use recall_core::config::ModelArgs;
use recall_core::errors::{EncoderError, RecallError, RecallResult};
use recall_core::vocab::Vocab;

use crate::layers::{gelu, normal_matrix, sinusoidal_positions, softmax_rows, LayerNorm, Linear};
use crate::state_dict::StateDict;

#[derive(Debug, Clone)]
struct TransformerLayer {
    q_proj: Linear,
    k_proj: Linear,
    v_proj: Linear,
    out_proj: Linear,
    attn_layer_norm: LayerNorm,
    fc1: Linear,
    fc2: Linear,
    ff_layer_norm: LayerNorm,
}

impl TransformerLayer {
    fn init<R: Rng + ?Sized>(rng: &mut R, embed_dim: usize, ff_embed_dim: usize) -> Self {
        Self {
            q_proj: Linear::init(rng, embed_dim, embed_dim),
            k_proj: Linear::init(rng, embed_dim, embed_dim),
            v_proj: Linear::init(rng, embed_dim, embed_dim),
            out_proj: Linear::init(rng, embed_dim, embed_dim),
            attn_layer_norm: LayerNorm::new(embed_dim),
            fc1: Linear::init(rng, embed_dim, ff_embed_dim),
            fc2: Linear::init(rng, ff_embed_dim, embed_dim),
            ff_layer_norm: LayerNorm::new(embed_dim),
        }
    }

    fn from_state(sd: &StateDict, embed_dim: usize, ff_embed_dim: usize) -> RecallResult<Self> {
        Ok(Self {
            q_proj: Linear::from_state(sd, "q_proj", embed_dim, embed_dim)?,
            k_proj: Linear::from_state(sd, "k_proj", embed_dim, embed_dim)?,
            v_proj: Linear::from_state(sd, "v_proj", embed_dim, embed_dim)?,
            out_proj: Linear::from_state(sd, "out_proj", embed_dim, embed_dim)?,
            attn_layer_norm: LayerNorm::from_state(sd, "attn_layer_norm", embed_dim)?,
            fc1: Linear::from_state(sd, "fc1", embed_dim, ff_embed_dim)?,
            fc2: Linear::from_state(sd, "fc2", ff_embed_dim, embed_dim)?,
            ff_layer_norm: LayerNorm::from_state(sd, "ff_layer_norm", embed_dim)?,
        })
    }

    fn write_state(&self, sd: &mut StateDict) {
        self.q_proj.write_state(sd, "q_proj");
        self.k_proj.write_state(sd, "k_proj");
        self.v_proj.write_state(sd, "v_proj");
        self.out_proj.write_state(sd, "out_proj");
        self.attn_layer_norm.write_state(sd, "attn_layer_norm");
        self.fc1.write_state(sd, "fc1");
        self.fc2.write_state(sd, "fc2");
        self.ff_layer_norm.write_state(sd, "ff_layer_norm");
    }

    /// One sequence: `x` is `(seq_len, embed_dim)`, `pad[t]` marks padding keys.
    fn forward(&self, x: Array2<f32>, pad: &[bool], num_heads: usize) -> Array2<f32> {
        let (seq_len, embed_dim) = x.dim();
        let head_dim = embed_dim / num_heads;
        let scale = (head_dim as f32).sqrt();

        let q = self.q_proj.forward(x.view());
        let k = self.k_proj.forward(x.view());
        let v = self.v_proj.forward(x.view());

        let mut attended = Array2::<f32>::zeros((seq_len, embed_dim));
        for h in 0..num_heads {
            let cols = s![.., h * head_dim..(h + 1) * head_dim];
            let mut scores = q.slice(cols).dot(&k.slice(cols).t()) / scale;
            for (t, &is_pad) in pad.iter().enumerate() {
                if is_pad {
                    scores.column_mut(t).fill(f32::NEG_INFINITY);
                }
            }
            softmax_rows(&mut scores);
            attended.slice_mut(cols).assign(&scores.dot(&v.slice(cols)));
        }

        let x = self
            .attn_layer_norm
            .forward(x + self.out_proj.forward(attended.view()));
        let hidden = self.fc1.forward(x.view()).mapv(gelu);
        let ff = self.fc2.forward(hidden.view());
        self.ff_layer_norm.forward(x + ff)
    }
}

/// Transformer encoder over a `(seq_len, batch)` token tensor.
#[derive(Debug, Clone)]
pub struct MonoEncoder {
    embed_tokens: Array2<f32>,
    emb_layer_norm: LayerNorm,
    layers: Vec<TransformerLayer>,
    padding_idx: usize,
    unk_idx: usize,
    embed_dim: usize,
    num_heads: usize,
}

impl MonoEncoder {
    /// Fresh weights from `rng`. Embeddings are drawn `N(0, embed_dim^-0.5)`
    /// with the padding row zeroed.
    pub fn new<R: Rng + ?Sized>(vocab: &Vocab, args: &ModelArgs, rng: &mut R) -> RecallResult<Self> {
        validate_args(args)?;
        let mut embed_tokens = normal_matrix(
            rng,
            vocab.len(),
            args.embed_dim,
            (args.embed_dim as f32).powf(-0.5),
        );
        embed_tokens.row_mut(vocab.padding_idx()).fill(0.0);
        Ok(Self {
            embed_tokens,
            emb_layer_norm: LayerNorm::new(args.embed_dim),
            layers: (0..args.layers)
                .map(|_| TransformerLayer::init(rng, args.embed_dim, args.ff_embed_dim))
                .collect(),
            padding_idx: vocab.padding_idx(),
            unk_idx: vocab.unk_idx(),
            embed_dim: args.embed_dim,
            num_heads: args.num_heads,
        })
    }

    /// Load from a state dict whose keys are relative to the encoder.
    pub fn from_state(sd: &StateDict, vocab: &Vocab, args: &ModelArgs) -> RecallResult<Self> {
        validate_args(args)?;
        let layers = (0..args.layers)
            .map(|i| {
                TransformerLayer::from_state(
                    &sd.sub_dict(&format!("layers.{i}")),
                    args.embed_dim,
                    args.ff_embed_dim,
                )
            })
            .collect::<RecallResult<Vec<_>>>()?;
        Ok(Self {
            embed_tokens: sd.matrix("embed_tokens.weight", vocab.len(), args.embed_dim)?,
            emb_layer_norm: LayerNorm::from_state(sd, "emb_layer_norm", args.embed_dim)?,
            layers,
            padding_idx: vocab.padding_idx(),
            unk_idx: vocab.unk_idx(),
            embed_dim: args.embed_dim,
            num_heads: args.num_heads,
        })
    }

    pub fn state_dict(&self) -> StateDict {
        let mut sd = StateDict::new();
        sd.insert_matrix("embed_tokens.weight", &self.embed_tokens);
        self.emb_layer_norm.write_state(&mut sd, "emb_layer_norm");
        for (i, layer) in self.layers.iter().enumerate() {
            let mut layer_sd = StateDict::new();
            layer.write_state(&mut layer_sd);
            sd.extend_prefixed(&format!("layers.{i}"), layer_sd);
        }
        sd
    }

    pub fn embed_dim(&self) -> usize {
        self.embed_dim
    }

    /// Encode `(seq_len, batch)` ids into `(seq_len, batch, embed_dim)`
    /// hidden states and a `(seq_len, batch)` padding mask.
    ///
    /// Ids outside the vocabulary are read as `<unk>`.
    pub fn forward(&self, input_ids: &Array2<usize>) -> RecallResult<(Array3<f32>, Array2<bool>)> {
        let (seq_len, batch) = input_ids.dim();
        if seq_len == 0 || batch == 0 {
            return Err(EncoderError::EmptyBatch.into());
        }
        let vocab_size = self.embed_tokens.nrows();
        let scale = (self.embed_dim as f32).sqrt();
        let positions = sinusoidal_positions(seq_len, self.embed_dim);
        let mask = input_ids.mapv(|id| id == self.padding_idx);

        let mut out = Array3::<f32>::zeros((seq_len, batch, self.embed_dim));
        for b in 0..batch {
            let ids = input_ids.column(b);
            let pad: Vec<bool> = mask.column(b).to_vec();

            let mut x = Array2::<f32>::zeros((seq_len, self.embed_dim));
            for (t, &id) in ids.iter().enumerate() {
                let id = if id < vocab_size { id } else { self.unk_idx };
                let mut row = x.row_mut(t);
                row.assign(&self.embed_tokens.row(id));
                row.mapv_inplace(|v| v * scale);
                row += &positions.row(t);
            }
            let mut x = self.emb_layer_norm.forward(x);
            for layer in &self.layers {
                x = layer.forward(x, &pad, self.num_heads);
            }
            out.slice_mut(s![.., b, ..]).assign(&x);
        }
        Ok((out, mask))
    }
}

/// Position-0 hidden state of every sequence: `(batch, embed_dim)`.
pub fn first_position(src: &Array3<f32>) -> ArrayView2<'_, f32> {
    src.slice(s![0, .., ..])
}

fn validate_args(args: &ModelArgs) -> RecallResult<()> {
    if args.embed_dim == 0 || args.num_heads == 0 || args.embed_dim % args.num_heads != 0 {
        return Err(RecallError::Config {
            reason: format!(
                "embed_dim {} must be a positive multiple of num_heads {}",
                args.embed_dim, args.num_heads
            ),
        });
    }
    Ok(())
}
