//! Dense building blocks shared by the encoders.

use ndarray::{Array1, Array2, ArrayView2};
use rand::Rng;
use rand_distr::StandardNormal;

use recall_core::constants::LAYER_NORM_EPS;
use recall_core::errors::RecallResult;

use crate::state_dict::StateDict;

/// Draw a `(rows, cols)` matrix from `N(0, std)`.
pub fn normal_matrix<R: Rng + ?Sized>(rng: &mut R, rows: usize, cols: usize, std: f32) -> Array2<f32> {
    Array2::from_shape_fn((rows, cols), |_| {
        let z: f32 = rng.sample(StandardNormal);
        z * std
    })
}

/// Parameter-free layer norm over each row, in place.
pub fn layer_norm_rows(x: &mut Array2<f32>) {
    for mut row in x.rows_mut() {
        let n = row.len().max(1) as f32;
        let mean = row.sum() / n;
        let var = row.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / n;
        let denom = (var + LAYER_NORM_EPS).sqrt();
        row.mapv_inplace(|v| (v - mean) / denom);
    }
}

/// Row-wise softmax, in place. `-inf` entries get zero weight.
pub fn softmax_rows(x: &mut Array2<f32>) {
    for mut row in x.rows_mut() {
        let max = row.fold(f32::NEG_INFINITY, |a, &b| a.max(b));
        if !max.is_finite() {
            row.fill(0.0);
            continue;
        }
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
}

/// tanh approximation of GELU.
pub fn gelu(x: f32) -> f32 {
    const SQRT_2_OVER_PI: f32 = 0.797_884_6;
    0.5 * x * (1.0 + (SQRT_2_OVER_PI * (x + 0.044_715 * x * x * x)).tanh())
}

/// Sinusoidal position table, shape `(len, dim)`: sines in the first half,
/// cosines in the second, a zero column if `dim` is odd.
pub fn sinusoidal_positions(len: usize, dim: usize) -> Array2<f32> {
    let half = dim / 2;
    let step = if half > 1 {
        (10_000f32).ln() / (half - 1) as f32
    } else {
        0.0
    };
    Array2::from_shape_fn((len, dim), |(pos, i)| {
        if i >= 2 * half {
            return 0.0;
        }
        let k = i % half.max(1);
        let angle = pos as f32 * (-(k as f32) * step).exp();
        if i < half {
            angle.sin()
        } else {
            angle.cos()
        }
    })
}

/// `y = x Wᵀ + b` with `W` shaped `(out, in)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Linear {
    pub weight: Array2<f32>,
    pub bias: Array1<f32>,
}

impl Linear {
    /// Weights from `N(0, 0.02)`, zero bias.
    pub fn init<R: Rng + ?Sized>(rng: &mut R, input: usize, output: usize) -> Self {
        Self {
            weight: normal_matrix(rng, output, input, 0.02),
            bias: Array1::zeros(output),
        }
    }

    pub fn from_state(sd: &StateDict, prefix: &str, input: usize, output: usize) -> RecallResult<Self> {
        Ok(Self {
            weight: sd.matrix(&format!("{prefix}.weight"), output, input)?,
            bias: sd.vector(&format!("{prefix}.bias"), output)?,
        })
    }

    pub fn write_state(&self, sd: &mut StateDict, prefix: &str) {
        sd.insert_matrix(format!("{prefix}.weight"), &self.weight);
        sd.insert_vector(format!("{prefix}.bias"), &self.bias);
    }

    pub fn input_dim(&self) -> usize {
        self.weight.ncols()
    }

    pub fn output_dim(&self) -> usize {
        self.weight.nrows()
    }

    /// `x`: `(n, in)` → `(n, out)`.
    pub fn forward(&self, x: ArrayView2<'_, f32>) -> Array2<f32> {
        let mut y = x.dot(&self.weight.t());
        y += &self.bias;
        y
    }
}

/// Layer norm with learned gain and bias.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerNorm {
    pub weight: Array1<f32>,
    pub bias: Array1<f32>,
}

impl LayerNorm {
    pub fn new(dim: usize) -> Self {
        Self {
            weight: Array1::ones(dim),
            bias: Array1::zeros(dim),
        }
    }

    pub fn from_state(sd: &StateDict, prefix: &str, dim: usize) -> RecallResult<Self> {
        Ok(Self {
            weight: sd.vector(&format!("{prefix}.weight"), dim)?,
            bias: sd.vector(&format!("{prefix}.bias"), dim)?,
        })
    }

    pub fn write_state(&self, sd: &mut StateDict, prefix: &str) {
        sd.insert_vector(format!("{prefix}.weight"), &self.weight);
        sd.insert_vector(format!("{prefix}.bias"), &self.bias);
    }

    pub fn forward(&self, mut x: Array2<f32>) -> Array2<f32> {
        layer_norm_rows(&mut x);
        x *= &self.weight;
        x += &self.bias;
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn layer_norm_zero_mean_unit_variance() {
        let mut x = array![[1.0f32, 2.0, 3.0, 4.0], [10.0, -10.0, 5.0, 0.0]];
        layer_norm_rows(&mut x);
        for row in x.rows() {
            let mean = row.sum() / 4.0;
            let var = row.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / 4.0;
            assert!(mean.abs() < 1e-5);
            assert!((var - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn softmax_masks_neg_infinity() {
        let mut x = array![[0.0f32, f32::NEG_INFINITY, 0.0]];
        softmax_rows(&mut x);
        assert!((x[[0, 0]] - 0.5).abs() < 1e-6);
        assert_eq!(x[[0, 1]], 0.0);
    }

    #[test]
    fn linear_applies_weight_and_bias() {
        let lin = Linear {
            weight: array![[1.0f32, 0.0], [0.0, 2.0], [1.0, 1.0]],
            bias: array![0.5f32, 0.0, -1.0],
        };
        let y = lin.forward(array![[3.0f32, 4.0]].view());
        assert_eq!(y, array![[3.5f32, 8.0, 6.0]]);
    }

    #[test]
    fn linear_state_round_trip() {
        let mut rng = StdRng::seed_from_u64(1);
        let lin = Linear::init(&mut rng, 3, 2);
        let mut sd = StateDict::new();
        lin.write_state(&mut sd, "proj");
        assert_eq!(Linear::from_state(&sd, "proj", 3, 2).unwrap(), lin);
    }

    #[test]
    fn positions_start_with_sin_zero_cos_one() {
        let p = sinusoidal_positions(3, 6);
        assert_eq!(p[[0, 0]], 0.0);
        assert_eq!(p[[0, 3]], 1.0);
        assert!((p[[1, 0]] - 1.0f32.sin()).abs() < 1e-6);
    }

    #[test]
    fn gelu_is_near_identity_for_large_inputs() {
        assert!((gelu(6.0) - 6.0).abs() < 1e-3);
        assert!(gelu(-6.0).abs() < 1e-3);
        assert_eq!(gelu(0.0), 0.0);
    }
}
