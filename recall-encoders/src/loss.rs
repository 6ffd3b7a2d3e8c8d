//! Label-smoothed cross-entropy and diagonal accuracy for in-batch matching.

use ndarray::{Array2, ArrayView2};

/// Row-wise `log_softmax`.
pub fn log_softmax_rows(scores: ArrayView2<'_, f32>) -> Array2<f32> {
    let mut out = scores.to_owned();
    for mut row in out.rows_mut() {
        let max = row.fold(f32::NEG_INFINITY, |a, &b| a.max(b));
        let log_sum = row.iter().map(|v| (v - max).exp()).sum::<f32>().ln() + max;
        row.mapv_inplace(|v| v - log_sum);
    }
    out
}

/// Summed label-smoothed negative log likelihood and the summed plain NLL.
///
/// Per row: `(1 - eps) * -lprobs[target] + eps / V * -sum(lprobs)`.
pub fn label_smoothed_nll_loss(lprobs: ArrayView2<'_, f32>, targets: &[usize], epsilon: f32) -> (f32, f32) {
    let vocab = lprobs.ncols().max(1) as f32;
    let eps_i = epsilon / vocab;
    let mut loss = 0.0;
    let mut nll = 0.0;
    for (row, &target) in lprobs.rows().into_iter().zip(targets) {
        let nll_row = -row[target];
        let smooth_row = -row.sum();
        loss += (1.0 - epsilon) * nll_row + eps_i * smooth_row;
        nll += nll_row;
    }
    (loss, nll)
}

/// Fraction of rows whose argmax (first maximum) is the diagonal entry.
pub fn diagonal_accuracy(scores: ArrayView2<'_, f32>) -> f32 {
    let rows = scores.nrows();
    if rows == 0 {
        return 0.0;
    }
    let hits = scores
        .rows()
        .into_iter()
        .enumerate()
        .filter(|(i, row)| argmax(row.iter().copied()) == Some(*i))
        .count();
    hits as f32 / rows as f32
}

fn argmax(values: impl Iterator<Item = f32>) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, v) in values.enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}
