//! Property tests for the matching loss.

use ndarray::Array2;
use proptest::prelude::*;

use recall_encoders::contrastive_loss;
use recall_encoders::loss::{diagonal_accuracy, label_smoothed_nll_loss, log_softmax_rows};

fn square_scores() -> impl Strategy<Value = Array2<f32>> {
    (1usize..6).prop_flat_map(|n| {
        prop::collection::vec(-5.0f32..5.0, n * n)
            .prop_map(move |v| Array2::from_shape_vec((n, n), v).unwrap())
    })
}

proptest! {
    #[test]
    fn loss_is_non_negative(scores in square_scores(), eps in 0.0f32..0.5) {
        let out = contrastive_loss(scores.view(), eps);
        prop_assert!(out.loss >= -1e-5);
        prop_assert!((0.0..=1.0).contains(&out.acc));
    }

    #[test]
    fn boosting_the_diagonal_gives_full_accuracy(mut scores in square_scores()) {
        let n = scores.nrows();
        for i in 0..n {
            scores[[i, i]] = 100.0;
        }
        prop_assert_eq!(diagonal_accuracy(scores.view()), 1.0);
    }

    #[test]
    fn unsmoothed_loss_equals_nll(scores in square_scores()) {
        let n = scores.nrows();
        let gold: Vec<usize> = (0..n).collect();
        let lprobs = log_softmax_rows(scores.view());
        let (loss, nll) = label_smoothed_nll_loss(lprobs.view(), &gold, 0.0);
        prop_assert!((loss - nll).abs() < 1e-4);
    }
}
