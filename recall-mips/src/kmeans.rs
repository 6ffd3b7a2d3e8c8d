//! Lloyd's k-means for the IVF coarse quantizer.

use ndarray::{Array2, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::debug;

/// Squared Euclidean distance.
pub fn l2_sq(a: ArrayView1<'_, f32>, b: ArrayView1<'_, f32>) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Index of the centroid closest to `v`. Ties go to the lower index.
pub fn nearest_centroid(centroids: ArrayView2<'_, f32>, v: ArrayView1<'_, f32>) -> usize {
    let mut best = 0;
    let mut best_dist = f32::INFINITY;
    for (c, centroid) in centroids.rows().into_iter().enumerate() {
        let d = l2_sq(centroid, v);
        if d < best_dist {
            best = c;
            best_dist = d;
        }
    }
    best
}

/// The `n` centroids closest to `v`, nearest first.
pub fn nearest_centroids(centroids: ArrayView2<'_, f32>, v: ArrayView1<'_, f32>, n: usize) -> Vec<usize> {
    let mut scored: Vec<(f32, usize)> = centroids
        .rows()
        .into_iter()
        .enumerate()
        .map(|(c, centroid)| (l2_sq(centroid, v), c))
        .collect();
    scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    scored.into_iter().take(n).map(|(_, c)| c).collect()
}

/// Train `k` centroids on the rows of `data`.
///
/// Initial centroids are `k` distinct rows drawn with a seeded RNG; a cluster
/// that empties during training is re-seeded from a random row. Requires
/// `1 <= k <= data.nrows()`.
pub fn train(data: ArrayView2<'_, f32>, k: usize, iterations: usize, seed: u64) -> Array2<f32> {
    let (n, dim) = data.dim();
    let mut rng = StdRng::seed_from_u64(seed);

    let mut centroids = Array2::<f32>::zeros((k, dim));
    for (c, row) in rand::seq::index::sample(&mut rng, n, k).into_iter().enumerate() {
        centroids.row_mut(c).assign(&data.row(row));
    }

    for iteration in 0..iterations {
        let assignments: Vec<usize> = (0..n)
            .into_par_iter()
            .map(|i| nearest_centroid(centroids.view(), data.row(i)))
            .collect();

        let mut sums = Array2::<f32>::zeros((k, dim));
        let mut counts = vec![0usize; k];
        for (i, &c) in assignments.iter().enumerate() {
            let mut sum = sums.row_mut(c);
            sum += &data.row(i);
            counts[c] += 1;
        }

        let mut moved = 0.0f32;
        for c in 0..k {
            let next = if counts[c] == 0 {
                data.row(rng.gen_range(0..n)).to_owned()
            } else {
                sums.row(c).mapv(|v| v / counts[c] as f32)
            };
            moved += l2_sq(centroids.row(c), next.view());
            centroids.row_mut(c).assign(&next);
        }

        debug!(iteration, moved, "k-means iteration");
        if moved == 0.0 {
            break;
        }
    }

    centroids
}
