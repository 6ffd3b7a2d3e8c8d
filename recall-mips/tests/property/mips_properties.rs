use ndarray::Array2;
use proptest::prelude::*;
use recall_core::config::IndexConfig;
use recall_core::traits::IVectorIndex;
use recall_mips::{augment_query, l2_to_ip, MipsIndex};

fn arb_matrix(rows: std::ops::Range<usize>, dim: usize) -> impl Strategy<Value = Array2<f32>> {
    rows.prop_flat_map(move |n| {
        prop::collection::vec(-1.0f32..1.0, n * dim)
            .prop_map(move |v| Array2::from_shape_vec((n, dim), v).unwrap())
    })
}

fn flat() -> IndexConfig {
    IndexConfig {
        kind: "flat".to_string(),
        ..Default::default()
    }
}

// ── l2_to_ip inverts the augmented distance on an exact index ────────────

proptest! {
    #[test]
    fn l2_to_ip_recovers_exact_inner_products(
        feats in arb_matrix(2..24, 4),
        query in prop::collection::vec(-1.0f32..1.0, 4),
    ) {
        let (index, max_norm) = MipsIndex::build(feats.view(), &flat()).unwrap();
        let q = Array2::from_shape_vec((1, 4), query).unwrap();
        let qa = augment_query(q.view());

        let hits = index.search(qa.view(), feats.nrows()).unwrap();
        let ips = l2_to_ip(&hits.distances, qa.view(), max_norm);

        prop_assert_eq!(hits.ids[0].len(), feats.nrows());
        for (id, ip) in hits.ids[0].iter().zip(&ips[0]) {
            let exact = q.row(0).dot(&feats.row(*id));
            prop_assert!((ip - exact).abs() < 1e-3, "id {}: {} vs {}", id, ip, exact);
        }
    }
}

// ── Nearest neighbour in augmented L2 is the inner-product maximum ──────

proptest! {
    #[test]
    fn top_hit_maximizes_inner_product(
        feats in arb_matrix(2..32, 3),
        query in prop::collection::vec(-1.0f32..1.0, 3),
    ) {
        let (index, _) = MipsIndex::build(feats.view(), &flat()).unwrap();
        let q = Array2::from_shape_vec((1, 3), query).unwrap();
        let hits = index.search(augment_query(q.view()).view(), 1).unwrap();

        let best = feats
            .rows()
            .into_iter()
            .map(|r| q.row(0).dot(&r))
            .fold(f32::NEG_INFINITY, f32::max);
        let got = q.row(0).dot(&feats.row(hits.ids[0][0]));
        prop_assert!(best - got < 1e-4, "best {} got {}", best, got);
    }
}

// ── Search is deterministic ─────────────────────────────────────────────

proptest! {
    #[test]
    fn repeated_search_is_identical(
        feats in arb_matrix(8..40, 5),
        nprobe in 1usize..4,
    ) {
        let config = IndexConfig {
            kind: "ivf_flat".to_string(),
            nlist: 4,
            nprobe,
            ..Default::default()
        };
        let (index, _) = MipsIndex::build(feats.view(), &config).unwrap();
        let queries = augment_query(feats.view());
        let a = index.search(queries.view(), 3).unwrap();
        let b = index.search(queries.view(), 3).unwrap();
        prop_assert_eq!(a, b);
    }
}
