//! Property tests for retrieval invariants over exact (flat) indexes.

#[path = "../common/mod.rs"]
mod common;

use ndarray::Array3;
use proptest::prelude::*;

use recall_core::device::Device;
use recall_core::models::QueryBatch;
use recall_core::vocab::lists_to_tensor_with_bos;
use recall_retrieval::{mem_len_cap, select_candidates, Retriever};

use common::{bank_and_index, vocab_for, FixedEncoder};

#[derive(Debug, Clone)]
struct Case {
    lines: Vec<String>,
    features: Vec<Vec<f32>>,
    queries: Vec<Vec<Vec<f32>>>,
    query_lens: Vec<usize>,
    gold_ids: Vec<usize>,
    topk: usize,
}

fn case() -> impl Strategy<Value = Case> {
    (4usize..16, 2usize..5, 1usize..3, 1usize..4).prop_flat_map(|(n, dim, heads, bsz)| {
        (
            prop::collection::vec(prop::collection::vec(-1.0f32..1.0, dim), n),
            prop::collection::vec(
                prop::collection::vec(prop::collection::vec(-1.0f32..1.0, dim), bsz),
                heads,
            ),
            prop::collection::vec(1usize..6, bsz),
            prop::collection::vec(0..n, bsz),
            1..n.min(4),
        )
            .prop_map(move |(features, queries, query_lens, gold_ids, topk)| Case {
                // Line i only uses token "w{i}", so no two lines are equal.
                lines: (0..n)
                    .map(|i| vec![format!("w{i}"); (i % 5) + 1].join(" "))
                    .collect(),
                features,
                queries,
                query_lens,
                gold_ids,
                topk,
            })
    })
}

fn run(case: &Case, allow_hit: bool) -> recall_core::models::RetrieverOutput {
    let (bank, index) = bank_and_index(&case.lines, &case.features);
    let vocab = vocab_for(&case.lines);
    let encoder = FixedEncoder::from_nested(&case.queries);
    let retriever = Retriever::new(encoder, index, bank, vocab.clone(), case.topk).unwrap();
    let src: Vec<Vec<String>> = case.query_lens.iter().map(|&l| vec!["w0".to_string(); l]).collect();
    let gold: Vec<Vec<String>> = case
        .gold_ids
        .iter()
        .map(|&g| case.lines[g].split_whitespace().map(str::to_string).collect())
        .collect();
    let batch = QueryBatch::new(lists_to_tensor_with_bos(&src, &vocab), gold).unwrap();
    retriever.work(&batch, allow_hit).unwrap()
}

proptest! {
    #[test]
    fn exactly_topk_without_gold(case in case()) {
        let out = run(&case, false);
        let (topk, heads, bsz) = out.mem.indices.dim();
        prop_assert_eq!(topk, case.topk);
        prop_assert_eq!(heads, case.queries.len());
        for b in 0..bsz {
            for h in 0..heads {
                for k in 0..topk {
                    prop_assert_ne!(out.mem.indices[[k, h, b]], case.gold_ids[b]);
                }
            }
        }
    }

    #[test]
    fn memory_never_exceeds_cap(case in case()) {
        let out = run(&case, true);
        let seq_len = case.query_lens.iter().max().copied().unwrap_or(0) + 1;
        prop_assert!(out.mem.all_mem_tokens.nrows() <= mem_len_cap(seq_len, 1.5));
    }

    #[test]
    fn selected_candidates_are_best_by_inner_product(case in case()) {
        let out = run(&case, true);
        let (topk, heads, bsz) = out.mem.indices.dim();
        for b in 0..bsz {
            for h in 0..heads {
                let q = &case.queries[h][b];
                let ip = |id: usize| -> f32 { q.iter().zip(&case.features[id]).map(|(a, c)| a * c).sum() };
                let worst_kept = (0..topk).map(|k| ip(out.mem.indices[[k, h, b]])).fold(f32::INFINITY, f32::min);
                let kept: Vec<usize> = (0..topk).map(|k| out.mem.indices[[k, h, b]]).collect();
                for id in (0..case.lines.len()).filter(|id| !kept.contains(id)) {
                    prop_assert!(ip(id) <= worst_kept + 1e-4);
                }
            }
        }
    }

    #[test]
    fn retrieval_is_deterministic(case in case()) {
        let a = run(&case, false);
        let b = run(&case, false);
        prop_assert_eq!(a.mem.indices, b.mem.indices);
        prop_assert_eq!(a.mem.all_mem_scores, b.mem.all_mem_scores);
    }

    #[test]
    fn selection_preserves_order_and_skips_excluded(
        ranked in prop::collection::vec(0usize..20, 0..12),
        banned in 0usize..20,
        topk in 1usize..6,
    ) {
        let kept = select_candidates(&ranked, |&id| id == banned, topk);
        let expected: Vec<usize> = ranked.iter().copied().filter(|&id| id != banned).take(topk).collect();
        prop_assert_eq!(kept, expected);
    }
}

#[test]
fn accelerator_tagged_vectors_are_searched_on_host() {
    let lines = ["a", "b b", "c c c"];
    let features = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.7, 0.7]];
    let (bank, index) = bank_and_index(&lines, &features);
    let vocab = vocab_for(&lines);
    let encoder = FixedEncoder {
        vectors: Array3::from_shape_vec((1, 1, 2), vec![1.0, 0.1]).unwrap(),
        device: Device::Accelerator(1),
    };
    let retriever = Retriever::new(encoder, index, bank, vocab.clone(), 1).unwrap();
    let batch = QueryBatch::new(
        lists_to_tensor_with_bos(&[vec!["a"]], &vocab),
        vec![vec!["a".to_string()]],
    )
    .unwrap();
    let out = retriever.work(&batch, false).unwrap();
    assert_eq!(out.mem.indices[[0, 0, 0]], 2);
}
