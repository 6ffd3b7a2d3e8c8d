//! End-to-end: train-free matching model -> memory bank directory ->
//! `Retriever::from_pretrained` -> `work`.

mod common;

use recall_core::config::{IndexConfig, ModelArgs, RecallConfig};
use recall_core::constants::{
    ARGS_FILE, CANDIDATES_FILE, FEATURES_FILE, MAX_NORM_FILE, MIPS_INDEX_FILE, QUERY_ENCODER_FILE,
    RESPONSE_ENCODER_FILE,
};
use recall_core::device::Device;
use recall_core::memory::{FeatureTable, MemoryPool};
use recall_core::models::QueryBatch;
use recall_core::vocab::{lists_to_tensor_with_bos, Vocab, Vocabs};
use recall_core::RecallError;
use recall_encoders::MatchingModel;
use recall_retrieval::{mem_len_cap, MemoryBankBuilder, Retriever};

use common::tokens;

const POOL: [&str; 8] = [
    "the cat sat",
    "a dog ran far away",
    "birds fly south",
    "the fish swam",
    "a cat and a dog",
    "rain fell all day long",
    "sun came out",
    "the end",
];

fn args() -> ModelArgs {
    ModelArgs {
        layers: 1,
        embed_dim: 8,
        ff_embed_dim: 16,
        num_heads: 2,
        dropout: 0.1,
        output_dim: 4,
    }
}

fn vocabs() -> Vocabs {
    let words: Vec<&str> = POOL.iter().flat_map(|l| l.split_whitespace()).collect();
    Vocabs {
        src: Vocab::from_tokens(words.iter().copied()),
        tgt: Vocab::from_tokens(words.iter().copied()),
    }
}

fn build_dir(dir: &std::path::Path) {
    let vocabs = vocabs();
    let args = args();
    let model = MatchingModel::from_params(&vocabs, &args, 17).unwrap();
    let config = IndexConfig {
        kind: "ivf_flat".to_string(),
        nlist: 2,
        nprobe: 2,
        ..IndexConfig::default()
    };
    MemoryBankBuilder::new(&model, &args, &vocabs.tgt, config)
        .with_batch_size(3)
        .build_to_dir(MemoryPool::from_lines(POOL), dir)
        .unwrap();
}

fn query_batch(vocabs: &Vocabs) -> QueryBatch {
    let queries = vec![tokens(&["the", "cat"]), tokens(&["dog"])];
    let gold = vec![tokens(&["the", "cat", "sat"]), tokens(&["a", "dog", "ran", "far", "away"])];
    QueryBatch::new(lists_to_tensor_with_bos(&queries, &vocabs.src), gold).unwrap()
}

#[test]
fn builder_writes_every_file() {
    let dir = tempfile::tempdir().unwrap();
    build_dir(dir.path());
    for name in [
        ARGS_FILE,
        QUERY_ENCODER_FILE,
        RESPONSE_ENCODER_FILE,
        MIPS_INDEX_FILE,
        MAX_NORM_FILE,
        CANDIDATES_FILE,
        FEATURES_FILE,
    ] {
        assert!(dir.path().join(name).exists(), "missing {name}");
    }
}

#[test]
fn retrieval_from_built_directory() {
    let dir = tempfile::tempdir().unwrap();
    build_dir(dir.path());
    let vocabs = vocabs();
    let (retriever, response) =
        Retriever::from_pretrained(3, &vocabs, dir.path(), 2, 2, Device::Host, true).unwrap();
    assert!(response.is_some());
    assert_eq!(retriever.num_heads(), 3);

    let batch = query_batch(&vocabs);
    let out = retriever.work(&batch, false).unwrap();
    assert_eq!(out.mem.indices.dim(), (2, 3, 2));
    assert_eq!(out.mem.all_mem_scores.dim(), (2, 3, 2));
    assert_eq!(out.mem.all_mem_tokens.ncols(), 12);
    assert!(out.mem.all_mem_tokens.nrows() <= mem_len_cap(batch.seq_len(), 1.5));
    assert_eq!(out.src.dim(), (batch.seq_len(), 2, 8));

    for (b, sents) in out.mem.retrieval_raw_sents.iter().enumerate() {
        assert_eq!(sents.len(), 2 * 3);
        assert!(sents.iter().all(|s| s != &batch.tgt_raw_sents[b]));
    }
}

#[test]
fn single_head_checkpoint_gives_identical_heads() {
    let dir = tempfile::tempdir().unwrap();
    build_dir(dir.path());
    let vocabs = vocabs();
    let (retriever, _) = Retriever::from_pretrained(2, &vocabs, dir.path(), 2, 2, Device::Host, false).unwrap();
    let out = retriever.work(&query_batch(&vocabs), true).unwrap();
    for k in 0..2 {
        for b in 0..2 {
            assert_eq!(out.mem.indices[[k, 0, b]], out.mem.indices[[k, 1, b]]);
        }
    }
}

#[test]
fn repeated_work_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    build_dir(dir.path());
    let vocabs = vocabs();
    let (retriever, _) = Retriever::from_pretrained(2, &vocabs, dir.path(), 2, 3, Device::Host, false).unwrap();
    let batch = query_batch(&vocabs);
    let a = retriever.work(&batch, false).unwrap();
    let b = retriever.work(&batch, false).unwrap();
    assert_eq!(a.mem.indices, b.mem.indices);
    assert_eq!(a.mem.all_mem_tokens, b.mem.all_mem_tokens);
    assert_eq!(a.mem.all_mem_scores, b.mem.all_mem_scores);
}

#[test]
fn accelerator_placement_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    build_dir(dir.path());
    let vocabs = vocabs();
    let (retriever, _) =
        Retriever::from_pretrained(1, &vocabs, dir.path(), 2, 1, Device::Accelerator(0), false).unwrap();
    assert_eq!(retriever.index().device(), Device::Accelerator(0));
    let out = retriever.work(&query_batch(&vocabs), false).unwrap();
    assert_eq!(out.mem.indices.dim(), (1, 1, 2));
}

#[test]
fn from_config_applies_retrieval_section() {
    let dir = tempfile::tempdir().unwrap();
    build_dir(dir.path());
    let config = RecallConfig::from_toml(
        r#"
        [retrieval]
        num_heads = 2
        topk = 1
        mem_len_ratio = 0.5
        device = "host"

        [index]
        nprobe = 2
        "#,
    )
    .unwrap();
    let vocabs = vocabs();
    let (retriever, response) = Retriever::from_config(&config, &vocabs, dir.path(), false).unwrap();
    assert!(response.is_none());
    let batch = query_batch(&vocabs);
    let out = retriever.work(&batch, false).unwrap();
    assert!(out.mem.all_mem_tokens.nrows() <= mem_len_cap(batch.seq_len(), 0.5));
}

#[test]
fn from_config_allow_hit_controls_retrieve() {
    let dir = tempfile::tempdir().unwrap();
    build_dir(dir.path());
    let vocabs = vocabs();
    let batch = query_batch(&vocabs);
    let whole_pool = |allow_hit: bool| {
        RecallConfig::from_toml(&format!(
            "[retrieval]\ntopk = {}\nallow_hit = {allow_hit}\n\n[index]\nnprobe = 2\n",
            POOL.len()
        ))
        .unwrap()
    };

    let (permissive, _) = Retriever::from_config(&whole_pool(true), &vocabs, dir.path(), false).unwrap();
    assert!(permissive.allow_hit());
    let out = permissive.retrieve(&batch).unwrap();
    for (b, sents) in out.mem.retrieval_raw_sents.iter().enumerate() {
        assert!(sents.contains(&batch.tgt_raw_sents[b]));
    }

    let (strict, _) = Retriever::from_config(&whole_pool(false), &vocabs, dir.path(), false).unwrap();
    assert!(!strict.allow_hit());
    let err = strict.retrieve(&batch).unwrap_err();
    assert!(matches!(err, RecallError::RetrievalError(_)), "got {err:?}");
}

#[test]
fn builder_from_config_matches_explicit_builder() {
    let config = RecallConfig::from_toml(
        r#"
        [retrieval]
        build_batch_size = 2

        [index]
        kind = "ivf_flat"
        nlist = 2
        nprobe = 2

        [encoder]
        layers = 1
        embed_dim = 8
        ff_embed_dim = 16
        num_heads = 2
        output_dim = 4
        "#,
    )
    .unwrap();
    let vocabs = vocabs();
    let model = MatchingModel::from_config(&vocabs, &config, 17).unwrap();

    let configured = tempfile::tempdir().unwrap();
    MemoryBankBuilder::from_config(&model, &vocabs.tgt, &config)
        .build_to_dir(MemoryPool::from_lines(POOL), configured.path())
        .unwrap();
    assert_eq!(
        ModelArgs::load(configured.path().join(ARGS_FILE)).unwrap().output_dim,
        config.encoder.output_dim
    );

    let explicit = tempfile::tempdir().unwrap();
    build_dir(explicit.path());
    let a = FeatureTable::load(configured.path().join(FEATURES_FILE)).unwrap();
    let b = FeatureTable::load(explicit.path().join(FEATURES_FILE)).unwrap();
    assert_eq!(a.view().dim(), b.view().dim());
    for (x, y) in a.view().iter().zip(b.view().iter()) {
        assert!((x - y).abs() < 1e-5);
    }
}

#[test]
fn missing_directory_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let err = Retriever::from_pretrained(1, &vocabs(), dir.path().join("nope"), 1, 1, Device::Host, false);
    assert!(err.is_err());
}

#[test]
fn corrupt_index_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    build_dir(dir.path());
    let path = dir.path().join(MIPS_INDEX_FILE);
    let mut bytes = std::fs::read(&path).unwrap();
    let mid = bytes.len() / 2;
    bytes[mid] ^= 0xff;
    std::fs::write(&path, bytes).unwrap();
    let err = Retriever::from_pretrained(1, &vocabs(), dir.path(), 1, 1, Device::Host, false).unwrap_err();
    assert!(matches!(err, RecallError::IndexError(_)));
}

#[test]
fn truncated_candidate_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    build_dir(dir.path());
    std::fs::write(dir.path().join(CANDIDATES_FILE), "the cat sat\n").unwrap();
    let err = Retriever::from_pretrained(1, &vocabs(), dir.path(), 1, 1, Device::Host, false).unwrap_err();
    assert!(matches!(err, RecallError::MemoryError(_)));
}
