use recall_core::errors::*;

#[test]
fn index_load_failed_carries_path() {
    let err = IndexError::LoadFailed {
        path: "/models/mips_index.bin".into(),
        reason: "file not found".into(),
    };
    assert!(err.to_string().contains("/models/mips_index.bin"));
}

#[test]
fn length_mismatch_carries_both_sizes() {
    let err = MemoryError::LengthMismatch {
        pool: 100,
        features: 99,
    };
    let msg = err.to_string();
    assert!(msg.contains("100"));
    assert!(msg.contains("99"));
}

#[test]
fn exclusion_underfill_carries_position() {
    let err = RetrievalError::ExclusionUnderfill {
        head: 2,
        query: 7,
        topk: 5,
        survivors: 4,
    };
    let msg = err.to_string();
    assert!(msg.contains("head 2"));
    assert!(msg.contains("query 7"));
    assert!(msg.contains("4 of 5"));
}

#[test]
fn shape_mismatch_carries_parameter_name() {
    let err = EncoderError::ShapeMismatch {
        name: "proj.weight".into(),
        expected: vec![128, 512],
        actual: vec![64, 512],
    };
    let msg = err.to_string();
    assert!(msg.contains("proj.weight"));
    assert!(msg.contains("[128, 512]"));
}

// --- From impls ---

#[test]
fn index_error_converts_to_recall_error() {
    let err: RecallError = IndexError::EmptyIndex.into();
    assert!(matches!(err, RecallError::IndexError(IndexError::EmptyIndex)));
}

#[test]
fn encoder_error_converts_to_recall_error() {
    let err: RecallError = EncoderError::EmptyBatch.into();
    assert!(matches!(err, RecallError::EncoderError(_)));
}

#[test]
fn memory_error_converts_to_recall_error() {
    let err: RecallError = MemoryError::CandidateOutOfBounds {
        id: 10,
        pool_size: 4,
    }
    .into();
    assert!(matches!(err, RecallError::MemoryError(_)));
}

#[test]
fn serialization_error_converts_to_recall_error() {
    let json_err = serde_json::from_str::<f32>("not a number").unwrap_err();
    let err: RecallError = json_err.into();
    assert!(matches!(err, RecallError::SerializationError(_)));
}

#[test]
fn io_error_converts_to_recall_error() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    let err: RecallError = io_err.into();
    assert!(matches!(err, RecallError::Io(_)));
}
