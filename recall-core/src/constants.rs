// File names of the pretrained retriever directory.

pub const ARGS_FILE: &str = "args.json";
pub const QUERY_ENCODER_FILE: &str = "query_encoder.json";
pub const RESPONSE_ENCODER_FILE: &str = "response_encoder.json";
pub const MIPS_INDEX_FILE: &str = "mips_index.bin";
pub const MAX_NORM_FILE: &str = "max_norm.json";
pub const CANDIDATES_FILE: &str = "candidates.txt";
pub const FEATURES_FILE: &str = "feat.bin";

// Vocabulary specials, always at the front of every vocab in this order.
pub const PAD: &str = "<pad>";
pub const UNK: &str = "<unk>";
pub const BOS: &str = "<bos>";
pub const EOS: &str = "<eos>";

/// Variance epsilon of the parameter-free layer norm applied to encoder outputs.
pub const LAYER_NORM_EPS: f32 = 1e-12;
