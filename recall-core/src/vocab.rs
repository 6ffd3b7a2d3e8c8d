//! Token vocabularies and conversion of token lists into padded id tensors.
//!
//! Token tensors are sequence-first: shape `(seq_len, batch)`.

use std::collections::HashMap;
use std::path::Path;

use ndarray::Array2;

use crate::constants::{BOS, EOS, PAD, UNK};
use crate::errors::{MemoryError, RecallResult};

/// Bidirectional token/id mapping. Specials occupy ids 0..4.
#[derive(Debug, Clone)]
pub struct Vocab {
    idx_to_token: Vec<String>,
    token_to_idx: HashMap<String, usize>,
}

impl Vocab {
    /// Build from an iterator of tokens. Specials are inserted first,
    /// duplicates are ignored.
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut vocab = Self {
            idx_to_token: Vec::new(),
            token_to_idx: HashMap::new(),
        };
        for special in [PAD, UNK, BOS, EOS] {
            vocab.insert(special.to_string());
        }
        for token in tokens {
            vocab.insert(token.into());
        }
        vocab
    }

    /// Load a vocabulary file: one entry per line, first whitespace field is the token.
    pub fn from_file(path: impl AsRef<Path>) -> RecallResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| MemoryError::LoadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::from_tokens(
            content
                .lines()
                .filter_map(|line| line.split_whitespace().next())
                .map(str::to_string),
        ))
    }

    fn insert(&mut self, token: String) {
        if self.token_to_idx.contains_key(&token) {
            return;
        }
        self.token_to_idx.insert(token.clone(), self.idx_to_token.len());
        self.idx_to_token.push(token);
    }

    pub fn len(&self) -> usize {
        self.idx_to_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.idx_to_token.is_empty()
    }

    pub fn padding_idx(&self) -> usize {
        0
    }

    pub fn unk_idx(&self) -> usize {
        1
    }

    pub fn bos_idx(&self) -> usize {
        2
    }

    pub fn eos_idx(&self) -> usize {
        3
    }

    /// Unknown tokens map to the `<unk>` id.
    pub fn token_to_idx(&self, token: &str) -> usize {
        self.token_to_idx
            .get(token)
            .copied()
            .unwrap_or_else(|| self.unk_idx())
    }

    /// Out-of-range ids map to `<unk>`.
    pub fn idx_to_token(&self, idx: usize) -> &str {
        self.idx_to_token
            .get(idx)
            .map(String::as_str)
            .unwrap_or(UNK)
    }

    pub fn encode<S: AsRef<str>>(&self, tokens: &[S]) -> Vec<usize> {
        tokens.iter().map(|t| self.token_to_idx(t.as_ref())).collect()
    }
}

/// Source (query side) and target (response/memory side) vocabularies.
#[derive(Debug, Clone)]
pub struct Vocabs {
    pub src: Vocab,
    pub tgt: Vocab,
}

/// Convert token lists into a `(max_len, batch)` id tensor, right-padded.
pub fn lists_to_tensor<S: AsRef<str>>(lists: &[Vec<S>], vocab: &Vocab) -> Array2<usize> {
    let max_len = lists.iter().map(Vec::len).max().unwrap_or(0);
    let mut data = Array2::from_elem((max_len, lists.len()), vocab.padding_idx());
    for (col, tokens) in lists.iter().enumerate() {
        for (row, token) in tokens.iter().enumerate() {
            data[[row, col]] = vocab.token_to_idx(token.as_ref());
        }
    }
    data
}

/// Like [`lists_to_tensor`] with `<bos>` prepended to every list. Encoders
/// read the sentence representation from position 0.
pub fn lists_to_tensor_with_bos<S: AsRef<str>>(lists: &[Vec<S>], vocab: &Vocab) -> Array2<usize> {
    let prefixed: Vec<Vec<&str>> = lists
        .iter()
        .map(|tokens| {
            std::iter::once(BOS)
                .chain(tokens.iter().map(|t| t.as_ref()))
                .collect()
        })
        .collect();
    lists_to_tensor(&prefixed, vocab)
}
