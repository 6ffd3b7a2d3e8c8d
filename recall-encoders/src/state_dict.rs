//! Named parameter tensors, persisted as JSON.

use std::collections::BTreeMap;
use std::path::Path;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use recall_core::errors::{EncoderError, RecallResult};

/// A dense tensor: row-major data plus its shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorData {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl TensorData {
    pub fn from_matrix(m: &Array2<f32>) -> Self {
        Self {
            shape: vec![m.nrows(), m.ncols()],
            data: m.iter().copied().collect(),
        }
    }

    pub fn from_vector(v: &Array1<f32>) -> Self {
        Self {
            shape: vec![v.len()],
            data: v.to_vec(),
        }
    }
}

/// Parameter name → tensor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateDict {
    tensors: BTreeMap<String, TensorData>,
}

impl StateDict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: impl AsRef<Path>) -> RecallResult<Self> {
        let path = path.as_ref();
        let fail = |reason: String| EncoderError::CheckpointLoadFailed {
            path: path.display().to_string(),
            reason,
        };
        let content = std::fs::read_to_string(path).map_err(|e| fail(e.to_string()))?;
        Ok(serde_json::from_str(&content).map_err(|e| fail(e.to_string()))?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> RecallResult<()> {
        std::fs::write(path.as_ref(), serde_json::to_string(self)?)?;
        Ok(())
    }

    pub fn insert(&mut self, name: impl Into<String>, tensor: TensorData) {
        self.tensors.insert(name.into(), tensor);
    }

    pub fn insert_matrix(&mut self, name: impl Into<String>, m: &Array2<f32>) {
        self.insert(name, TensorData::from_matrix(m));
    }

    pub fn insert_vector(&mut self, name: impl Into<String>, v: &Array1<f32>) {
        self.insert(name, TensorData::from_vector(v));
    }

    pub fn get(&self, name: &str) -> RecallResult<&TensorData> {
        self.tensors.get(name).ok_or_else(|| {
            EncoderError::MissingParameter {
                name: name.to_string(),
            }
            .into()
        })
    }

    fn checked(&self, name: &str, expected: &[usize]) -> RecallResult<&TensorData> {
        let tensor = self.get(name)?;
        let numel: usize = tensor.shape.iter().product();
        if tensor.shape != expected || tensor.data.len() != numel {
            return Err(EncoderError::ShapeMismatch {
                name: name.to_string(),
                expected: expected.to_vec(),
                actual: tensor.shape.clone(),
            }
            .into());
        }
        Ok(tensor)
    }

    /// Fetch a `(rows, cols)` matrix, checking its shape.
    pub fn matrix(&self, name: &str, rows: usize, cols: usize) -> RecallResult<Array2<f32>> {
        let tensor = self.checked(name, &[rows, cols])?;
        Ok(Array2::from_shape_fn((rows, cols), |(i, j)| {
            tensor.data[i * cols + j]
        }))
    }

    /// Fetch a length-`len` vector, checking its shape.
    pub fn vector(&self, name: &str, len: usize) -> RecallResult<Array1<f32>> {
        let tensor = self.checked(name, &[len])?;
        Ok(Array1::from(tensor.data.clone()))
    }

    /// Entries under `prefix.`, with the prefix stripped.
    pub fn sub_dict(&self, prefix: &str) -> StateDict {
        let dotted = format!("{prefix}.");
        StateDict {
            tensors: self
                .tensors
                .iter()
                .filter_map(|(k, v)| {
                    k.strip_prefix(&dotted)
                        .map(|rest| (rest.to_string(), v.clone()))
                })
                .collect(),
        }
    }

    /// Merge `other` in under `prefix.`.
    pub fn extend_prefixed(&mut self, prefix: &str, other: StateDict) {
        for (k, v) in other.tensors {
            self.tensors.insert(format!("{prefix}.{k}"), v);
        }
    }

    /// Tile a tensor `times` times along its first axis (`[W; W; ...]`).
    ///
    /// Used to turn one projection into `times` identical heads without
    /// sharing storage between them.
    pub fn replicate(&self, name: &str, times: usize) -> RecallResult<TensorData> {
        let tensor = self.get(name)?;
        let mut shape = tensor.shape.clone();
        if let Some(first) = shape.first_mut() {
            *first *= times;
        }
        let mut data = Vec::with_capacity(tensor.data.len() * times);
        for _ in 0..times {
            data.extend_from_slice(&tensor.data);
        }
        Ok(TensorData { shape, data })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }
}
