//! Feature table: one vector per candidate id, index-aligned with the pool.
//!
//! Binary format: header (count: u32 LE, dims: u32 LE) + body (count * dims * f32 LE).

use std::io::Write;
use std::path::Path;

use ndarray::{Array2, ArrayView1, ArrayView2};

use crate::errors::{MemoryError, RecallResult};

const HEADER_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    data: Array2<f32>,
}

impl FeatureTable {
    pub fn new(data: Array2<f32>) -> Self {
        Self { data }
    }

    /// Build from row vectors. All rows must share one dimension.
    pub fn from_rows(rows: &[Vec<f32>]) -> RecallResult<Self> {
        let dims = rows.first().map(Vec::len).unwrap_or(0);
        if let Some(row) = rows.iter().find(|r| r.len() != dims) {
            return Err(MemoryError::FeatureDimMismatch {
                expected: dims,
                actual: row.len(),
            }
            .into());
        }
        let data = Array2::from_shape_fn((rows.len(), dims), |(i, j)| rows[i][j]);
        Ok(Self { data })
    }

    pub fn load(path: impl AsRef<Path>) -> RecallResult<Self> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let bytes = std::fs::read(path).map_err(|e| MemoryError::LoadFailed {
            path: display.clone(),
            reason: e.to_string(),
        })?;
        Self::from_bytes(&bytes).map_err(|reason| {
            MemoryError::LoadFailed {
                path: display,
                reason,
            }
            .into()
        })
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, String> {
        if bytes.len() < HEADER_LEN {
            return Err("file too small for header".to_string());
        }
        let count = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        let dims = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;

        let expected = count
            .checked_mul(dims)
            .and_then(|n| n.checked_mul(4))
            .and_then(|n| n.checked_add(HEADER_LEN))
            .ok_or_else(|| format!("size overflow: {count} rows of {dims} dims"))?;
        if bytes.len() != expected {
            return Err(format!(
                "size mismatch: expected {expected} bytes, got {}",
                bytes.len()
            ));
        }

        let values: Vec<f32> = bytes[HEADER_LEN..]
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        let data = Array2::from_shape_vec((count, dims), values).map_err(|e| e.to_string())?;
        Ok(Self { data })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> RecallResult<()> {
        let (count, dims) = self.data.dim();
        let mut file = std::io::BufWriter::new(std::fs::File::create(path.as_ref())?);
        file.write_all(&(count as u32).to_le_bytes())?;
        file.write_all(&(dims as u32).to_le_bytes())?;
        for v in self.data.iter() {
            file.write_all(&v.to_le_bytes())?;
        }
        file.flush()?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.data.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.data.nrows() == 0
    }

    pub fn dims(&self) -> usize {
        self.data.ncols()
    }

    pub fn row(&self, id: usize) -> RecallResult<ArrayView1<'_, f32>> {
        if id >= self.data.nrows() {
            return Err(MemoryError::CandidateOutOfBounds {
                id,
                pool_size: self.data.nrows(),
            }
            .into());
        }
        Ok(self.data.row(id))
    }

    pub fn view(&self) -> ArrayView2<'_, f32> {
        self.data.view()
    }

    /// Largest L2 norm over all rows; `0.0` for an empty table.
    pub fn max_norm(&self) -> f32 {
        self.data
            .rows()
            .into_iter()
            .map(|r| r.dot(&r).sqrt())
            .fold(0.0f32, f32::max)
    }
}
