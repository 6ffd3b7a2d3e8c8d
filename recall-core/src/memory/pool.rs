//! The candidate corpus available for retrieval.

use std::io::Write;
use std::path::Path;

use crate::errors::{MemoryError, RecallResult};

/// Ordered, read-only candidate token sequences. Line number in the
/// candidate file is the candidate id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryPool {
    candidates: Vec<Vec<String>>,
}

impl MemoryPool {
    pub fn new(candidates: Vec<Vec<String>>) -> Self {
        Self { candidates }
    }

    /// Build from whitespace-tokenized lines.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(
            lines
                .into_iter()
                .map(|line| line.as_ref().split_whitespace().map(str::to_string).collect())
                .collect(),
        )
    }

    /// Load a newline-delimited candidate file.
    pub fn load(path: impl AsRef<Path>) -> RecallResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| MemoryError::LoadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::from_lines(content.lines()))
    }

    /// Write one space-joined candidate per line.
    pub fn save(&self, path: impl AsRef<Path>) -> RecallResult<()> {
        let mut file = std::io::BufWriter::new(std::fs::File::create(path.as_ref())?);
        for candidate in &self.candidates {
            writeln!(file, "{}", candidate.join(" "))?;
        }
        file.flush()?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Token sequence of candidate `id`. Out-of-range ids are a hard error.
    pub fn get(&self, id: usize) -> RecallResult<&[String]> {
        self.candidates
            .get(id)
            .map(Vec::as_slice)
            .ok_or_else(|| {
                MemoryError::CandidateOutOfBounds {
                    id,
                    pool_size: self.candidates.len(),
                }
                .into()
            })
    }

    /// Space-joined text of candidate `id`.
    pub fn raw_text(&self, id: usize) -> RecallResult<String> {
        Ok(self.get(id)?.join(" "))
    }

    pub fn iter(&self) -> impl Iterator<Item = &[String]> {
        self.candidates.iter().map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RecallError;

    #[test]
    fn from_lines_tokenizes_on_whitespace() {
        let pool = MemoryPool::from_lines(["a  b", "c\td", ""]);
        assert_eq!(pool.len(), 3);
        assert_eq!(pool.get(0).unwrap(), ["a", "b"]);
        assert_eq!(pool.get(1).unwrap(), ["c", "d"]);
        assert!(pool.get(2).unwrap().is_empty());
    }

    #[test]
    fn out_of_bounds_is_an_error() {
        let pool = MemoryPool::from_lines(["a"]);
        let err = pool.get(5).unwrap_err();
        assert!(matches!(
            err,
            RecallError::MemoryError(MemoryError::CandidateOutOfBounds { id: 5, pool_size: 1 })
        ));
    }

    #[test]
    fn save_then_load_preserves_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("candidates.txt");
        let pool = MemoryPool::from_lines(["x y", "z"]);
        pool.save(&path).unwrap();
        let loaded = MemoryPool::load(&path).unwrap();
        assert_eq!(loaded, pool);
        assert_eq!(loaded.raw_text(0).unwrap(), "x y");
    }

    #[test]
    fn missing_file_fails_to_load() {
        let err = MemoryPool::load("/definitely/not/here.txt").unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.txt"));
    }
}
