//! Index blob format.
//!
//! ```text
//! magic      b"RMIP"
//! version    u32 LE
//! kind       u8        0 = flat, 1 = ivf_flat
//! dim        u32 LE    augmented dimension
//! count      u64 LE
//! nlist      u32 LE
//! centroids  nlist * dim * f32 LE   (nlist = 0 for flat)
//! lists      per list: len u64 LE, len * u64 LE ids, len * dim * f32 LE vectors
//! digest     32 bytes, blake3 of everything above
//! ```

use std::path::Path;

use ndarray::Array2;

use recall_core::errors::{IndexError, RecallResult};

use crate::index::{IndexKind, InvertedList, MipsIndex};

const MAGIC: &[u8; 4] = b"RMIP";
const VERSION: u32 = 1;
const DIGEST_LEN: usize = 32;

pub(crate) fn write(index: &MipsIndex, path: &Path) -> RecallResult<()> {
    let mut buf = Vec::new();
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&VERSION.to_le_bytes());
    buf.push(index.kind.tag());
    buf.extend_from_slice(&(index.dim as u32).to_le_bytes());
    buf.extend_from_slice(&(index.count as u64).to_le_bytes());

    let stored_centroids = match index.kind {
        IndexKind::Flat => 0,
        IndexKind::IvfFlat => index.centroids.nrows(),
    };
    buf.extend_from_slice(&(stored_centroids as u32).to_le_bytes());
    if stored_centroids > 0 {
        for v in index.centroids.iter() {
            buf.extend_from_slice(&v.to_le_bytes());
        }
    }

    for list in &index.lists {
        buf.extend_from_slice(&(list.ids.len() as u64).to_le_bytes());
        for &id in &list.ids {
            buf.extend_from_slice(&(id as u64).to_le_bytes());
        }
        for v in list.vectors.iter() {
            buf.extend_from_slice(&v.to_le_bytes());
        }
    }

    let digest = blake3::hash(&buf);
    buf.extend_from_slice(digest.as_bytes());
    std::fs::write(path, buf)?;
    Ok(())
}

pub(crate) fn read(path: &Path) -> RecallResult<MipsIndex> {
    let display = path.display().to_string();
    let bytes = std::fs::read(path).map_err(|e| IndexError::LoadFailed {
        path: display.clone(),
        reason: e.to_string(),
    })?;
    let corrupt = |details: String| IndexError::Corrupt {
        path: display.clone(),
        details,
    };

    if bytes.len() < MAGIC.len() + DIGEST_LEN {
        return Err(corrupt(format!("file too small: {} bytes", bytes.len())).into());
    }
    let (body, digest) = bytes.split_at(bytes.len() - DIGEST_LEN);
    if blake3::hash(body).as_bytes() != digest {
        return Err(corrupt("checksum mismatch".to_string()).into());
    }

    let mut r = Reader::new(body);
    if r.take(4).map_err(&corrupt)? != MAGIC {
        return Err(corrupt("bad magic".to_string()).into());
    }
    let version = r.u32().map_err(&corrupt)?;
    if version != VERSION {
        return Err(corrupt(format!("unsupported version {version}")).into());
    }
    let tag = r.u8().map_err(&corrupt)?;
    let kind = IndexKind::from_tag(tag).ok_or_else(|| corrupt(format!("unknown kind tag {tag}")))?;
    let dim = r.u32().map_err(&corrupt)? as usize;
    let count = r.u64().map_err(&corrupt)? as usize;
    let nlist = r.u32().map_err(&corrupt)? as usize;

    if count == 0 {
        return Err(IndexError::EmptyIndex.into());
    }
    if count > body.len() / 8 {
        return Err(corrupt(format!("header claims {count} vectors in {} bytes", body.len())).into());
    }
    let (centroids, list_count) = match kind {
        IndexKind::Flat => (Array2::zeros((0, dim)), 1),
        IndexKind::IvfFlat => {
            if nlist == 0 {
                return Err(IndexError::NotTrained.into());
            }
            let n = nlist
                .checked_mul(dim)
                .ok_or_else(|| corrupt("centroid size overflow".to_string()))?;
            let values = r.f32s(n).map_err(&corrupt)?;
            let centroids =
                Array2::from_shape_vec((nlist, dim), values).map_err(|e| corrupt(e.to_string()))?;
            (centroids, nlist)
        }
    };

    let mut lists = Vec::with_capacity(list_count.min(count));
    let mut present = vec![false; count];
    let mut seen = 0usize;
    for _ in 0..list_count {
        let len = r.u64().map_err(&corrupt)? as usize;
        if len > count - seen {
            return Err(corrupt(format!(
                "list of {len} ids exceeds the {} vectors left",
                count - seen
            ))
            .into());
        }
        let mut ids = Vec::with_capacity(len);
        for _ in 0..len {
            let id = r.u64().map_err(&corrupt)? as usize;
            if id >= count {
                return Err(corrupt(format!("id {id} out of range for {count} vectors")).into());
            }
            if std::mem::replace(&mut present[id], true) {
                return Err(corrupt(format!("id {id} stored twice")).into());
            }
            ids.push(id);
        }
        let n = len
            .checked_mul(dim)
            .ok_or_else(|| corrupt("list size overflow".to_string()))?;
        let values = r.f32s(n).map_err(&corrupt)?;
        let vectors =
            Array2::from_shape_vec((len, dim), values).map_err(|e| corrupt(e.to_string()))?;
        seen += len;
        lists.push(InvertedList { ids, vectors });
    }

    if seen != count {
        return Err(corrupt(format!("header says {count} vectors, lists hold {seen}")).into());
    }
    if !r.is_at_end() {
        return Err(corrupt("trailing bytes after lists".to_string()).into());
    }

    Ok(MipsIndex::from_parts(kind, dim, centroids, lists, count))
}

/// Little-endian cursor. Every read reports truncation as an error.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], String> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| format!("truncated at byte {}", self.pos))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, String> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, String> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Result<u64, String> {
        let b = self.take(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(b);
        Ok(u64::from_le_bytes(arr))
    }

    fn f32s(&mut self, n: usize) -> Result<Vec<f32>, String> {
        let len = n
            .checked_mul(4)
            .ok_or_else(|| "length overflow".to_string())?;
        Ok(self
            .take(len)?
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    fn is_at_end(&self) -> bool {
        self.pos == self.bytes.len()
    }
}
