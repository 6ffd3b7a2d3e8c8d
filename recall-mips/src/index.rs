//! MipsIndex: flat or inverted-file L2 index over augmented vectors.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use ndarray::{Array2, ArrayView1, ArrayView2};
use rayon::prelude::*;
use tracing::{debug, info};

use recall_core::config::IndexConfig;
use recall_core::device::Device;
use recall_core::errors::{IndexError, RecallError, RecallResult};
use recall_core::models::SearchHits;
use recall_core::traits::IVectorIndex;
use recall_observability::tracing_setup::events;

use crate::augment;
use crate::kmeans;

/// Index layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    /// One list, every query scans everything. Exact.
    Flat,
    /// `nlist` lists under a k-means quantizer; `nprobe` lists scanned per query.
    IvfFlat,
}

impl IndexKind {
    pub(crate) fn tag(self) -> u8 {
        match self {
            IndexKind::Flat => 0,
            IndexKind::IvfFlat => 1,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(IndexKind::Flat),
            1 => Some(IndexKind::IvfFlat),
            _ => None,
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexKind::Flat => write!(f, "flat"),
            IndexKind::IvfFlat => write!(f, "ivf_flat"),
        }
    }
}

impl FromStr for IndexKind {
    type Err = RecallError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flat" => Ok(IndexKind::Flat),
            "ivf" | "ivf_flat" => Ok(IndexKind::IvfFlat),
            other => Err(IndexError::InvalidParameter {
                name: "kind".to_string(),
                reason: format!("unknown index kind {other:?}"),
            }
            .into()),
        }
    }
}

/// One inverted list: ids and their vectors, row-aligned.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct InvertedList {
    pub(crate) ids: Vec<usize>,
    pub(crate) vectors: Array2<f32>,
}

impl InvertedList {
    fn empty(dim: usize) -> Self {
        Self {
            ids: Vec::new(),
            vectors: Array2::zeros((0, dim)),
        }
    }

    fn push(&mut self, id: usize, v: ArrayView1<'_, f32>) -> RecallResult<()> {
        self.vectors
            .push_row(v)
            .map_err(|_| IndexError::DimensionMismatch {
                expected: self.vectors.ncols(),
                actual: v.len(),
            })?;
        self.ids.push(id);
        Ok(())
    }
}

/// Candidate kept in the bounded max-heap during a scan.
#[derive(Debug, Clone, Copy)]
struct Hit {
    distance: f32,
    id: usize,
}

impl PartialEq for Hit {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Hit {}

impl PartialOrd for Hit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Hit {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then(self.id.cmp(&other.id))
    }
}

/// L2 index emulating inner-product search over max-norm augmented vectors.
///
/// Ids are assigned in insertion order, starting at 0, so they line up with
/// the memory pool when candidates are added in file order.
#[derive(Debug, Clone)]
pub struct MipsIndex {
    pub(crate) kind: IndexKind,
    pub(crate) dim: usize,
    /// `(nlist, dim)`. Empty for `Flat`.
    pub(crate) centroids: Array2<f32>,
    pub(crate) lists: Vec<InvertedList>,
    pub(crate) count: usize,
    nprobe: usize,
    parallel: bool,
    device: Device,
}

impl MipsIndex {
    /// An empty exact index.
    pub fn new_flat(dim: usize) -> Self {
        Self {
            kind: IndexKind::Flat,
            dim,
            centroids: Array2::zeros((0, dim)),
            lists: vec![InvertedList::empty(dim)],
            count: 0,
            nprobe: 1,
            parallel: true,
            device: Device::Host,
        }
    }

    /// An empty IVF index whose quantizer is trained on `training`.
    pub fn train_ivf(
        training: ArrayView2<'_, f32>,
        nlist: usize,
        iterations: usize,
        seed: u64,
    ) -> RecallResult<Self> {
        let (n, dim) = training.dim();
        if n == 0 {
            return Err(IndexError::EmptyIndex.into());
        }
        if nlist == 0 {
            return Err(IndexError::InvalidParameter {
                name: "nlist".to_string(),
                reason: "must be at least 1".to_string(),
            }
            .into());
        }
        let nlist = nlist.min(n);
        let centroids = kmeans::train(training, nlist, iterations, seed);
        debug!(nlist, dim, trained_on = n, "IVF quantizer trained");
        Ok(Self {
            kind: IndexKind::IvfFlat,
            dim,
            centroids,
            lists: (0..nlist).map(|_| InvertedList::empty(dim)).collect(),
            count: 0,
            nprobe: 1,
            parallel: true,
            device: Device::Host,
        })
    }

    pub(crate) fn from_parts(
        kind: IndexKind,
        dim: usize,
        centroids: Array2<f32>,
        lists: Vec<InvertedList>,
        count: usize,
    ) -> Self {
        Self {
            kind,
            dim,
            centroids,
            lists,
            count,
            nprobe: 1,
            parallel: true,
            device: Device::Host,
        }
    }

    /// Build an index over raw (un-augmented) feature vectors.
    ///
    /// Returns the index and the max norm used for augmentation; the same
    /// value must be used to convert search distances back to inner products.
    pub fn build(features: ArrayView2<'_, f32>, config: &IndexConfig) -> RecallResult<(Self, f32)> {
        if features.nrows() == 0 {
            return Err(IndexError::EmptyIndex.into());
        }
        let max_norm = augment::max_norm(features);
        let augmented = augment::augment_data(features, max_norm)?;

        let mut index = match config.kind.parse::<IndexKind>()? {
            IndexKind::Flat => Self::new_flat(augmented.ncols()),
            IndexKind::IvfFlat => Self::train_ivf(
                augmented.view(),
                config.nlist,
                config.kmeans_iterations,
                config.seed,
            )?,
        };
        index.add(augmented.view())?;
        index.set_nprobe(config.nprobe);
        index.set_parallel(config.parallel_search);

        info!(
            kind = %index.kind,
            vectors = index.count,
            nlist = index.nlist(),
            max_norm,
            "index built"
        );
        Ok((index, max_norm))
    }

    /// Append vectors. Ids continue from the current count.
    pub fn add(&mut self, vectors: ArrayView2<'_, f32>) -> RecallResult<()> {
        if vectors.ncols() != self.dim {
            return Err(IndexError::DimensionMismatch {
                expected: self.dim,
                actual: vectors.ncols(),
            }
            .into());
        }
        for row in vectors.rows() {
            let list = match self.kind {
                IndexKind::Flat => 0,
                IndexKind::IvfFlat => kmeans::nearest_centroid(self.centroids.view(), row),
            };
            self.lists[list].push(self.count, row)?;
            self.count += 1;
        }
        Ok(())
    }

    /// Load a built index. See [`crate::persist`] for the format.
    pub fn load(path: impl AsRef<Path>, nprobe: usize) -> RecallResult<Self> {
        let path = path.as_ref();
        let mut index = crate::persist::read(path)?;
        index.set_nprobe(nprobe);
        events::index_loaded(
            &path.display().to_string(),
            &index.kind.to_string(),
            index.count,
            index.nprobe,
        );
        Ok(index)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> RecallResult<()> {
        crate::persist::write(self, path.as_ref())
    }

    /// Lists scanned per query. Clamped to `[1, nlist]`.
    pub fn set_nprobe(&mut self, nprobe: usize) {
        self.nprobe = nprobe.clamp(1, self.nlist().max(1));
    }

    pub fn nprobe(&self) -> usize {
        self.nprobe
    }

    pub fn set_parallel(&mut self, parallel: bool) {
        self.parallel = parallel;
    }

    pub fn kind(&self) -> IndexKind {
        self.kind
    }

    pub fn nlist(&self) -> usize {
        self.lists.len()
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Place the index on `device`. The scan itself always runs on the host.
    pub fn to_device(&mut self, device: Device) {
        if self.device == device {
            return;
        }
        events::device_transfer("mips_index", &self.device.to_string(), &device.to_string());
        self.device = device;
    }

    fn search_one(&self, query: ArrayView1<'_, f32>, k: usize) -> (Vec<usize>, Vec<f32>) {
        let probed: Vec<usize> = match self.kind {
            IndexKind::Flat => vec![0],
            IndexKind::IvfFlat => {
                kmeans::nearest_centroids(self.centroids.view(), query, self.nprobe)
            }
        };

        let mut heap: BinaryHeap<Hit> = BinaryHeap::with_capacity(k + 1);
        for list in probed.iter().map(|&l| &self.lists[l]) {
            for (&id, v) in list.ids.iter().zip(list.vectors.rows()) {
                let hit = Hit {
                    distance: kmeans::l2_sq(query, v),
                    id,
                };
                if heap.len() < k {
                    heap.push(hit);
                } else if heap.peek().is_some_and(|worst| hit < *worst) {
                    heap.pop();
                    heap.push(hit);
                }
            }
        }

        let hits = heap.into_sorted_vec();
        (
            hits.iter().map(|h| h.id).collect(),
            hits.iter().map(|h| h.distance).collect(),
        )
    }
}

impl IVectorIndex for MipsIndex {
    fn search(&self, queries: ArrayView2<'_, f32>, k: usize) -> RecallResult<SearchHits> {
        if queries.ncols() != self.dim {
            return Err(IndexError::DimensionMismatch {
                expected: self.dim,
                actual: queries.ncols(),
            }
            .into());
        }
        if self.count == 0 {
            return Err(IndexError::EmptyIndex.into());
        }

        let _span = recall_observability::index_search_span!(queries.nrows(), k).entered();
        let rows: Vec<(Vec<usize>, Vec<f32>)> = if self.parallel {
            (0..queries.nrows())
                .into_par_iter()
                .map(|i| self.search_one(queries.row(i), k))
                .collect()
        } else {
            (0..queries.nrows())
                .map(|i| self.search_one(queries.row(i), k))
                .collect()
        };

        let (ids, distances) = rows.into_iter().unzip();
        Ok(SearchHits { ids, distances })
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn len(&self) -> usize {
        self.count
    }
}
