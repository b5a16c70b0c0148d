// SPDX-FileCopyrightText: 2025-2026 Carlson Büth <code@cbueth.de>
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Neighbour Search Engine
//!
//! k-nearest-neighbour and fixed-radius range searches under the Chebyshev
//! (max-norm) metric, with a Theiler exclusion window and independent chunks.
//!
//! A point set of `N` samples is split into `n_chunks` equal blocks along the
//! sample axis. Each block is searched on its own; no neighbour ever crosses a
//! chunk boundary. Within a block, a candidate `j` is only eligible for query
//! `i` if `|i - j| > theiler_t`, which always excludes the query itself.
//!
//! Three interchangeable backends implement [`NeighbourSearchBackend`]:
//!
//! - [`BruteForceBackend`]: exhaustive in-process reference.
//! - [`KdTreeBackend`]: one `kiddo` KD-tree per chunk; same results as the reference.
//! - `GpuBackend` (feature `gpu_support`): one `wgpu` compute dispatch per search,
//!   covering every chunk at once, evaluated in single precision.
//!
//! Ties in distance are broken by ascending sample index on every backend.

use ndarray::{Array1, Array2, ArrayView2};

use crate::error::{EstimatorError, Result};
use crate::estimators::approaches::common_nd::dataset::ChunkLayout;

pub mod brute_force;
pub mod kd_tree;
#[cfg(feature = "gpu_support")]
pub mod gpu;

pub use brute_force::BruteForceBackend;
pub use kd_tree::KdTreeBackend;
#[cfg(feature = "gpu_support")]
pub use gpu::GpuBackend;

/// Result of a KNN search, stored neighbour-rank-major.
///
/// `distances[[r, i]]` is the distance from point `i` to its `(r + 1)`-th
/// nearest eligible neighbour and `indices[[r, i]]` that neighbour's global
/// sample index.
#[derive(Debug, Clone, PartialEq)]
pub struct KnnResult {
    pub indices: Array2<usize>,
    pub distances: Array2<f64>,
}

impl KnnResult {
    pub fn k(&self) -> usize {
        self.distances.nrows()
    }

    /// Distance of every point to its k-th neighbour (the last distance row).
    pub fn radii(&self) -> Array1<f64> {
        self.distances.row(self.k() - 1).to_owned()
    }
}

/// Capability interface for KNN and range searches.
pub trait NeighbourSearchBackend {
    /// Short backend name used in diagnostics and errors.
    fn name(&self) -> &'static str;

    /// Find the `k` nearest eligible neighbours of every point, per chunk.
    fn knn_search(
        &self,
        points: ArrayView2<'_, f64>,
        k: usize,
        theiler_t: usize,
        n_chunks: usize,
    ) -> Result<KnnResult>;

    /// Count eligible neighbours strictly closer than `radii[i]` to every point `i`, per chunk.
    fn range_search(
        &self,
        points: ArrayView2<'_, f64>,
        radii: &[f64],
        theiler_t: usize,
        n_chunks: usize,
    ) -> Result<Array1<usize>>;
}

impl<B: NeighbourSearchBackend + ?Sized> NeighbourSearchBackend for &B {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn knn_search(
        &self,
        points: ArrayView2<'_, f64>,
        k: usize,
        theiler_t: usize,
        n_chunks: usize,
    ) -> Result<KnnResult> {
        (**self).knn_search(points, k, theiler_t, n_chunks)
    }

    fn range_search(
        &self,
        points: ArrayView2<'_, f64>,
        radii: &[f64],
        theiler_t: usize,
        n_chunks: usize,
    ) -> Result<Array1<usize>> {
        (**self).range_search(points, radii, theiler_t, n_chunks)
    }
}

/// Shared argument checks for a KNN search.
pub(crate) fn knn_layout(
    points: ArrayView2<'_, f64>,
    k: usize,
    theiler_t: usize,
    n_chunks: usize,
) -> Result<ChunkLayout> {
    if points.ncols() == 0 {
        return Err(EstimatorError::dims("points need at least one dimension"));
    }
    let layout = ChunkLayout::new(points.nrows(), n_chunks)?;
    layout.check_neighbour_count(k, theiler_t)?;
    Ok(layout)
}

/// Shared argument checks for a range search.
pub(crate) fn range_layout(
    points: ArrayView2<'_, f64>,
    radii: &[f64],
    n_chunks: usize,
) -> Result<ChunkLayout> {
    if points.ncols() == 0 {
        return Err(EstimatorError::dims("points need at least one dimension"));
    }
    if radii.len() != points.nrows() {
        return Err(EstimatorError::dims(format!(
            "{} radii supplied for {} points",
            radii.len(),
            points.nrows()
        )));
    }
    ChunkLayout::new(points.nrows(), n_chunks)
}

/// Keep the `k` smallest `(distance, index)` pairs in ascending order.
///
/// Distances are compared with `total_cmp`, then by index, so equal distances
/// resolve to the lower sample index.
pub(crate) fn k_smallest(candidates: &mut Vec<(f64, usize)>, k: usize) {
    let cmp = |a: &(f64, usize), b: &(f64, usize)| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1));
    if candidates.len() > k {
        candidates.select_nth_unstable_by(k - 1, cmp);
        candidates.truncate(k);
    }
    candidates.sort_unstable_by(cmp);
}
