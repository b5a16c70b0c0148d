// SPDX-FileCopyrightText: 2025-2026 Carlson Büth <code@cbueth.de>
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use ndarray::{Array1, Array2, ArrayView2};
use std::ops::Range;

use super::{KnnResult, NeighbourSearchBackend, k_smallest, knn_layout, range_layout};
use crate::error::Result;
use crate::estimators::approaches::common_nd::dataset::{
    ChunkLayout, chebyshev, flatten, outside_theiler,
};

/// Exhaustive reference backend: compares every pair inside a chunk.
///
/// Cost is `O(N * chunk_size * d)`. Used as ground truth for the faster backends
/// and for high-dimensional point sets the KD-tree backend does not specialise.
#[derive(Debug, Clone, Copy, Default)]
pub struct BruteForceBackend;

impl BruteForceBackend {
    pub fn new() -> Self {
        Self
    }
}

impl NeighbourSearchBackend for BruteForceBackend {
    fn name(&self) -> &'static str {
        "brute-force"
    }

    fn knn_search(
        &self,
        points: ArrayView2<'_, f64>,
        k: usize,
        theiler_t: usize,
        n_chunks: usize,
    ) -> Result<KnnResult> {
        let layout = knn_layout(points, k, theiler_t, n_chunks)?;
        Ok(knn_flat(&flatten(points), points.ncols(), layout, k, theiler_t))
    }

    fn range_search(
        &self,
        points: ArrayView2<'_, f64>,
        radii: &[f64],
        theiler_t: usize,
        n_chunks: usize,
    ) -> Result<Array1<usize>> {
        let layout = range_layout(points, radii, n_chunks)?;
        Ok(range_flat(&flatten(points), points.ncols(), layout, radii, theiler_t))
    }
}

/// KNN over a row-major buffer; arguments are assumed validated.
pub(crate) fn knn_flat(
    flat: &[f64],
    dim: usize,
    layout: ChunkLayout,
    k: usize,
    theiler_t: usize,
) -> KnnResult {
    let mut out = KnnResult {
        indices: Array2::<usize>::zeros((k, layout.n_points)),
        distances: Array2::<f64>::zeros((k, layout.n_points)),
    };
    for chunk in layout.ranges() {
        knn_chunk(flat, dim, chunk, k, theiler_t, &mut out);
    }
    out
}

/// Exhaustive KNN for the points of a single chunk, written into `out`.
pub(crate) fn knn_chunk(
    flat: &[f64],
    dim: usize,
    chunk: Range<usize>,
    k: usize,
    theiler_t: usize,
    out: &mut KnnResult,
) {
    let row = |i: usize| &flat[i * dim..(i + 1) * dim];
    let mut candidates: Vec<(f64, usize)> = Vec::with_capacity(chunk.len());
    for i in chunk.clone() {
        candidates.clear();
        let p = row(i);
        for j in chunk.clone() {
            if outside_theiler(i, j, theiler_t) {
                candidates.push((chebyshev(p, row(j)), j));
            }
        }
        k_smallest(&mut candidates, k);
        for (r, &(d, j)) in candidates.iter().enumerate() {
            out.distances[[r, i]] = d;
            out.indices[[r, i]] = j;
        }
    }
}

/// Range counts over a row-major buffer; arguments are assumed validated.
pub(crate) fn range_flat(
    flat: &[f64],
    dim: usize,
    layout: ChunkLayout,
    radii: &[f64],
    theiler_t: usize,
) -> Array1<usize> {
    let mut counts = Array1::<usize>::zeros(layout.n_points);
    for chunk in layout.ranges() {
        range_chunk(flat, dim, chunk, radii, theiler_t, &mut counts);
    }
    counts
}

/// Exhaustive range counts for the points of a single chunk, written into `counts`.
pub(crate) fn range_chunk(
    flat: &[f64],
    dim: usize,
    chunk: Range<usize>,
    radii: &[f64],
    theiler_t: usize,
    counts: &mut Array1<usize>,
) {
    let row = |i: usize| &flat[i * dim..(i + 1) * dim];
    for i in chunk.clone() {
        let r = radii[i];
        let p = row(i);
        counts[i] = chunk
            .clone()
            .filter(|&j| outside_theiler(i, j, theiler_t) && chebyshev(p, row(j)) < r)
            .count();
    }
}
