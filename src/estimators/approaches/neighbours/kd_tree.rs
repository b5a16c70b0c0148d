// SPDX-FileCopyrightText: 2025-2026 Carlson Büth <code@cbueth.de>
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! KD-tree neighbour search.
//!
//! kiddo's trees prune with an additive per-axis distance, which is valid for the
//! Euclidean metric but not for the max-norm. Queries therefore run against a
//! Euclidean tree and are refined with the exact Chebyshev distance: the
//! Chebyshev ball of radius `r` lies inside the Euclidean ball of radius
//! `r * sqrt(D)`, so the Euclidean query returns a superset of the true
//! neighbours and the refinement makes the result identical to
//! [`BruteForceBackend`](super::BruteForceBackend).

use kiddo::traits::DistanceMetric;
use kiddo::{ImmutableKdTree, SquaredEuclidean};
use ndarray::{Array1, Array2, ArrayView2};
use std::num::NonZeroUsize;
use std::ops::Range;

use super::brute_force::{knn_chunk, range_chunk};
use super::{KnnResult, NeighbourSearchBackend, k_smallest, knn_layout, range_layout};
use crate::error::Result;
use crate::estimators::approaches::common_nd::dataset::{
    ChunkLayout, Chebyshev, flatten, outside_theiler, to_points,
};

/// Highest dimension with a monomorphised KD-tree; above it the exhaustive search is used.
pub const MAX_TREE_DIM: usize = 16;

/// Relative slack on the Euclidean query radius so rounding never drops a boundary point.
const RADIUS_SLACK: f64 = 1e-9;

/// One immutable KD-tree per chunk, rebuilt on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct KdTreeBackend;

impl KdTreeBackend {
    pub fn new() -> Self {
        Self
    }
}

macro_rules! dispatch_dim {
    ($dim:expr, $fallback:expr, $f:ident($($arg:expr),*)) => {
        match $dim {
            1 => $f::<1>($($arg),*),
            2 => $f::<2>($($arg),*),
            3 => $f::<3>($($arg),*),
            4 => $f::<4>($($arg),*),
            5 => $f::<5>($($arg),*),
            6 => $f::<6>($($arg),*),
            7 => $f::<7>($($arg),*),
            8 => $f::<8>($($arg),*),
            9 => $f::<9>($($arg),*),
            10 => $f::<10>($($arg),*),
            11 => $f::<11>($($arg),*),
            12 => $f::<12>($($arg),*),
            13 => $f::<13>($($arg),*),
            14 => $f::<14>($($arg),*),
            15 => $f::<15>($($arg),*),
            16 => $f::<16>($($arg),*),
            _ => $fallback,
        }
    };
}

impl NeighbourSearchBackend for KdTreeBackend {
    fn name(&self) -> &'static str {
        "kd-tree"
    }

    fn knn_search(
        &self,
        points: ArrayView2<'_, f64>,
        k: usize,
        theiler_t: usize,
        n_chunks: usize,
    ) -> Result<KnnResult> {
        let layout = knn_layout(points, k, theiler_t, n_chunks)?;
        let dim = points.ncols();
        if dim > MAX_TREE_DIM {
            tracing::debug!(dim, "dimension above KD-tree limit, using exhaustive KNN");
        }
        Ok(dispatch_dim!(
            dim,
            super::brute_force::knn_flat(&flatten(points), dim, layout, k, theiler_t),
            knn_tree(points, layout, k, theiler_t)
        ))
    }

    fn range_search(
        &self,
        points: ArrayView2<'_, f64>,
        radii: &[f64],
        theiler_t: usize,
        n_chunks: usize,
    ) -> Result<Array1<usize>> {
        let layout = range_layout(points, radii, n_chunks)?;
        let dim = points.ncols();
        Ok(dispatch_dim!(
            dim,
            super::brute_force::range_flat(&flatten(points), dim, layout, radii, theiler_t),
            range_tree(points, layout, radii, theiler_t)
        ))
    }
}

fn knn_tree<const D: usize>(
    points: ArrayView2<'_, f64>,
    layout: ChunkLayout,
    k: usize,
    theiler_t: usize,
) -> KnnResult {
    let pts = to_points::<D>(points);
    let mut out = KnnResult {
        indices: Array2::<usize>::zeros((k, layout.n_points)),
        distances: Array2::<f64>::zeros((k, layout.n_points)),
    };
    // at most 2 * theiler_t + 1 of the fetched points are ineligible
    let fetch = NonZeroUsize::new(k + 2 * theiler_t + 1).unwrap_or(NonZeroUsize::MIN);
    let mut candidates: Vec<(f64, usize)> = Vec::with_capacity(fetch.get());

    for chunk in layout.ranges() {
        if !chunk_is_finite(&pts[chunk.clone()]) {
            knn_chunk(&flatten(points), D, chunk, k, theiler_t, &mut out);
            continue;
        }
        let start = chunk.start;
        let tree: ImmutableKdTree<f64, D> = ImmutableKdTree::new_from_slice(&pts[chunk.clone()]);

        for i in chunk.clone() {
            let p = &pts[i];

            // Upper bound on the k-th Chebyshev distance from the Euclidean nearest points.
            candidates.clear();
            for nn in tree.nearest_n::<SquaredEuclidean>(p, fetch) {
                let (_dist2, item): (f64, u64) = nn.into();
                let j = start + item as usize;
                if outside_theiler(i, j, theiler_t) {
                    candidates.push((cheb(p, &pts[j]), j));
                }
            }
            k_smallest(&mut candidates, k);
            let bound = if candidates.len() == k {
                candidates[k - 1].0
            } else {
                f64::INFINITY
            };

            // Everything within the bound, refined with the exact metric.
            candidates.clear();
            for j in ball_members(&tree, chunk.clone(), p, bound) {
                if outside_theiler(i, j, theiler_t) {
                    candidates.push((cheb(p, &pts[j]), j));
                }
            }
            k_smallest(&mut candidates, k);
            for (r, &(d, j)) in candidates.iter().enumerate() {
                out.distances[[r, i]] = d;
                out.indices[[r, i]] = j;
            }
        }
    }
    out
}

fn range_tree<const D: usize>(
    points: ArrayView2<'_, f64>,
    layout: ChunkLayout,
    radii: &[f64],
    theiler_t: usize,
) -> Array1<usize> {
    let pts = to_points::<D>(points);
    let mut counts = Array1::<usize>::zeros(layout.n_points);

    for chunk in layout.ranges() {
        if !chunk_is_finite(&pts[chunk.clone()]) {
            range_chunk(&flatten(points), D, chunk, radii, theiler_t, &mut counts);
            continue;
        }
        let tree: ImmutableKdTree<f64, D> = ImmutableKdTree::new_from_slice(&pts[chunk.clone()]);

        for i in chunk.clone() {
            let r = radii[i];
            // nothing is strictly closer than a zero or NaN radius
            if r.is_nan() || r <= 0.0 {
                continue;
            }
            let p = &pts[i];
            counts[i] = ball_members(&tree, chunk.clone(), p, r)
                .into_iter()
                .filter(|&j| outside_theiler(i, j, theiler_t) && cheb(p, &pts[j]) < r)
                .count();
        }
    }
    counts
}

/// Global indices of the chunk points whose Chebyshev distance to `p` may be `<= radius`.
fn ball_members<const D: usize>(
    tree: &ImmutableKdTree<f64, D>,
    chunk: Range<usize>,
    p: &[f64; D],
    radius: f64,
) -> Vec<usize> {
    if !radius.is_finite() {
        return chunk.collect();
    }
    let radius2 = (D as f64) * radius * radius * (1.0 + RADIUS_SLACK) + f64::MIN_POSITIVE;
    tree.within_unsorted::<SquaredEuclidean>(p, radius2)
        .into_iter()
        .map(|nn| {
            let (_dist2, item): (f64, u64) = nn.into();
            chunk.start + item as usize
        })
        .collect()
}

#[inline]
fn cheb<const D: usize>(a: &[f64; D], b: &[f64; D]) -> f64 {
    <Chebyshev as DistanceMetric<f64, D>>::dist(a, b)
}

fn chunk_is_finite<const D: usize>(pts: &[[f64; D]]) -> bool {
    pts.iter().all(|p| p.iter().all(|v| v.is_finite()))
}
