// SPDX-FileCopyrightText: 2025-2026 Carlson Büth <code@cbueth.de>
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use kiddo::traits::DistanceMetric;
use ndarray::{Array2, ArrayView2, ArrayViewMut2, Axis, concatenate, s};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use std::ops::Range;

use crate::error::{EstimatorError, Result};

/// Chebyshev distance metric (L-infinity norm) for kiddo.
///
/// The Kraskov estimator counts marginal neighbours inside the joint-space
/// max-norm ball, so every backend measures distances with this metric.
pub struct Chebyshev;

impl<const K: usize> DistanceMetric<f64, K> for Chebyshev {
    fn dist(a: &[f64; K], b: &[f64; K]) -> f64 {
        let mut max = 0.0;
        for i in 0..K {
            let diff = (a[i] - b[i]).abs();
            if diff > max {
                max = diff;
            }
        }
        max
    }

    fn dist1(a: f64, b: f64) -> f64 {
        (a - b).abs()
    }
}

/// Chebyshev distance between two equally sized coordinate slices.
#[inline]
pub fn chebyshev(a: &[f64], b: &[f64]) -> f64 {
    let mut max = 0.0;
    for (x, y) in a.iter().zip(b) {
        let diff = (x - y).abs();
        if diff > max {
            max = diff;
        }
    }
    max
}

/// Partition of the sample axis into equally sized, independent chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLayout {
    pub n_points: usize,
    pub n_chunks: usize,
    pub chunk_size: usize,
}

impl ChunkLayout {
    /// Chunk counts that do not divide the sample count are rejected rather than truncated.
    pub fn new(n_points: usize, n_chunks: usize) -> Result<Self> {
        if n_chunks == 0 {
            return Err(EstimatorError::config("n_chunks must be at least 1"));
        }
        if n_points % n_chunks != 0 {
            return Err(EstimatorError::dims(format!(
                "{n_points} samples cannot be split into {n_chunks} equal chunks"
            )));
        }
        Ok(Self {
            n_points,
            n_chunks,
            chunk_size: n_points / n_chunks,
        })
    }

    pub fn chunk_of(&self, i: usize) -> usize {
        i / self.chunk_size
    }

    pub fn range(&self, chunk: usize) -> Range<usize> {
        let start = chunk * self.chunk_size;
        start..start + self.chunk_size
    }

    pub fn ranges(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        (0..self.n_chunks).map(|c| self.range(c))
    }

    /// Fails when some point of a chunk has fewer than `k` candidates outside its Theiler window.
    ///
    /// The worst-placed point loses `2 * theiler_t` temporal neighbours plus itself,
    /// so `k < chunk_size - 2 * theiler_t` guarantees `k` candidates for every point.
    pub fn check_neighbour_count(&self, k: usize, theiler_t: usize) -> Result<()> {
        if k == 0 {
            return Err(EstimatorError::config("k must be >= 1"));
        }
        let available = self.chunk_size.saturating_sub(theiler_t.saturating_mul(2));
        if k >= available {
            return Err(EstimatorError::InsufficientSamples {
                k,
                theiler_t,
                chunk_size: self.chunk_size,
            });
        }
        Ok(())
    }
}

/// True when `j` may be a neighbour of `i`, i.e. lies outside the Theiler window.
#[inline]
pub fn outside_theiler(i: usize, j: usize, theiler_t: usize) -> bool {
    i.abs_diff(j) > theiler_t
}

/// Convert an ArrayView2<f64> with exactly K columns into Vec<[f64; K]> points.
pub fn to_points<const K: usize>(data: ArrayView2<'_, f64>) -> Vec<[f64; K]> {
    assert!(data.ncols() == K, "data.ncols() must equal K");
    let n = data.nrows();
    let mut points: Vec<[f64; K]> = Vec::with_capacity(n);
    if let Some(slice) = data.as_slice() {
        for chunk in slice.chunks_exact(K) {
            let mut p = [0.0; K];
            p.copy_from_slice(&chunk[..K]);
            points.push(p);
        }
    } else {
        for r in 0..n {
            let mut p = [0.0; K];
            for c in 0..K {
                p[c] = data[(r, c)];
            }
            points.push(p);
        }
    }
    points
}

/// Row-major copy of a point set, used by the brute-force and GPU paths.
pub fn flatten(data: ArrayView2<'_, f64>) -> Vec<f64> {
    match data.as_slice() {
        Some(slice) => slice.to_vec(),
        None => data.iter().copied().collect(),
    }
}

/// Joint space of two paired realisations (features of `var1` followed by `var2`).
pub fn joint_space(var1: ArrayView2<'_, f64>, var2: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
    check_paired(var1, var2)?;
    concatenate(Axis(1), &[var1.view(), var2.view()]).map_err(|e| EstimatorError::dims(e.to_string()))
}

/// Both realisations must be non-empty and share the sample axis.
pub fn check_paired(var1: ArrayView2<'_, f64>, var2: ArrayView2<'_, f64>) -> Result<()> {
    if var1.nrows() != var2.nrows() {
        return Err(EstimatorError::dims(format!(
            "var1 has {} samples but var2 has {}",
            var1.nrows(),
            var2.nrows()
        )));
    }
    if var1.ncols() == 0 || var2.ncols() == 0 {
        return Err(EstimatorError::dims("variables need at least one dimension"));
    }
    Ok(())
}

/// Views of the pair shifted so that row t holds `var1[t]` and `var2[t + lag]`.
pub fn lagged<'a, 'b>(
    var1: ArrayView2<'a, f64>,
    var2: ArrayView2<'b, f64>,
    lag: usize,
) -> Result<(ArrayView2<'a, f64>, ArrayView2<'b, f64>)> {
    let n = var1.nrows();
    if lag > 0 && lag >= n {
        return Err(EstimatorError::dims(format!(
            "lag {lag} leaves no samples out of {n}"
        )));
    }
    Ok((
        var1.slice_move(s![..n - lag, ..]),
        var2.slice_move(s![lag.., ..]),
    ))
}

/// Z-standardise every column in place. Constant columns are only centred.
pub fn normalise_columns(mut data: ArrayViewMut2<'_, f64>) {
    if data.nrows() < 2 {
        return;
    }
    for mut col in data.axis_iter_mut(Axis(1)) {
        let mean = col.mean().unwrap_or(0.0);
        let std = col.std(1.0);
        if std > 0.0 && std.is_finite() {
            col.mapv_inplace(|v| (v - mean) / std);
        } else {
            col.mapv_inplace(|v| v - mean);
        }
    }
}

/// Z-standardise every column of every chunk separately.
///
/// Chunks never share statistics, so a non-finite sample spoils only its own chunk.
pub fn normalise_chunks(data: &mut Array2<f64>, layout: &ChunkLayout) {
    for rows in layout.ranges() {
        normalise_columns(data.slice_mut(s![rows, ..]));
    }
}

/// Add zero-mean Gaussian noise with standard deviation `level` to every entry.
pub fn add_noise<R: Rng + ?Sized>(data: &mut Array2<f64>, level: f64, rng: &mut R) -> Result<()> {
    if level == 0.0 {
        return Ok(());
    }
    let normal = Normal::new(0.0, level)
        .map_err(|e| EstimatorError::config(format!("noise_level {level}: {e}")))?;
    data.mapv_inplace(|v| v + normal.sample(rng));
    Ok(())
}

/// True if any sample in `rows` carries a NaN or infinite coordinate.
pub fn rows_non_finite(data: ArrayView2<'_, f64>, rows: Range<usize>) -> bool {
    data.slice(s![rows, ..]).iter().any(|v| !v.is_finite())
}
