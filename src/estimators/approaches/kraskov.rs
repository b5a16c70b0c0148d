// SPDX-FileCopyrightText: 2025-2026 Carlson Büth <code@cbueth.de>
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Kraskov-Stögbauer-Grassberger mutual information (algorithm 1).
//!
//! For every chunk of `n` samples
//!
//! I_hat = psi(k) + psi(n) - < psi(n_x + 1) + psi(n_y + 1) >
//!
//! where `eps_i` is the Chebyshev distance from sample `i` to its k-th
//! neighbour in the joint space and `n_x`, `n_y` count the samples strictly
//! closer than `eps_i` in the marginal spaces. All three searches honour the
//! same Theiler window and never cross chunk boundaries.

use ndarray::{Array1, Array2, ArrayView2, CowArray, Ix2};
use rand::SeedableRng;
use rand::rngs::StdRng;
use statrs::function::gamma::digamma;

use crate::error::{EstimatorError, Result};
use crate::estimators::approaches::common_nd::dataset::{
    ChunkLayout, add_noise, check_paired, joint_space, lagged, normalise_chunks, rows_non_finite,
};
use crate::estimators::approaches::neighbours::{KdTreeBackend, NeighbourSearchBackend};
use crate::estimators::options::EstimatorOptions;
use crate::estimators::traits::{LocalValues, MutualInformationEstimator, require_single_chunk};

/// Marginal neighbour counts of a prepared problem.
struct NeighbourCounts {
    n_x: Array1<usize>,
    n_y: Array1<usize>,
}

/// Kraskov type 1 MI estimator on top of any [`NeighbourSearchBackend`].
#[derive(Debug, Clone)]
pub struct KraskovMutualInformation<B = KdTreeBackend> {
    backend: B,
    opts: EstimatorOptions,
    batched: bool,
}

impl KraskovMutualInformation<KdTreeBackend> {
    /// Serial estimator on the in-process KD-tree backend.
    pub fn new(opts: EstimatorOptions) -> Result<Self> {
        Ok(Self::with_backend(KdTreeBackend::new(), opts)?.batched(false))
    }
}

impl<B: NeighbourSearchBackend> KraskovMutualInformation<B> {
    /// Batched estimator: every call may carry many chunks.
    pub fn with_backend(backend: B, opts: EstimatorOptions) -> Result<Self> {
        opts.validate()?;
        Ok(Self {
            backend,
            opts,
            batched: true,
        })
    }

    /// Allow (`true`) or reject (`false`) calls with more than one chunk.
    pub fn batched(mut self, batched: bool) -> Self {
        self.batched = batched;
        self
    }

    pub fn options(&self) -> &EstimatorOptions {
        &self.opts
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn rng(&self) -> StdRng {
        match self.opts.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// Checks that do not depend on the noise, run before the caller's data is touched.
    fn check_call(&self, var1: ArrayView2<'_, f64>, var2: ArrayView2<'_, f64>, n_chunks: usize) -> Result<()> {
        check_paired(var1, var2)?;
        if !self.batched {
            require_single_chunk("kraskov", n_chunks)?;
        }
        if self.opts.lag > 0 && n_chunks != 1 {
            return Err(EstimatorError::config(
                "lag is only supported for a single chunk",
            ));
        }
        let (x, _) = lagged(var1, var2, self.opts.lag)?;
        ChunkLayout::new(x.nrows(), n_chunks)?;
        Ok(())
    }

    /// Lagged and optionally normalised working pair with its chunk layout.
    fn working_pair<'a, 'b>(
        &self,
        var1: ArrayView2<'a, f64>,
        var2: ArrayView2<'b, f64>,
        n_chunks: usize,
    ) -> Result<(CowArray<'a, f64, Ix2>, CowArray<'b, f64, Ix2>, ChunkLayout)> {
        let (x, y) = lagged(var1, var2, self.opts.lag)?;
        let layout = ChunkLayout::new(x.nrows(), n_chunks)?;
        if !self.opts.normalise {
            return Ok((CowArray::from(x), CowArray::from(y), layout));
        }
        let mut x = x.to_owned();
        let mut y = y.to_owned();
        normalise_chunks(&mut x, &layout);
        normalise_chunks(&mut y, &layout);
        Ok((CowArray::from(x), CowArray::from(y), layout))
    }

    fn neighbour_counts(
        &self,
        x: ArrayView2<'_, f64>,
        y: ArrayView2<'_, f64>,
        theiler_t: usize,
        n_chunks: usize,
    ) -> Result<NeighbourCounts> {
        let joint = joint_space(x, y)?;
        let knn = self
            .backend
            .knn_search(joint.view(), self.opts.kraskov_k, theiler_t, n_chunks)?;
        let radii = knn.radii().to_vec();
        let n_x = self.backend.range_search(x, &radii, theiler_t, n_chunks)?;
        let n_y = self.backend.range_search(y, &radii, theiler_t, n_chunks)?;
        Ok(NeighbourCounts { n_x, n_y })
    }

    /// Estimate on data that already carries its noise.
    fn estimate_prepared(
        &self,
        var1: ArrayView2<'_, f64>,
        var2: ArrayView2<'_, f64>,
        n_chunks: usize,
    ) -> Result<Vec<f64>> {
        let (x, y, layout) = self.working_pair(var1, var2, n_chunks)?;
        let theiler_t = self.opts.theiler_t.resolve(y.view(), &layout);
        let k = self.opts.kraskov_k;
        layout.check_neighbour_count(k, theiler_t)?;

        tracing::debug!(
            backend = self.backend.name(),
            n_points = layout.n_points,
            n_chunks,
            chunk_size = layout.chunk_size,
            k,
            theiler_t,
            "kraskov estimate"
        );

        let counts = self.neighbour_counts(x.view(), y.view(), theiler_t, n_chunks)?;
        let constant = digamma(k as f64) + digamma(layout.chunk_size as f64);

        let values = layout
            .ranges()
            .enumerate()
            .map(|(chunk, rows)| {
                if rows_non_finite(x.view(), rows.clone()) || rows_non_finite(y.view(), rows.clone()) {
                    tracing::trace!(chunk, "non-finite samples, chunk estimate is NaN");
                    return f64::NAN;
                }
                let mean_marginal = rows
                    .map(|i| digamma(counts.n_x[i] as f64 + 1.0) + digamma(counts.n_y[i] as f64 + 1.0))
                    .sum::<f64>()
                    / layout.chunk_size as f64;
                let mi = constant - mean_marginal;
                tracing::trace!(chunk, mi, "chunk estimate");
                mi
            })
            .collect();
        Ok(values)
    }

    fn local_prepared(&self, var1: ArrayView2<'_, f64>, var2: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        let (x, y, layout) = self.working_pair(var1, var2, 1)?;
        let theiler_t = self.opts.theiler_t.resolve(y.view(), &layout);
        let k = self.opts.kraskov_k;
        layout.check_neighbour_count(k, theiler_t)?;

        if rows_non_finite(x.view(), 0..layout.n_points) || rows_non_finite(y.view(), 0..layout.n_points) {
            return Ok(Array1::from_elem(layout.n_points, f64::NAN));
        }
        let counts = self.neighbour_counts(x.view(), y.view(), theiler_t, 1)?;
        let constant = digamma(k as f64) + digamma(layout.n_points as f64);
        Ok(Array1::from_iter((0..layout.n_points).map(|i| {
            constant - digamma(counts.n_x[i] as f64 + 1.0) - digamma(counts.n_y[i] as f64 + 1.0)
        })))
    }
}

impl<B: NeighbourSearchBackend> LocalValues for KraskovMutualInformation<B> {
    fn local_values(&self, var1: ArrayView2<'_, f64>, var2: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        self.check_call(var1, var2, 1)?;
        let mut x = var1.to_owned();
        let mut y = var2.to_owned();
        let mut rng = self.rng();
        add_noise(&mut x, self.opts.noise_level, &mut rng)?;
        add_noise(&mut y, self.opts.noise_level, &mut rng)?;
        self.local_prepared(x.view(), y.view())
    }
}

impl<B: NeighbourSearchBackend> MutualInformationEstimator for KraskovMutualInformation<B> {
    fn name(&self) -> &'static str {
        "kraskov"
    }

    fn supports_parallel(&self) -> bool {
        self.batched
    }

    fn estimate_in_place(
        &self,
        var1: &mut Array2<f64>,
        var2: &mut Array2<f64>,
        n_chunks: usize,
    ) -> Result<Vec<f64>> {
        self.check_call(var1.view(), var2.view(), n_chunks)?;
        let mut rng = self.rng();
        add_noise(var1, self.opts.noise_level, &mut rng)?;
        add_noise(var2, self.opts.noise_level, &mut rng)?;
        self.estimate_prepared(var1.view(), var2.view(), n_chunks)
    }
}

/// Batched Kraskov estimator on a GPU.
///
/// The device named by `gpuid` is opened for every call and released when the
/// call returns. Device failures are reported, never replaced by a CPU search.
#[derive(Debug, Clone)]
pub struct GpuKraskovMutualInformation {
    opts: EstimatorOptions,
}

impl GpuKraskovMutualInformation {
    pub fn new(opts: EstimatorOptions) -> Result<Self> {
        opts.validate()?;
        Ok(Self { opts })
    }

    pub fn options(&self) -> &EstimatorOptions {
        &self.opts
    }

    #[cfg(feature = "gpu_support")]
    fn with_device<T>(
        &self,
        f: impl FnOnce(&KraskovMutualInformation<&super::neighbours::GpuBackend>) -> Result<T>,
    ) -> Result<T> {
        let device = super::neighbours::GpuBackend::open(self.opts.gpuid)?;
        tracing::debug!(gpuid = self.opts.gpuid, adapter = device.adapter_name(), "opened GPU device");
        let estimator = KraskovMutualInformation::with_backend(&device, self.opts.clone())?;
        f(&estimator)
    }

    #[cfg(not(feature = "gpu_support"))]
    fn with_device<T>(&self, _f: impl FnOnce(&KraskovMutualInformation) -> Result<T>) -> Result<T> {
        Err(EstimatorError::backend(
            "gpu",
            "this build does not include the gpu_support feature",
        ))
    }
}

impl LocalValues for GpuKraskovMutualInformation {
    fn local_values(&self, var1: ArrayView2<'_, f64>, var2: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        self.with_device(|estimator| estimator.local_values(var1, var2))
    }
}

impl MutualInformationEstimator for GpuKraskovMutualInformation {
    fn name(&self) -> &'static str {
        "gpu_kraskov"
    }

    fn supports_parallel(&self) -> bool {
        true
    }

    fn estimate_in_place(
        &self,
        var1: &mut Array2<f64>,
        var2: &mut Array2<f64>,
        n_chunks: usize,
    ) -> Result<Vec<f64>> {
        self.with_device(|estimator| estimator.estimate_in_place(var1, var2, n_chunks))
    }
}
