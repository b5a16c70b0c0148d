// SPDX-FileCopyrightText: 2025-2026 Carlson Büth <code@cbueth.de>
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use ndarray::{Array1, Array2, ArrayView2};

use crate::error::{EstimatorError, Result};

/// Per-sample (local) mutual information values.
pub trait LocalValues {
    /// Compute the local values of the measure for a single estimation problem.
    fn local_values(&self, var1: ArrayView2<'_, f64>, var2: ArrayView2<'_, f64>) -> Result<Array1<f64>>;

    /// Derive the global value as the mean of the local values.
    fn global_from_local(&self, var1: ArrayView2<'_, f64>, var2: ArrayView2<'_, f64>) -> Result<f64> {
        let local_vals = self.local_values(var1, var2)?;
        local_vals
            .mean()
            .ok_or_else(|| EstimatorError::dims("no samples left to average"))
    }
}

/// Interface for estimators of Mutual Information $I(X; Y)$ between two paired realisations.
///
/// `var1` and `var2` are realisations x dimension matrices with the same number
/// of rows. The sample axis is split into `n_chunks` equal, independent chunks
/// and one estimate (in nats) is returned per chunk. `NaN` marks a degenerate
/// chunk and is a valid result.
pub trait MutualInformationEstimator: LocalValues {
    /// Registry name of the estimator.
    fn name(&self) -> &'static str;

    /// Whether many chunks are estimated in one batched call.
    fn supports_parallel(&self) -> bool;

    /// Estimate MI per chunk, perturbing the caller's arrays in place.
    ///
    /// Estimators that add tie-breaking noise write it into `var1` and `var2`.
    /// Use [`estimate`](Self::estimate) to leave the inputs untouched.
    fn estimate_in_place(
        &self,
        var1: &mut Array2<f64>,
        var2: &mut Array2<f64>,
        n_chunks: usize,
    ) -> Result<Vec<f64>>;

    /// Estimate MI per chunk on private copies of the inputs.
    fn estimate(
        &self,
        var1: ArrayView2<'_, f64>,
        var2: ArrayView2<'_, f64>,
        n_chunks: usize,
    ) -> Result<Vec<f64>> {
        let mut var1 = var1.to_owned();
        let mut var2 = var2.to_owned();
        self.estimate_in_place(&mut var1, &mut var2, n_chunks)
    }

    /// Estimate MI over all samples as a single problem.
    fn global_value(&self, var1: ArrayView2<'_, f64>, var2: ArrayView2<'_, f64>) -> Result<f64> {
        let values = self.estimate(var1, var2, 1)?;
        values
            .first()
            .copied()
            .ok_or_else(|| EstimatorError::dims("estimator returned no chunk values"))
    }
}

impl<E: MutualInformationEstimator + ?Sized> LocalValues for Box<E> {
    fn local_values(&self, var1: ArrayView2<'_, f64>, var2: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        (**self).local_values(var1, var2)
    }
}

impl<E: MutualInformationEstimator + ?Sized> MutualInformationEstimator for Box<E> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn supports_parallel(&self) -> bool {
        (**self).supports_parallel()
    }

    fn estimate_in_place(
        &self,
        var1: &mut Array2<f64>,
        var2: &mut Array2<f64>,
        n_chunks: usize,
    ) -> Result<Vec<f64>> {
        (**self).estimate_in_place(var1, var2, n_chunks)
    }

    fn estimate(
        &self,
        var1: ArrayView2<'_, f64>,
        var2: ArrayView2<'_, f64>,
        n_chunks: usize,
    ) -> Result<Vec<f64>> {
        (**self).estimate(var1, var2, n_chunks)
    }
}

/// Serial estimators solve exactly one problem per call.
pub(crate) fn require_single_chunk(name: &str, n_chunks: usize) -> Result<()> {
    if n_chunks != 1 {
        return Err(EstimatorError::config(format!(
            "estimator {name} is serial and estimates one chunk per call, got n_chunks = {n_chunks}"
        )));
    }
    Ok(())
}
