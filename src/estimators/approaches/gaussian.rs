// SPDX-FileCopyrightText: 2025-2026 Carlson Büth <code@cbueth.de>
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mutual information under a joint Gaussian model.
//!
//! I = 1/2 * ln( det(S_x) * det(S_y) / det(S_xy) )
//!
//! with sample covariances (ddof = 1). Log-determinants and Mahalanobis
//! distances come from a Cholesky factorisation; a covariance that is not
//! positive definite (collinear columns, constant data, non-finite samples)
//! gives `NaN`.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use ndarray_stats::CorrelationExt;

use crate::error::{EstimatorError, Result};
use crate::estimators::approaches::common_nd::dataset::{check_paired, joint_space, lagged};
use crate::estimators::options::EstimatorOptions;
use crate::estimators::traits::{LocalValues, MutualInformationEstimator, require_single_chunk};

/// Fitted Gaussian: mean and lower Cholesky factor of the covariance.
struct GaussianFit {
    mean: Array1<f64>,
    chol: Array2<f64>,
}

impl GaussianFit {
    /// `None` when the sample covariance is not positive definite.
    fn new(data: ArrayView2<'_, f64>) -> Option<Self> {
        if data.nrows() < 2 {
            return None;
        }
        let mean = data.mean_axis(Axis(0))?;
        let cov = data.t().cov(1.0).ok()?;
        let chol = cholesky(&cov)?;
        Some(Self { mean, chol })
    }

    fn ln_det(&self) -> f64 {
        2.0 * self.chol.diag().iter().map(|d| d.ln()).sum::<f64>()
    }

    /// Squared Mahalanobis distance of `x` from the mean.
    fn mahalanobis_sq(&self, x: ArrayView1<'_, f64>) -> f64 {
        let centred = &x - &self.mean;
        forward_substitute(&self.chol, centred.view())
            .iter()
            .map(|z| z * z)
            .sum()
    }
}

/// Lower Cholesky factor `L` with `L L^T = a`, or `None` if `a` is not positive definite.
fn cholesky(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));
    for j in 0..n {
        let mut pivot = a[[j, j]];
        for p in 0..j {
            pivot -= l[[j, p]] * l[[j, p]];
        }
        // also catches NaN
        if !(pivot > 0.0) {
            return None;
        }
        let d = pivot.sqrt();
        l[[j, j]] = d;
        for i in j + 1..n {
            let mut s = a[[i, j]];
            for p in 0..j {
                s -= l[[i, p]] * l[[j, p]];
            }
            l[[i, j]] = s / d;
        }
    }
    Some(l)
}

/// Solve `L z = b` for lower-triangular `L`.
fn forward_substitute(l: &Array2<f64>, b: ArrayView1<'_, f64>) -> Array1<f64> {
    let n = b.len();
    let mut z = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut s = b[i];
        for p in 0..i {
            s -= l[[i, p]] * z[p];
        }
        z[i] = s / l[[i, i]];
    }
    z
}

/// Linear-Gaussian MI estimator. Serial: one problem per call.
#[derive(Debug, Clone)]
pub struct GaussianMutualInformation {
    opts: EstimatorOptions,
}

impl GaussianMutualInformation {
    pub fn new(opts: EstimatorOptions) -> Result<Self> {
        opts.validate()?;
        Ok(Self { opts })
    }

    fn fits(
        &self,
        var1: ArrayView2<'_, f64>,
        var2: ArrayView2<'_, f64>,
    ) -> Result<Option<(GaussianFit, GaussianFit, GaussianFit)>> {
        check_paired(var1, var2)?;
        let (x, y) = lagged(var1, var2, self.opts.lag)?;
        if x.nrows() < 2 {
            return Err(EstimatorError::dims(format!(
                "the Gaussian estimator needs at least 2 samples, got {}",
                x.nrows()
            )));
        }
        let joint = joint_space(x, y)?;
        let fits = GaussianFit::new(x)
            .zip(GaussianFit::new(y))
            .zip(GaussianFit::new(joint.view()))
            .map(|((fx, fy), fxy)| (fx, fy, fxy));
        if fits.is_none() {
            tracing::debug!("covariance not positive definite, Gaussian MI is NaN");
        }
        Ok(fits)
    }
}

impl LocalValues for GaussianMutualInformation {
    fn local_values(&self, var1: ArrayView2<'_, f64>, var2: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        let n = var1.nrows().saturating_sub(self.opts.lag);
        let Some((fx, fy, fxy)) = self.fits(var1, var2)? else {
            return Ok(Array1::from_elem(n, f64::NAN));
        };
        let (x, y) = lagged(var1, var2, self.opts.lag)?;
        let joint = joint_space(x, y)?;
        let offset = 0.5 * (fx.ln_det() + fy.ln_det() - fxy.ln_det());
        Ok(Array1::from_iter((0..n).map(|i| {
            offset
                + 0.5
                    * (fx.mahalanobis_sq(x.row(i)) + fy.mahalanobis_sq(y.row(i))
                        - fxy.mahalanobis_sq(joint.row(i)))
        })))
    }
}

impl MutualInformationEstimator for GaussianMutualInformation {
    fn name(&self) -> &'static str {
        "gaussian"
    }

    fn supports_parallel(&self) -> bool {
        false
    }

    fn estimate_in_place(
        &self,
        var1: &mut Array2<f64>,
        var2: &mut Array2<f64>,
        n_chunks: usize,
    ) -> Result<Vec<f64>> {
        self.estimate(var1.view(), var2.view(), n_chunks)
    }

    fn estimate(
        &self,
        var1: ArrayView2<'_, f64>,
        var2: ArrayView2<'_, f64>,
        n_chunks: usize,
    ) -> Result<Vec<f64>> {
        require_single_chunk(self.name(), n_chunks)?;
        let mi = match self.fits(var1, var2)? {
            Some((fx, fy, fxy)) => 0.5 * (fx.ln_det() + fy.ln_det() - fxy.ln_det()),
            None => f64::NAN,
        };
        tracing::trace!(mi, "gaussian estimate");
        Ok(vec![mi])
    }
}
