// SPDX-FileCopyrightText: 2025-2026 Carlson Büth <code@cbueth.de>
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use ndarray::{ArrayView1, ArrayView2, Axis};

/// Sample autocorrelation of `x` at `lag`, normalised by the lag-0 variance.
///
/// Returns `None` for constant or non-finite series and for lags outside the series.
pub fn autocorrelation(x: ArrayView1<'_, f64>, lag: usize) -> Option<f64> {
    let n = x.len();
    if lag >= n {
        return None;
    }
    let mean = x.mean()?;
    let var: f64 = x.iter().map(|v| (v - mean).powi(2)).sum();
    if var <= 0.0 || !var.is_finite() {
        return None;
    }
    let cov: f64 = (0..n - lag)
        .map(|t| (x[t] - mean) * (x[t + lag] - mean))
        .sum();
    Some(cov / var)
}

/// Autocorrelation time: first lag at which the autocorrelation drops below `1/e`.
///
/// Series that never decorrelate get `n - 1`; constant series get 0.
pub fn autocorrelation_time(x: ArrayView1<'_, f64>) -> usize {
    let n = x.len();
    if n < 2 {
        return 0;
    }
    let threshold = (-1.0f64).exp();
    for lag in 1..n {
        match autocorrelation(x, lag) {
            Some(r) if r < threshold => return lag,
            Some(_) => {}
            None => return 0,
        }
    }
    n - 1
}

/// Largest autocorrelation time over the columns of a realisation matrix.
pub fn max_autocorrelation_time(data: ArrayView2<'_, f64>) -> usize {
    data.axis_iter(Axis(1))
        .map(autocorrelation_time)
        .max()
        .unwrap_or(0)
}
