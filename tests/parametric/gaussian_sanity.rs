// SPDX-FileCopyrightText: 2025-2026 Carlson Büth <code@cbueth.de>
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use approx::assert_abs_diff_eq;
use rstest::rstest;

use kraskov::estimators::{EstimatorOptions, LocalValues, MutualInformation, MutualInformationEstimator};

use crate::test_helpers::{gaussian_mi, generate_correlated_pair, generate_gaussian_data};

#[rstest]
#[case(0.0)]
#[case(0.5)]
#[case(0.9)]
fn matches_analytic_bivariate_normal(#[case] rho: f64) {
    let (x, y) = generate_correlated_pair(20_000, rho, 77);
    let est = MutualInformation::new_gaussian(EstimatorOptions::default()).unwrap();
    let mi = est.global_value(x.view(), y.view()).unwrap();
    assert_abs_diff_eq!(mi, gaussian_mi(rho), epsilon = 0.02);
}

#[test]
fn invariant_to_affine_rescaling() {
    let (x, y) = generate_correlated_pair(1000, 0.7, 4);
    let shifted = &x * 3.0 + 10.0;
    let est = MutualInformation::new_gaussian(EstimatorOptions::default()).unwrap();
    let a = est.global_value(x.view(), y.view()).unwrap();
    let b = est.global_value(shifted.view(), y.view()).unwrap();
    assert_abs_diff_eq!(a, b, epsilon = 1e-9);
}

#[test]
fn local_values_mean_equals_global() {
    let x = generate_gaussian_data(500, 2, 0.0, 1.0, 1);
    let (_, y) = generate_correlated_pair(500, 0.4, 2);
    let est = MutualInformation::new_gaussian(EstimatorOptions::default()).unwrap();
    let locals = est.local_values(x.view(), y.view()).unwrap();
    assert_eq!(locals.len(), 500);
    assert_abs_diff_eq!(
        locals.mean().unwrap(),
        est.global_value(x.view(), y.view()).unwrap(),
        epsilon = 1e-10
    );
}

#[test]
fn lag_recovers_delayed_coupling() {
    let (x, y) = generate_correlated_pair(5001, 0.8, 9);
    // y shifted one step into the future of x
    let delayed = y.slice(ndarray::s![..5000, ..]).to_owned();
    let mut target = ndarray::Array2::<f64>::zeros((5001, 1));
    target.slice_mut(ndarray::s![1.., ..]).assign(&delayed);
    let source = x.clone();

    let plain = MutualInformation::new_gaussian(EstimatorOptions::default()).unwrap();
    let lagged = MutualInformation::new_gaussian(EstimatorOptions::default().with_lag(1)).unwrap();
    let without = plain.global_value(source.view(), target.view()).unwrap();
    let with = lagged.global_value(source.view(), target.view()).unwrap();
    assert!(without < 0.05, "unlagged MI = {without}");
    assert_abs_diff_eq!(with, gaussian_mi(0.8), epsilon = 0.05);
}

#[test]
fn constant_input_is_nan_not_error() {
    let x = ndarray::Array2::<f64>::from_elem((50, 1), 2.0);
    let y = generate_gaussian_data(50, 1, 0.0, 1.0, 3);
    let est = MutualInformation::new_gaussian(EstimatorOptions::default()).unwrap();
    assert!(est.global_value(x.view(), y.view()).unwrap().is_nan());
}
