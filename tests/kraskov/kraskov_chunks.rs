// SPDX-FileCopyrightText: 2025-2026 Carlson Büth <code@cbueth.de>
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use approx::assert_abs_diff_eq;
use ndarray::Array2;
use rstest::rstest;

use kraskov::EstimatorError;
use kraskov::estimators::approaches::neighbours::{BruteForceBackend, KdTreeBackend};
use kraskov::estimators::utils::autocorrelation::max_autocorrelation_time;
use kraskov::estimators::{
    EstimatorOptions, MutualInformation, MutualInformationEstimator, TheilerWindow,
};

use crate::test_helpers::{generate_correlated_pair, stack_chunks};

fn exact() -> EstimatorOptions {
    EstimatorOptions::default().with_noise_level(0.0)
}

#[rstest]
fn chunked_call_equals_separate_calls(#[values(0, 3)] theiler_t: usize) {
    let opts = exact().with_theiler(TheilerWindow::Fixed(theiler_t));
    let problems: Vec<_> = [0.0, 0.6, 0.9]
        .iter()
        .enumerate()
        .map(|(c, &rho)| generate_correlated_pair(250, rho, 30 + c as u64))
        .collect();
    let xs: Vec<_> = problems.iter().map(|(x, _)| x.clone()).collect();
    let ys: Vec<_> = problems.iter().map(|(_, y)| y.clone()).collect();
    let x = stack_chunks(&xs);
    let y = stack_chunks(&ys);

    let batched = MutualInformation::new_kraskov_with_backend(KdTreeBackend::new(), opts.clone()).unwrap();
    let serial = MutualInformation::new_kraskov(opts).unwrap();

    let per_chunk = batched.estimate(x.view(), y.view(), 3).unwrap();
    assert_eq!(per_chunk.len(), 3);
    for (c, (xc, yc)) in problems.iter().enumerate() {
        let single = serial.estimate(xc.view(), yc.view(), 1).unwrap();
        assert_eq!(per_chunk[c], single[0], "chunk {c}");
    }
    // more dependence, more information
    assert!(per_chunk[0] < per_chunk[1] && per_chunk[1] < per_chunk[2]);
}

#[test]
fn backends_agree_on_chunked_estimates() {
    let (x, y) = generate_correlated_pair(600, 0.5, 2);
    let kd = MutualInformation::new_kraskov_with_backend(KdTreeBackend::new(), exact()).unwrap();
    let bf = MutualInformation::new_kraskov_with_backend(BruteForceBackend::new(), exact()).unwrap();
    assert_eq!(
        kd.estimate(x.view(), y.view(), 6).unwrap(),
        bf.estimate(x.view(), y.view(), 6).unwrap()
    );
}

#[test]
fn one_degenerate_chunk_does_not_spoil_the_batch() {
    let (mut x, y) = generate_correlated_pair(400, 0.5, 3);
    x[[350, 0]] = f64::NAN;
    let est = MutualInformation::new_kraskov_with_backend(KdTreeBackend::new(), exact()).unwrap();
    let mi = est.estimate(x.view(), y.view(), 4).unwrap();
    assert!(mi[..3].iter().all(|v| v.is_finite()));
    assert!(mi[3].is_nan());
}

#[rstest]
#[case(7, false)]
#[case(0, true)]
fn invalid_chunk_counts(#[case] n_chunks: usize, #[case] is_config_error: bool) {
    let (x, y) = generate_correlated_pair(100, 0.5, 3);
    let est = MutualInformation::new_kraskov_with_backend(KdTreeBackend::new(), exact()).unwrap();
    let err = est.estimate(x.view(), y.view(), n_chunks).unwrap_err();
    if is_config_error {
        assert!(matches!(err, EstimatorError::InvalidConfiguration(_)));
    } else {
        assert!(matches!(err, EstimatorError::DimensionMismatch(_)));
    }
}

#[test]
fn serial_kraskov_rejects_batches() {
    let (x, y) = generate_correlated_pair(100, 0.5, 3);
    let est = MutualInformation::new_kraskov(exact()).unwrap();
    assert!(!est.supports_parallel());
    assert!(matches!(
        est.estimate(x.view(), y.view(), 2),
        Err(EstimatorError::InvalidConfiguration(_))
    ));
}

#[test]
fn normalised_chunks_equal_separate_calls() {
    let problems: Vec<_> = [(0.3, 1.0), (0.8, 400.0)]
        .iter()
        .enumerate()
        .map(|(c, &(rho, scale))| {
            let (x, y) = generate_correlated_pair(200, rho, 60 + c as u64);
            (x * scale, y)
        })
        .collect();
    let xs: Vec<_> = problems.iter().map(|(x, _)| x.clone()).collect();
    let ys: Vec<_> = problems.iter().map(|(_, y)| y.clone()).collect();
    let mut x = stack_chunks(&xs);
    let y = stack_chunks(&ys);

    let opts = exact().with_normalise(true);
    let batched = MutualInformation::new_kraskov_with_backend(KdTreeBackend::new(), opts.clone()).unwrap();
    let serial = MutualInformation::new_kraskov(opts).unwrap();

    let per_chunk = batched.estimate(x.view(), y.view(), 2).unwrap();
    for (c, (xc, yc)) in problems.iter().enumerate() {
        let single = serial.estimate(xc.view(), yc.view(), 1).unwrap();
        assert_abs_diff_eq!(per_chunk[c], single[0], epsilon = 1e-12);
    }

    x[[399, 0]] = f64::NAN;
    let spoiled = batched.estimate(x.view(), y.view(), 2).unwrap();
    assert_abs_diff_eq!(spoiled[0], per_chunk[0], epsilon = 1e-12);
    assert!(spoiled[1].is_nan());
}

#[test]
fn act_window_is_shared_by_all_chunks() {
    let n = 300;
    let smooth_x = Array2::from_shape_fn((n, 1), |(i, _)| (i as f64 / 12.0).sin());
    let smooth_y = Array2::from_shape_fn((n, 1), |(i, _)| (i as f64 / 12.0).cos());
    let (noisy_x, noisy_y) = generate_correlated_pair(n, 0.5, 77);

    let window = max_autocorrelation_time(smooth_y.view()).max(max_autocorrelation_time(noisy_y.view()));
    assert!(window > 1);

    let act = exact().with_theiler(TheilerWindow::AutocorrelationTime);
    let fixed = exact().with_theiler(TheilerWindow::Fixed(window));
    let batched_act = MutualInformation::new_kraskov_with_backend(KdTreeBackend::new(), act).unwrap();
    let serial_fixed = MutualInformation::new_kraskov(fixed).unwrap();

    let x = stack_chunks(&[smooth_x.clone(), noisy_x.clone()]);
    let y = stack_chunks(&[smooth_y.clone(), noisy_y.clone()]);
    let per_chunk = batched_act.estimate(x.view(), y.view(), 2).unwrap();
    assert_eq!(per_chunk[0], serial_fixed.estimate(smooth_x.view(), smooth_y.view(), 1).unwrap()[0]);
    assert_eq!(per_chunk[1], serial_fixed.estimate(noisy_x.view(), noisy_y.view(), 1).unwrap()[0]);

    // the window ignores the seam, so the chunk order does not matter
    let x = stack_chunks(&[noisy_x, smooth_x]);
    let y = stack_chunks(&[noisy_y, smooth_y]);
    let swapped = batched_act.estimate(x.view(), y.view(), 2).unwrap();
    assert_eq!(swapped, vec![per_chunk[1], per_chunk[0]]);
}
