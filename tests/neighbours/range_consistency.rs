// SPDX-FileCopyrightText: 2025-2026 Carlson Büth <code@cbueth.de>
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use ndarray::{Array2, array};
use rstest::rstest;

use kraskov::EstimatorError;
use kraskov::estimators::approaches::neighbours::{
    BruteForceBackend, KdTreeBackend, NeighbourSearchBackend,
};

use crate::test_helpers::generate_random_nd_data;

/// With continuous data, exactly k - 1 eligible points are strictly closer than the k-th neighbour.
fn knn_radius_counts<B: NeighbourSearchBackend>(backend: B, theiler_t: usize, n_chunks: usize) {
    let data = generate_random_nd_data(200, 2, 5);
    let k = 4;
    let knn = backend.knn_search(data.view(), k, theiler_t, n_chunks).unwrap();
    let radii = knn.radii().to_vec();
    let counts = backend
        .range_search(data.view(), &radii, theiler_t, n_chunks)
        .unwrap();
    assert!(counts.iter().all(|&c| c == k - 1), "{}: {counts:?}", backend.name());
}

#[rstest]
fn range_counts_match_knn_radii(#[values(0, 2)] theiler_t: usize, #[values(1, 5)] n_chunks: usize) {
    knn_radius_counts(BruteForceBackend::new(), theiler_t, n_chunks);
    knn_radius_counts(KdTreeBackend::new(), theiler_t, n_chunks);
}

#[test]
fn range_count_is_strict_and_local_to_chunk() {
    // two chunks of three points on a line
    let data: Array2<f64> = array![[0.0], [1.0], [2.0], [0.0], [1.0], [2.0]];
    let radii = [1.0, 1.5, 2.5, 1.0, 1.5, 2.5];
    for backend in [&BruteForceBackend::new() as &dyn NeighbourSearchBackend, &KdTreeBackend::new()] {
        let counts = backend.range_search(data.view(), &radii, 0, 2).unwrap();
        assert_eq!(counts.to_vec(), vec![0, 2, 2, 0, 2, 2], "{}", backend.name());
    }
}

#[test]
fn nan_or_zero_radius_counts_nothing() {
    let data = generate_random_nd_data(10, 1, 3);
    let mut radii = vec![0.0; 10];
    radii[3] = f64::NAN;
    let counts = KdTreeBackend::new()
        .range_search(data.view(), &radii, 0, 1)
        .unwrap();
    assert!(counts.iter().all(|&c| c == 0));
}

#[test]
fn radii_length_must_match() {
    let data = generate_random_nd_data(10, 1, 3);
    assert!(matches!(
        BruteForceBackend::new().range_search(data.view(), &[1.0; 9], 0, 1),
        Err(EstimatorError::DimensionMismatch(_))
    ));
}
