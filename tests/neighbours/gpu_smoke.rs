// SPDX-FileCopyrightText: 2025-2026 Carlson Büth <code@cbueth.de>
//
// SPDX-License-Identifier: MIT OR Apache-2.0

#[cfg(feature = "gpu_support")]
use kraskov::estimators::approaches::neighbours::{GpuBackend, KdTreeBackend, NeighbourSearchBackend};
#[cfg(feature = "gpu_support")]
use kraskov::estimators::approaches::neighbours::gpu::MAX_GPU_K;
#[cfg(feature = "gpu_support")]
use kraskov::EstimatorError;
#[cfg(feature = "gpu_support")]
use crate::test_helpers::generate_gaussian_data;

#[test]
#[cfg(feature = "gpu_support")]
#[ignore = "requires a GPU adapter"]
fn gpu_knn_matches_cpu_within_f32() {
    let gpu = GpuBackend::open(0).expect("no GPU adapter");
    println!("Running on {}", gpu.adapter_name());
    let data = generate_gaussian_data(1024, 3, 0.0, 1.0, 7);
    let cpu = KdTreeBackend::new();

    let knn_gpu = gpu.knn_search(data.view(), 4, 2, 4).unwrap();
    let knn_cpu = cpu.knn_search(data.view(), 4, 2, 4).unwrap();
    for (a, b) in knn_gpu.distances.iter().zip(knn_cpu.distances.iter()) {
        assert!((a - b).abs() <= 1e-5 * b.max(1.0), "gpu {a} vs cpu {b}");
    }
    let chunk_size = 256;
    for ((r, i), &j) in knn_gpu.indices.indexed_iter() {
        assert_eq!(i / chunk_size, j / chunk_size, "rank {r} of {i} crossed a chunk");
        assert!(i.abs_diff(j) > 2);
    }

    // the GPU's own radii give k - 1 strictly closer points
    let radii = knn_gpu.radii().to_vec();
    let counts = gpu.range_search(data.view(), &radii, 2, 4).unwrap();
    assert!(counts.iter().all(|&c| c == 3));
}

#[test]
#[cfg(feature = "gpu_support")]
#[ignore = "requires a GPU adapter"]
fn gpu_rejects_large_k() {
    let gpu = GpuBackend::open(0).expect("no GPU adapter");
    let data = generate_gaussian_data(256, 1, 0.0, 1.0, 7);
    assert!(matches!(
        gpu.knn_search(data.view(), MAX_GPU_K + 1, 0, 1),
        Err(EstimatorError::InvalidConfiguration(_))
    ));
}

#[test]
#[cfg(feature = "gpu_support")]
fn gpu_missing_adapter_is_reported() {
    assert!(matches!(
        GpuBackend::open(usize::MAX),
        Err(EstimatorError::DeviceOrBackendError { .. })
    ));
}
