// SPDX-FileCopyrightText: 2025-2026 Carlson Büth <code@cbueth.de>
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::error::Result;
use crate::estimators::approaches::discrete::DiscreteMutualInformation;
use crate::estimators::approaches::gaussian::GaussianMutualInformation;
use crate::estimators::approaches::kraskov::{GpuKraskovMutualInformation, KraskovMutualInformation};
use crate::estimators::approaches::neighbours::NeighbourSearchBackend;
use crate::estimators::options::EstimatorOptions;
use crate::estimators::registry::EstimatorKind;
use crate::estimators::traits::MutualInformationEstimator;

/// Factory for mutual information estimators.
pub struct MutualInformation;

impl MutualInformation {
    /// Serial Kraskov estimator on the KD-tree backend.
    pub fn new_kraskov(opts: EstimatorOptions) -> Result<KraskovMutualInformation> {
        KraskovMutualInformation::new(opts)
    }

    /// Batched Kraskov estimator on a caller-supplied backend.
    pub fn new_kraskov_with_backend<B: NeighbourSearchBackend>(
        backend: B,
        opts: EstimatorOptions,
    ) -> Result<KraskovMutualInformation<B>> {
        KraskovMutualInformation::with_backend(backend, opts)
    }

    pub fn new_gpu_kraskov(opts: EstimatorOptions) -> Result<GpuKraskovMutualInformation> {
        GpuKraskovMutualInformation::new(opts)
    }

    pub fn new_gaussian(opts: EstimatorOptions) -> Result<GaussianMutualInformation> {
        GaussianMutualInformation::new(opts)
    }

    pub fn new_discrete(opts: EstimatorOptions) -> Result<DiscreteMutualInformation> {
        DiscreteMutualInformation::new(opts)
    }

    /// Build a registered estimator from its name and an options mapping.
    pub fn from_name(name: &str, opts: serde_json::Value) -> Result<Box<dyn MutualInformationEstimator>> {
        let kind: EstimatorKind = name.parse()?;
        let opts = EstimatorOptions::from_value(opts)?;
        tracing::debug!(estimator = %kind, ?opts, "building estimator");
        kind.build(&opts)
    }
}
