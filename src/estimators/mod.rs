// SPDX-FileCopyrightText: 2025-2026 Carlson Büth <code@cbueth.de>
//
// SPDX-License-Identifier: MIT OR Apache-2.0

pub mod approaches;
pub mod mutual_information;
pub mod options;
pub mod registry;
pub mod traits;
pub mod utils;

pub use mutual_information::MutualInformation;
pub use options::{EstimatorOptions, TheilerWindow};
pub use registry::{EstimatorKind, Resolved, resolve};
pub use traits::{LocalValues, MutualInformationEstimator};
