// SPDX-FileCopyrightText: 2025-2026 Carlson Büth <code@cbueth.de>
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Name-based estimator lookup.
//!
//! The registry is a closed, compile-time table. Whether an estimator batches
//! many chunks per call is a static fact of its name and is known before any
//! instance exists, so schedulers can plan their calls up front.

use std::fmt;
use std::str::FromStr;

use crate::error::{EstimatorError, Result};
use crate::estimators::approaches::discrete::DiscreteMutualInformation;
use crate::estimators::approaches::gaussian::GaussianMutualInformation;
use crate::estimators::approaches::kraskov::{GpuKraskovMutualInformation, KraskovMutualInformation};
use crate::estimators::options::EstimatorOptions;
use crate::estimators::traits::MutualInformationEstimator;

/// Every estimator that can be selected by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EstimatorKind {
    /// Kraskov type 1 on the GPU, many chunks per call.
    GpuKraskov,
    /// Kraskov type 1 on an in-process KD-tree.
    Kraskov,
    /// Linear-Gaussian model.
    Gaussian,
    /// Plug-in estimator for discrete symbols.
    Discrete,
}

/// Static registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EstimatorDescriptor {
    pub name: &'static str,
    pub kind: EstimatorKind,
    pub supports_parallel: bool,
}

pub const ESTIMATORS: &[EstimatorDescriptor] = &[
    EstimatorDescriptor {
        name: "gpu_kraskov",
        kind: EstimatorKind::GpuKraskov,
        supports_parallel: true,
    },
    EstimatorDescriptor {
        name: "kraskov",
        kind: EstimatorKind::Kraskov,
        supports_parallel: false,
    },
    EstimatorDescriptor {
        name: "gaussian",
        kind: EstimatorKind::Gaussian,
        supports_parallel: false,
    },
    EstimatorDescriptor {
        name: "discrete",
        kind: EstimatorKind::Discrete,
        supports_parallel: false,
    },
];

impl EstimatorKind {
    fn descriptor(self) -> &'static EstimatorDescriptor {
        // every variant has exactly one entry in ESTIMATORS
        match self {
            EstimatorKind::GpuKraskov => &ESTIMATORS[0],
            EstimatorKind::Kraskov => &ESTIMATORS[1],
            EstimatorKind::Gaussian => &ESTIMATORS[2],
            EstimatorKind::Discrete => &ESTIMATORS[3],
        }
    }

    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    pub fn supports_parallel(self) -> bool {
        self.descriptor().supports_parallel
    }

    /// Instantiate the estimator with validated options.
    pub fn build(self, opts: &EstimatorOptions) -> Result<Box<dyn MutualInformationEstimator>> {
        Ok(match self {
            EstimatorKind::GpuKraskov => Box::new(GpuKraskovMutualInformation::new(opts.clone())?),
            EstimatorKind::Kraskov => Box::new(KraskovMutualInformation::new(opts.clone())?),
            EstimatorKind::Gaussian => Box::new(GaussianMutualInformation::new(opts.clone())?),
            EstimatorKind::Discrete => Box::new(DiscreteMutualInformation::new(opts.clone())?),
        })
    }
}

impl fmt::Display for EstimatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EstimatorKind {
    type Err = EstimatorError;

    fn from_str(name: &str) -> Result<Self> {
        ESTIMATORS
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.kind)
            .ok_or_else(|| {
                EstimatorError::config(format!(
                    "unknown estimator {name:?}, expected one of: {}",
                    known_names().join(", ")
                ))
            })
    }
}

/// Outcome of a registry lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    pub kind: Option<EstimatorKind>,
    pub supports_parallel: bool,
}

/// Look up an estimator by name.
///
/// Unknown names are not an error here: they resolve to no estimator with
/// `supports_parallel == false` and a warning is logged.
pub fn resolve(name: &str) -> Resolved {
    match name.parse::<EstimatorKind>() {
        Ok(kind) => Resolved {
            kind: Some(kind),
            supports_parallel: kind.supports_parallel(),
        },
        Err(err) => {
            tracing::warn!(estimator = name, "{err}");
            Resolved {
                kind: None,
                supports_parallel: false,
            }
        }
    }
}

/// `supports_parallel` of a name, `false` for unknown names.
pub fn is_parallel(name: &str) -> bool {
    resolve(name).supports_parallel
}

pub fn exists(name: &str) -> bool {
    ESTIMATORS.iter().any(|d| d.name == name)
}

pub fn known_names() -> Vec<&'static str> {
    ESTIMATORS.iter().map(|d| d.name).collect()
}
