// SPDX-FileCopyrightText: 2025-2026 Carlson Büth <code@cbueth.de>
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # kraskov
//!
//! Nearest-neighbour mutual information estimation with batched neighbour search.
//!
//! ## Quick Start
//!
//! ```rust
//! use kraskov::estimators::{EstimatorOptions, MutualInformation, MutualInformationEstimator};
//! use ndarray::Array2;
//!
//! let x = Array2::from_shape_fn((200, 1), |(i, _)| (i as f64 * 0.37).sin());
//! let y = Array2::from_shape_fn((200, 1), |(i, _)| (i as f64 * 0.37).sin() + 0.1 * (i as f64).cos());
//!
//! let opts = EstimatorOptions::default().with_k(4).with_seed(7);
//! let estimator = MutualInformation::new_kraskov(opts).unwrap();
//! let mi = estimator.estimate(x.view(), y.view(), 1).unwrap();
//! assert_eq!(mi.len(), 1);
//! ```
//!
//! Many independent problems of equal length can be stacked along the sample
//! axis and estimated in one call by splitting it into `n_chunks` chunks:
//!
//! ```rust
//! use kraskov::estimators::{EstimatorOptions, MutualInformation, MutualInformationEstimator};
//! use kraskov::estimators::approaches::neighbours::KdTreeBackend;
//! use ndarray::Array2;
//!
//! let x = Array2::from_shape_fn((400, 1), |(i, _)| (i as f64 * 0.37).sin());
//! let y = Array2::from_shape_fn((400, 1), |(i, _)| (i as f64 * 0.11).cos());
//!
//! let estimator =
//!     MutualInformation::new_kraskov_with_backend(KdTreeBackend::new(), EstimatorOptions::default())
//!         .unwrap();
//! let per_chunk = estimator.estimate(x.view(), y.view(), 4).unwrap();
//! assert_eq!(per_chunk.len(), 4);
//! ```
//!
//! ## Estimators
//!
//! | Name | Method | Chunks per call |
//! |------|--------|-----------------|
//! | `gpu_kraskov` | Kraskov type 1, GPU neighbour search | many |
//! | `kraskov` | Kraskov type 1, KD-tree neighbour search | one |
//! | `gaussian` | Linear-Gaussian model | one |
//! | `discrete` | Plug-in estimate on discrete symbols | one |
//!
//! Estimators are looked up by name through [`estimators::registry`], which
//! also reports whether a name supports batched (parallel) chunk evaluation.
//!
//! ## Architecture
//!
//! 1. **Public API Layer**: [`estimators::MutualInformation`] factory and the name registry
//! 2. **Estimation Approaches**: Kraskov, Gaussian and discrete estimators
//! 3. **Neighbour Search**: Chebyshev KNN and range search with Theiler window and chunking,
//!    on brute-force, KD-tree and GPU backends
//! 4. **Core Infrastructure**: options, errors, shared traits and data helpers
//!
//! ## Feature Flags
//!
//! - `gpu_support`: Enable the `wgpu` neighbour-search backend used by `gpu_kraskov`
//!
//! ## Logging
//!
//! Diagnostics are emitted through [`tracing`]. Install any subscriber to see
//! them; without one they are discarded.

pub mod error;
pub mod estimators;

pub use error::{EstimatorError, Result};
