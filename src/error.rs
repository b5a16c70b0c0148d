// SPDX-FileCopyrightText: 2025-2026 Carlson Büth <code@cbueth.de>
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the estimation core.
//!
//! Every fallible operation returns [`Result`]. Errors are surfaced to the
//! direct caller as-is; nothing in this crate retries or falls back to another
//! estimator or backend. A `NaN` estimate is a valid outcome and never an error.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EstimatorError {
    /// Malformed options mapping or an option value outside its domain.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A chunk is too small for the requested neighbour count after Theiler exclusion.
    #[error(
        "Insufficient samples: k = {k} needs more than {k} candidates per point, \
         but chunks of {chunk_size} samples with theiler_t = {theiler_t} do not provide them"
    )]
    InsufficientSamples {
        k: usize,
        theiler_t: usize,
        chunk_size: usize,
    },

    /// Failure reported by a neighbour-search backend (driver, memory, kernel compile).
    #[error("{backend} backend error: {message}")]
    DeviceOrBackendError {
        backend: &'static str,
        message: String,
    },

    /// Sample counts differ, or the chunk count does not divide the sample count.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),
}

impl EstimatorError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        EstimatorError::InvalidConfiguration(msg.into())
    }

    pub(crate) fn dims(msg: impl Into<String>) -> Self {
        EstimatorError::DimensionMismatch(msg.into())
    }

    pub(crate) fn backend(backend: &'static str, message: impl ToString) -> Self {
        EstimatorError::DeviceOrBackendError {
            backend,
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EstimatorError>;
