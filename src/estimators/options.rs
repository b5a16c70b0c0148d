// SPDX-FileCopyrightText: 2025-2026 Carlson Büth <code@cbueth.de>
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Estimator configuration.
//!
//! Options arrive either as a typed [`EstimatorOptions`] or as a JSON-like
//! mapping (`serde_json::Value`) shared with higher-level analysis settings.
//! Unknown keys in a mapping are ignored; keys this crate recognises must carry
//! values of the right type, otherwise [`EstimatorError::InvalidConfiguration`]
//! is returned before any computation starts.
//!
//! | key | meaning | default |
//! |-----|---------|---------|
//! | `kraskov_k` (or `k`) | neighbour count | 4 |
//! | `theiler_t` | Theiler window, integer or `"act"` | 0 |
//! | `noise_level` | std-dev of the tie-breaking noise, 0 disables | 1e-8 |
//! | `seed` | seed for the noise generator | entropy |
//! | `gpuid` | index of the GPU adapter | 0 |
//! | `normalise` | z-standardise every column of every chunk | false |
//! | `lag` | MI between `var1[t]` and `var2[t + lag]` | 0 |
//! | `num_discrete_bins` | alphabet size of discrete data | 2 |

use ndarray::{ArrayView2, s};
use serde::{Deserialize, Serialize};

use crate::error::{EstimatorError, Result};
use crate::estimators::approaches::common_nd::dataset::ChunkLayout;
use crate::estimators::utils::autocorrelation::max_autocorrelation_time;

/// Temporal exclusion window for neighbour searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTheiler", into = "RawTheiler")]
pub enum TheilerWindow {
    /// Exclude candidates within this many samples of the query.
    Fixed(usize),
    /// Use the autocorrelation time of the target variable.
    AutocorrelationTime,
}

impl Default for TheilerWindow {
    fn default() -> Self {
        TheilerWindow::Fixed(0)
    }
}

impl TheilerWindow {
    /// Concrete window for a call, given the target realisations.
    ///
    /// The autocorrelation time is measured inside every chunk on its own and
    /// the largest one is used for the whole call, so no chunk sees the
    /// samples of another or the seams between them.
    pub fn resolve(&self, target: ArrayView2<'_, f64>, layout: &ChunkLayout) -> usize {
        match *self {
            TheilerWindow::Fixed(t) => t,
            TheilerWindow::AutocorrelationTime => {
                let t = layout
                    .ranges()
                    .map(|rows| max_autocorrelation_time(target.slice(s![rows, ..])))
                    .max()
                    .unwrap_or(0);
                tracing::debug!(theiler_t = t, "Theiler window from autocorrelation time");
                t
            }
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawTheiler {
    Window(usize),
    Rule(String),
}

impl TryFrom<RawTheiler> for TheilerWindow {
    type Error = String;

    fn try_from(raw: RawTheiler) -> std::result::Result<Self, Self::Error> {
        match raw {
            RawTheiler::Window(t) => Ok(TheilerWindow::Fixed(t)),
            RawTheiler::Rule(s) if s.eq_ignore_ascii_case("act") => {
                Ok(TheilerWindow::AutocorrelationTime)
            }
            RawTheiler::Rule(s) => Err(format!(
                "theiler_t must be a non-negative integer or \"act\", got {s:?}"
            )),
        }
    }
}

impl From<TheilerWindow> for RawTheiler {
    fn from(w: TheilerWindow) -> Self {
        match w {
            TheilerWindow::Fixed(t) => RawTheiler::Window(t),
            TheilerWindow::AutocorrelationTime => RawTheiler::Rule("act".to_string()),
        }
    }
}

/// Options recognised by the estimators in this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorOptions {
    #[serde(alias = "k")]
    pub kraskov_k: usize,
    pub theiler_t: TheilerWindow,
    pub noise_level: f64,
    pub seed: Option<u64>,
    pub gpuid: usize,
    /// Z-standardise each column within each chunk before the neighbour searches.
    ///
    /// The tie-breaking noise is added to the raw data first, because
    /// `estimate_in_place` writes it into the caller's arrays. Its size relative
    /// to the normalised data is therefore `noise_level / std` of each column,
    /// not `noise_level` itself as when noise is added after normalising.
    pub normalise: bool,
    pub lag: usize,
    pub num_discrete_bins: usize,
}

impl Default for EstimatorOptions {
    fn default() -> Self {
        Self {
            kraskov_k: 4,
            theiler_t: TheilerWindow::default(),
            noise_level: 1e-8,
            seed: None,
            gpuid: 0,
            normalise: false,
            lag: 0,
            num_discrete_bins: 2,
        }
    }
}

impl EstimatorOptions {
    /// Parse and validate an options mapping. `Null` yields the defaults.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let opts: Self = match value {
            serde_json::Value::Null => Self::default(),
            serde_json::Value::Object(_) => serde_json::from_value(value)
                .map_err(|e| EstimatorError::config(e.to_string()))?,
            _ => return Err(EstimatorError::config("options should be a mapping")),
        };
        opts.validate()?;
        Ok(opts)
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.kraskov_k = k;
        self
    }

    pub fn with_theiler(mut self, theiler_t: TheilerWindow) -> Self {
        self.theiler_t = theiler_t;
        self
    }

    pub fn with_noise_level(mut self, noise_level: f64) -> Self {
        self.noise_level = noise_level;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_gpuid(mut self, gpuid: usize) -> Self {
        self.gpuid = gpuid;
        self
    }

    pub fn with_normalise(mut self, normalise: bool) -> Self {
        self.normalise = normalise;
        self
    }

    pub fn with_lag(mut self, lag: usize) -> Self {
        self.lag = lag;
        self
    }

    pub fn with_num_discrete_bins(mut self, bins: usize) -> Self {
        self.num_discrete_bins = bins;
        self
    }

    /// Check value domains.
    pub fn validate(&self) -> Result<()> {
        if self.kraskov_k == 0 {
            return Err(EstimatorError::config("kraskov_k must be >= 1"));
        }
        if !self.noise_level.is_finite() || self.noise_level < 0.0 {
            return Err(EstimatorError::config(format!(
                "noise_level must be finite and >= 0, got {}",
                self.noise_level
            )));
        }
        if self.num_discrete_bins < 2 {
            return Err(EstimatorError::config("num_discrete_bins must be >= 2"));
        }
        Ok(())
    }
}
