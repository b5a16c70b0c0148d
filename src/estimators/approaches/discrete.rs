// SPDX-FileCopyrightText: 2025-2026 Carlson Büth <code@cbueth.de>
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use ndarray::{Array1, Array2, ArrayView2};
use std::collections::{BTreeMap, HashMap};

use crate::error::{EstimatorError, Result};
use crate::estimators::approaches::common_nd::dataset::{check_paired, lagged};
use crate::estimators::options::EstimatorOptions;
use crate::estimators::traits::{LocalValues, MutualInformationEstimator, require_single_chunk};

/// Joint and marginal counts of the symbols two discrete series actually use.
///
/// Counting only observed symbols keeps memory proportional to the sample
/// count, whatever the declared alphabet size. Joint cells are ordered so the
/// plug-in sum is reproducible.
struct ContingencyTable {
    joint: BTreeMap<(usize, usize), usize>,
    x: HashMap<usize, usize>,
    y: HashMap<usize, usize>,
    n: usize,
}

impl ContingencyTable {
    fn new(x: &[usize], y: &[usize]) -> Self {
        let mut joint = BTreeMap::new();
        let mut cx = HashMap::new();
        let mut cy = HashMap::new();
        for (&a, &b) in x.iter().zip(y) {
            *joint.entry((a, b)).or_insert(0) += 1;
            *cx.entry(a).or_insert(0) += 1;
            *cy.entry(b).or_insert(0) += 1;
        }
        Self {
            joint,
            x: cx,
            y: cy,
            n: x.len(),
        }
    }

    /// ln( p(a, b) / (p(a) p(b)) ) for an observed pair.
    fn local(&self, a: usize, b: usize) -> f64 {
        let n = self.n as f64;
        let count = |map: &HashMap<usize, usize>, s: usize| map.get(&s).copied().unwrap_or(0) as f64;
        let joint = self.joint.get(&(a, b)).copied().unwrap_or(0) as f64;
        (joint * n / (count(&self.x, a) * count(&self.y, b))).ln()
    }

    fn mutual_information(&self) -> f64 {
        let n = self.n as f64;
        self.joint
            .iter()
            .map(|(&(a, b), &c)| c as f64 / n * self.local(a, b))
            .sum()
    }
}

/// Plug-in (maximum likelihood) MI of two univariate discrete series, in nats.
///
/// Samples are integral values in `0..num_discrete_bins` stored as `f64`.
#[derive(Debug, Clone)]
pub struct DiscreteMutualInformation {
    opts: EstimatorOptions,
}

impl DiscreteMutualInformation {
    pub fn new(opts: EstimatorOptions) -> Result<Self> {
        opts.validate()?;
        Ok(Self { opts })
    }

    fn symbols(&self, data: ArrayView2<'_, f64>, which: &str) -> Result<Vec<usize>> {
        if data.ncols() != 1 {
            return Err(EstimatorError::config(format!(
                "the discrete estimator needs univariate {which}, got {} columns",
                data.ncols()
            )));
        }
        let bins = self.opts.num_discrete_bins;
        data.iter()
            .map(|&v| {
                if v.fract() == 0.0 && v >= 0.0 && v < bins as f64 {
                    Ok(v as usize)
                } else {
                    Err(EstimatorError::config(format!(
                        "{which} holds {v}, expected an integer symbol in 0..{bins}"
                    )))
                }
            })
            .collect()
    }

    fn table(&self, var1: ArrayView2<'_, f64>, var2: ArrayView2<'_, f64>) -> Result<(ContingencyTable, Vec<usize>, Vec<usize>)> {
        check_paired(var1, var2)?;
        let (x, y) = lagged(var1, var2, self.opts.lag)?;
        let x = self.symbols(x, "var1")?;
        let y = self.symbols(y, "var2")?;
        if x.is_empty() {
            return Err(EstimatorError::dims("no samples to count"));
        }
        let table = ContingencyTable::new(&x, &y);
        Ok((table, x, y))
    }
}

impl LocalValues for DiscreteMutualInformation {
    fn local_values(&self, var1: ArrayView2<'_, f64>, var2: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        let (table, x, y) = self.table(var1, var2)?;
        Ok(x.iter().zip(&y).map(|(&a, &b)| table.local(a, b)).collect())
    }
}

impl MutualInformationEstimator for DiscreteMutualInformation {
    fn name(&self) -> &'static str {
        "discrete"
    }

    fn supports_parallel(&self) -> bool {
        false
    }

    fn estimate_in_place(
        &self,
        var1: &mut Array2<f64>,
        var2: &mut Array2<f64>,
        n_chunks: usize,
    ) -> Result<Vec<f64>> {
        self.estimate(var1.view(), var2.view(), n_chunks)
    }

    fn estimate(
        &self,
        var1: ArrayView2<'_, f64>,
        var2: ArrayView2<'_, f64>,
        n_chunks: usize,
    ) -> Result<Vec<f64>> {
        require_single_chunk(self.name(), n_chunks)?;
        let (table, _, _) = self.table(var1, var2)?;
        let mi = table.mutual_information();
        tracing::trace!(mi, n = table.n, "discrete estimate");
        Ok(vec![mi])
    }
}
