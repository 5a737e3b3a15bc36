//! Expression filtering: drop genes that are not expressed in enough samples

use rayon::prelude::*;

use crate::error::{CountQcError, Result};
use crate::normalization::{NormalizedMatrix, PER_MILLION};

/// Parameters for [`filter_expressed`].
///
/// There is deliberately no `Default`: a sensible threshold depends on
/// sequencing depth and `min_samples` on the experimental design.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterParams {
    /// A sample counts as expressing a gene when its value is strictly above this
    pub threshold: f64,
    /// Number of expressing samples needed to keep the gene, usually the
    /// size of the smallest group of replicates
    pub min_samples: usize,
}

/// CPM threshold that corresponds to `raw_count` reads in a library of
/// `library_size` reads.
///
/// Around 10-15 reads at a typical depth is a common starting point, e.g.
/// 10 reads in a 20M-read library is a CPM of 0.5.
pub fn threshold_for_count(raw_count: f64, library_size: f64) -> f64 {
    raw_count * PER_MILLION / library_size
}

/// Per-gene keep/drop decision, aligned to the rows of the matrix it was
/// computed from
#[derive(Debug, Clone, PartialEq)]
pub struct FilterMask {
    keep: Vec<bool>,
    params: FilterParams,
}

impl FilterMask {
    /// Mask keeping every one of `n_genes` rows
    pub fn keep_all(n_genes: usize) -> Self {
        Self {
            keep: vec![true; n_genes],
            params: FilterParams {
                threshold: 0.0,
                min_samples: 0,
            },
        }
    }

    pub fn keep(&self) -> &[bool] {
        &self.keep
    }

    pub fn is_retained(&self, gene_idx: usize) -> bool {
        self.keep[gene_idx]
    }

    pub fn len(&self) -> usize {
        self.keep.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keep.is_empty()
    }

    pub fn n_retained(&self) -> usize {
        self.keep.iter().filter(|&&k| k).count()
    }

    pub fn retained_indices(&self) -> Vec<usize> {
        self.keep
            .iter()
            .enumerate()
            .filter(|(_, &k)| k)
            .map(|(i, _)| i)
            .collect()
    }

    /// Parameters the mask was computed with
    pub fn params(&self) -> &FilterParams {
        &self.params
    }
}

/// Outcome of expression filtering.
///
/// Removing every gene is not an error by itself; batch callers can branch on
/// `Empty` and skip the sample set instead of failing.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOutcome {
    /// At least one gene passed
    Retained(FilterMask),
    /// No gene passed
    Empty(FilterMask),
}

impl FilterOutcome {
    pub fn mask(&self) -> &FilterMask {
        match self {
            FilterOutcome::Retained(mask) | FilterOutcome::Empty(mask) => mask,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, FilterOutcome::Empty(_))
    }

    /// Treat an empty outcome as `EmptyResult`
    pub fn into_result(self) -> Result<FilterMask> {
        match self {
            FilterOutcome::Retained(mask) => Ok(mask),
            FilterOutcome::Empty(mask) => Err(CountQcError::EmptyResult {
                reason: format!(
                    "none of {} genes has a value above {} in at least {} samples",
                    mask.len(),
                    mask.params.threshold,
                    mask.params.min_samples
                ),
            }),
        }
    }
}

/// Keep genes whose value exceeds `threshold` in at least `min_samples` samples.
///
/// Parameters are validated before the data is read.
pub fn filter_expressed(matrix: &NormalizedMatrix, params: &FilterParams) -> Result<FilterOutcome> {
    if params.threshold.is_nan() || params.threshold < 0.0 {
        return Err(CountQcError::invalid_parameter(
            "threshold",
            format!("must be >= 0, got {}", params.threshold),
        ));
    }
    if params.min_samples > matrix.n_samples() {
        return Err(CountQcError::invalid_parameter(
            "min_samples",
            format!(
                "{} exceeds the number of samples ({})",
                params.min_samples,
                matrix.n_samples()
            ),
        ));
    }

    let values = matrix.values();
    let keep: Vec<bool> = (0..matrix.n_genes())
        .into_par_iter()
        .map(|i| {
            let expressed = values.row(i).iter().filter(|&&x| x > params.threshold).count();
            expressed >= params.min_samples
        })
        .collect();

    let mask = FilterMask {
        keep,
        params: params.clone(),
    };
    let retained = mask.n_retained();
    log::info!(
        "Expression filter (value > {} in >= {} samples): {} of {} genes retained",
        params.threshold,
        params.min_samples,
        retained,
        mask.len()
    );

    if retained == 0 {
        log::warn!("Expression filter removed every gene");
        Ok(FilterOutcome::Empty(mask))
    } else {
        Ok(FilterOutcome::Retained(mask))
    }
}
