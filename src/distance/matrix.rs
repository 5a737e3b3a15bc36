//! Sample x sample distance matrix

use ndarray::{Array2, ArrayView2};

use super::leading_fc::GeneSelection;
use crate::error::{CountQcError, Result};

/// Symmetry tolerance for externally supplied distances, scaled by max(1, |d|)
const SYMMETRY_TOL: f64 = 1e-9;

/// Fewer genes were available than the requested top-N
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneShortfall {
    pub requested: usize,
    pub available: usize,
}

/// Symmetric sample distances with a zero diagonal
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    values: Array2<f64>,
    sample_ids: Vec<String>,
    requested_top: usize,
    effective_top: usize,
    selection: GeneSelection,
}

impl DistanceMatrix {
    pub(crate) fn from_parts(
        values: Array2<f64>,
        sample_ids: Vec<String>,
        requested_top: usize,
        effective_top: usize,
        selection: GeneSelection,
    ) -> Self {
        Self {
            values,
            sample_ids,
            requested_top,
            effective_top,
            selection,
        }
    }

    /// Validate a distance matrix computed elsewhere.
    ///
    /// The matrix must be square, match `sample_ids`, be symmetric, have a zero
    /// diagonal and contain only finite non-negative values. Entries that
    /// differ within the symmetry tolerance are replaced by their mean.
    pub fn from_values(sample_ids: Vec<String>, mut values: Array2<f64>) -> Result<Self> {
        let n = sample_ids.len();
        if values.dim() != (n, n) {
            return Err(CountQcError::schema(format!(
                "distance matrix is {}x{} but {} sample IDs were given",
                values.nrows(),
                values.ncols(),
                n
            )));
        }

        for i in 0..n {
            if values[[i, i]] != 0.0 {
                return Err(CountQcError::invalid_parameter(
                    "distances",
                    format!(
                        "diagonal entry for '{}' is {}, expected 0",
                        sample_ids[i],
                        values[[i, i]]
                    ),
                ));
            }
            for j in (i + 1)..n {
                let (a, b) = (values[[i, j]], values[[j, i]]);
                if !a.is_finite() || !b.is_finite() || a < 0.0 || b < 0.0 {
                    return Err(CountQcError::invalid_parameter(
                        "distances",
                        format!(
                            "distance between '{}' and '{}' must be finite and non-negative",
                            sample_ids[i], sample_ids[j]
                        ),
                    ));
                }
                if (a - b).abs() > SYMMETRY_TOL * a.abs().max(b.abs()).max(1.0) {
                    return Err(CountQcError::invalid_parameter(
                        "distances",
                        format!(
                            "matrix is not symmetric at ('{}', '{}')",
                            sample_ids[i], sample_ids[j]
                        ),
                    ));
                }
                let mean = 0.5 * (a + b);
                values[[i, j]] = mean;
                values[[j, i]] = mean;
            }
        }

        Ok(Self {
            values,
            sample_ids,
            requested_top: 0,
            effective_top: 0,
            selection: GeneSelection::Pairwise,
        })
    }

    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[[i, j]]
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    /// Top-N asked for by the caller (0 for externally supplied matrices)
    pub fn requested_top(&self) -> usize {
        self.requested_top
    }

    /// Number of genes actually used per pair
    pub fn effective_top(&self) -> usize {
        self.effective_top
    }

    pub fn selection(&self) -> GeneSelection {
        self.selection
    }

    /// Present when fewer genes than requested were available
    pub fn shortfall(&self) -> Option<GeneShortfall> {
        (self.effective_top < self.requested_top).then_some(GeneShortfall {
            requested: self.requested_top,
            available: self.effective_top,
        })
    }

    /// `InsufficientGenes` for callers that need the full top-N
    pub fn require_full_top(&self) -> Result<()> {
        match self.shortfall() {
            Some(s) => Err(CountQcError::InsufficientGenes {
                requested: s.requested,
                available: s.available,
            }),
            None => Ok(()),
        }
    }
}
