//! Leading log-fold-change distance between samples
//!
//! For every pair of samples the genes are ranked by their absolute log2
//! fold change between just those two samples, and the distance is the root
//! mean square of the `top` largest. Each pair therefore sees its own gene
//! set, which is what separates this from a single global top-N.

use std::cmp::Ordering;

use ndarray::{Array2, Axis};
use rayon::prelude::*;
use statrs::statistics::Statistics;

use super::matrix::DistanceMatrix;
use crate::error::{CountQcError, Result};
use crate::filter::FilterMask;
use crate::normalization::NormalizedMatrix;

/// How genes are chosen for each sample pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneSelection {
    /// Top genes chosen separately for every pair
    #[default]
    Pairwise,
    /// One set of top genes, ranked by variance across all samples,
    /// shared by every pair
    Common,
}

impl std::str::FromStr for GeneSelection {
    type Err = CountQcError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pairwise" => Ok(GeneSelection::Pairwise),
            "common" => Ok(GeneSelection::Common),
            _ => Err(CountQcError::invalid_parameter(
                "gene_selection",
                format!("unknown mode '{}'. Use: pairwise or common", s),
            )),
        }
    }
}

/// Parameters for [`pairwise_distance`]
#[derive(Debug, Clone)]
pub struct DistanceParams {
    /// Number of leading genes per pair
    pub top: usize,
    pub selection: GeneSelection,
    /// Used to move a linear-scale matrix into log2 space; ignored when the
    /// input is already log-scaled
    pub pseudocount: f64,
}

impl Default for DistanceParams {
    fn default() -> Self {
        Self {
            top: 500,
            selection: GeneSelection::default(),
            pseudocount: 1.0,
        }
    }
}

/// Compute the sample x sample leading fold-change distance matrix over the
/// genes retained by `mask`.
///
/// When fewer genes are retained than `params.top`, all of them are used and
/// the effective number is recorded on the result (see
/// [`DistanceMatrix::shortfall`]).
pub fn pairwise_distance(
    matrix: &NormalizedMatrix,
    mask: &FilterMask,
    params: &DistanceParams,
) -> Result<DistanceMatrix> {
    if params.top == 0 {
        return Err(CountQcError::invalid_parameter("top", "must be at least 1"));
    }

    let retained = matrix.select(mask)?;
    let log_values = retained.to_log2(params.pseudocount)?;
    let n_genes = log_values.n_genes();
    let n_samples = log_values.n_samples();

    if n_genes == 0 {
        return Err(CountQcError::EmptyResult {
            reason: "no retained genes to compute sample distances from".to_string(),
        });
    }

    let effective_top = params.top.min(n_genes);
    if effective_top < params.top {
        log::warn!(
            "Only {} genes retained; using all of them instead of the top {}",
            n_genes,
            params.top
        );
    }

    // Sample-major copy so each pair walks two contiguous slices
    let columns: Vec<Vec<f64>> = log_values
        .values()
        .axis_iter(Axis(1))
        .map(|col| col.to_vec())
        .collect();

    let pairs: Vec<(usize, usize)> = (0..n_samples)
        .flat_map(|i| ((i + 1)..n_samples).map(move |j| (i, j)))
        .collect();

    log::debug!(
        "Computing {} sample pairs over {} genes ({:?}, top {})",
        pairs.len(),
        n_genes,
        params.selection,
        effective_top
    );

    let distances: Vec<f64> = match params.selection {
        GeneSelection::Pairwise => pairs
            .par_iter()
            .map(|&(i, j)| leading_rms(&columns[i], &columns[j], effective_top))
            .collect(),
        GeneSelection::Common => {
            let genes = top_variance_genes(&log_values, effective_top);
            pairs
                .par_iter()
                .map(|&(i, j)| selected_rms(&columns[i], &columns[j], &genes))
                .collect()
        }
    };

    let mut values = Array2::zeros((n_samples, n_samples));
    for (&(i, j), &d) in pairs.iter().zip(distances.iter()) {
        values[[i, j]] = d;
        values[[j, i]] = d;
    }

    Ok(DistanceMatrix::from_parts(
        values,
        log_values.sample_ids().to_vec(),
        params.top,
        effective_top,
        params.selection,
    ))
}

/// RMS of the `top` largest absolute differences between `a` and `b`
fn leading_rms(a: &[f64], b: &[f64], top: usize) -> f64 {
    let mut squared: Vec<f64> = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).collect();
    if top < squared.len() {
        // Partition so the `top` largest occupy the front
        squared.select_nth_unstable_by(top - 1, |x, y| y.total_cmp(x));
        squared.truncate(top);
    }
    (squared.iter().sum::<f64>() / top as f64).sqrt()
}

/// RMS of the differences over a fixed gene set
fn selected_rms(a: &[f64], b: &[f64], genes: &[usize]) -> f64 {
    let sum: f64 = genes.iter().map(|&g| (a[g] - b[g]) * (a[g] - b[g])).sum();
    (sum / genes.len() as f64).sqrt()
}

/// Indices of the `top` genes with the largest variance across samples
fn top_variance_genes(matrix: &NormalizedMatrix, top: usize) -> Vec<usize> {
    let values = matrix.values();
    let variances: Vec<f64> = (0..matrix.n_genes())
        .into_par_iter()
        .map(|i| {
            let var = values.row(i).iter().variance();
            if var.is_nan() {
                0.0
            } else {
                var
            }
        })
        .collect();

    let mut order: Vec<usize> = (0..variances.len()).collect();
    order.sort_by(|&a, &b| match variances[b].total_cmp(&variances[a]) {
        Ordering::Equal => a.cmp(&b),
        other => other,
    });
    order.truncate(top);
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{filter_expressed, FilterParams};
    use crate::normalization::Scale;
    use ndarray::{array, Array2};

    fn log_matrix(values: Array2<f64>) -> NormalizedMatrix {
        let gene_ids = (0..values.nrows()).map(|i| format!("g{}", i)).collect();
        let sample_ids = (0..values.ncols()).map(|j| format!("s{}", j)).collect();
        let scale = Scale::Log2 { pseudocount: 1.0 };
        NormalizedMatrix::new(values, gene_ids, sample_ids, scale).unwrap()
    }

    fn params(top: usize, selection: GeneSelection) -> DistanceParams {
        DistanceParams {
            top,
            selection,
            pseudocount: 1.0,
        }
    }

    #[test]
    fn test_leading_rms_uses_largest_differences() {
        let a = [0.0, 0.0, 0.0];
        let b = [3.0, -1.0, 2.0];
        assert!((leading_rms(&a, &b, 2) - 6.5f64.sqrt()).abs() < 1e-12);
        assert!((leading_rms(&a, &b, 3) - (14.0f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_distance_symmetric_with_zero_diagonal() {
        let m = log_matrix(array![
            [1.0, 2.0, 3.0, 4.0],
            [5.0, 3.0, 1.0, 0.5],
            [2.0, 2.5, 2.0, 7.0],
            [0.0, 1.0, 0.0, 1.0],
            [4.0, 4.0, 6.0, 6.0],
        ]);
        let mask = FilterMask::keep_all(5);
        let dist = pairwise_distance(&m, &mask, &params(3, GeneSelection::Pairwise)).unwrap();
        let v = dist.values();
        for i in 0..4 {
            assert_eq!(v[[i, i]], 0.0);
            for j in 0..4 {
                assert_eq!(v[[i, j]], v[[j, i]]);
                if i != j {
                    assert!(v[[i, j]] > 0.0);
                }
            }
        }
        assert_eq!(dist.effective_top(), 3);
        assert!(dist.shortfall().is_none());
    }

    #[test]
    fn test_pairwise_selection_differs_from_common() {
        let m = log_matrix(array![[0.0, 10.0, 0.0], [0.0, 0.0, 4.0]]);
        let mask = FilterMask::keep_all(2);

        let pairwise = pairwise_distance(&m, &mask, &params(1, GeneSelection::Pairwise)).unwrap();
        assert!((pairwise.get(0, 1) - 10.0).abs() < 1e-12);
        assert!((pairwise.get(0, 2) - 4.0).abs() < 1e-12);
        assert!((pairwise.get(1, 2) - 10.0).abs() < 1e-12);

        // A single global gene (highest variance: g0) misses the s0/s2 difference
        let common = pairwise_distance(&m, &mask, &params(1, GeneSelection::Common)).unwrap();
        assert_eq!(common.get(0, 2), 0.0);
        assert_eq!(common.selection(), GeneSelection::Common);
    }

    #[test]
    fn test_masked_genes_are_ignored() {
        let m = log_matrix(array![[2.0, 3.0], [0.0, 100.0]]);
        let filter_params = FilterParams {
            threshold: 0.5,
            min_samples: 2,
        };
        let mask = filter_expressed(&m, &filter_params).unwrap().into_result().unwrap();
        assert_eq!(mask.keep(), &[true, false]);

        let filtered = pairwise_distance(&m, &mask, &params(1, GeneSelection::Pairwise)).unwrap();
        assert!((filtered.get(0, 1) - 1.0).abs() < 1e-12);

        let all_genes = FilterMask::keep_all(2);
        let all = pairwise_distance(&m, &all_genes, &params(1, GeneSelection::Pairwise)).unwrap();
        assert!((all.get(0, 1) - 100.0).abs() < 1e-12);
    }

    #[test]
    fn test_shortfall_reported_and_all_genes_used() {
        let m = log_matrix(array![[0.0, 3.0], [0.0, 4.0]]);
        let dist =
            pairwise_distance(&m, &FilterMask::keep_all(2), &DistanceParams::default()).unwrap();
        assert_eq!(dist.requested_top(), 500);
        assert_eq!(dist.effective_top(), 2);
        let shortfall = dist.shortfall().unwrap();
        assert_eq!((shortfall.requested, shortfall.available), (500, 2));
        assert!((dist.get(0, 1) - 12.5f64.sqrt()).abs() < 1e-12);
        assert!(matches!(
            dist.require_full_top(),
            Err(CountQcError::InsufficientGenes { requested: 500, available: 2 })
        ));
    }

    #[test]
    fn test_linear_input_is_log_transformed() {
        let values = array![[1.0, 3.0], [7.0, 7.0]];
        let gene_ids = vec!["g0".to_string(), "g1".to_string()];
        let sample_ids = vec!["s0".to_string(), "s1".to_string()];
        let linear = NormalizedMatrix::new(values, gene_ids, sample_ids, Scale::Linear).unwrap();
        let mask = FilterMask::keep_all(2);
        let dist = pairwise_distance(&linear, &mask, &params(1, GeneSelection::Pairwise)).unwrap();
        // log2(3 + 1) - log2(1 + 1) = 1
        assert!((dist.get(0, 1) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_mask_and_zero_top() {
        let m = log_matrix(array![[0.0, 1.0]]);
        let empty = FilterMask::keep_all(0);
        assert!(matches!(
            pairwise_distance(&m, &empty, &DistanceParams::default()),
            Err(CountQcError::SchemaMismatch { .. })
        ));
        assert!(matches!(
            pairwise_distance(&m, &FilterMask::keep_all(1), &params(0, GeneSelection::Pairwise)),
            Err(CountQcError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_gene_selection_parse() {
        assert_eq!("pairwise".parse::<GeneSelection>().unwrap(), GeneSelection::Pairwise);
        assert_eq!("common".parse::<GeneSelection>().unwrap(), GeneSelection::Common);
        assert!("global".parse::<GeneSelection>().is_err());
        assert_eq!(GeneSelection::default(), GeneSelection::Pairwise);
    }
}
