//! Counts-per-million scale normalization
//!
//! Each sample's counts are multiplied by 1e6 / library size so that samples
//! sequenced to different depths become comparable. Optionally the result is
//! moved to log2 space with a pseudocount so zeros stay finite.

use ndarray::{Array2, ArrayView1, ArrayView2};
use rayon::prelude::*;

use crate::data::CountMatrixStore;
use crate::error::{CountQcError, Result};
use crate::filter::FilterMask;

/// Reads per million
pub const PER_MILLION: f64 = 1e6;

/// Value scale of a normalized matrix
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scale {
    /// Plain counts per million
    Linear,
    /// log2(cpm + pseudocount)
    Log2 { pseudocount: f64 },
}

impl Scale {
    pub fn is_log(&self) -> bool {
        matches!(self, Scale::Log2 { .. })
    }
}

/// Parameters for [`normalize`]
#[derive(Debug, Clone)]
pub struct NormalizeParams {
    /// Apply log2(x + pseudocount) after scaling
    pub log: bool,
    /// Added before the log; must be > 0
    pub pseudocount: f64,
}

impl Default for NormalizeParams {
    fn default() -> Self {
        Self {
            log: false,
            pseudocount: 1.0,
        }
    }
}

/// Scale-normalized expression values (genes x samples)
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedMatrix {
    values: Array2<f64>,
    gene_ids: Vec<String>,
    sample_ids: Vec<String>,
    scale: Scale,
}

impl NormalizedMatrix {
    /// Wrap precomputed values; dimensions must agree with the identifiers
    pub fn new(
        values: Array2<f64>,
        gene_ids: Vec<String>,
        sample_ids: Vec<String>,
        scale: Scale,
    ) -> Result<Self> {
        if values.nrows() != gene_ids.len() || values.ncols() != sample_ids.len() {
            return Err(CountQcError::schema(format!(
                "normalized values are {}x{} but {} gene IDs and {} sample IDs were given",
                values.nrows(),
                values.ncols(),
                gene_ids.len(),
                sample_ids.len()
            )));
        }
        Ok(Self {
            values,
            gene_ids,
            sample_ids,
            scale,
        })
    }

    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    pub fn gene_values(&self, gene_idx: usize) -> ArrayView1<'_, f64> {
        self.values.row(gene_idx)
    }

    pub fn gene_ids(&self) -> &[String] {
        &self.gene_ids
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn scale(&self) -> Scale {
        self.scale
    }

    pub fn n_genes(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_samples(&self) -> usize {
        self.values.ncols()
    }

    /// New matrix holding only the rows retained by `mask`
    pub fn select(&self, mask: &FilterMask) -> Result<Self> {
        if mask.len() != self.n_genes() {
            return Err(CountQcError::schema(format!(
                "filter mask covers {} genes but the matrix has {}",
                mask.len(),
                self.n_genes()
            )));
        }
        let keep = mask.retained_indices();
        Ok(Self {
            values: self.values.select(ndarray::Axis(0), &keep),
            gene_ids: keep.iter().map(|&i| self.gene_ids[i].clone()).collect(),
            sample_ids: self.sample_ids.clone(),
            scale: self.scale,
        })
    }

    /// Values in log2 space.
    ///
    /// A linear matrix is transformed with `pseudocount`; a matrix that is
    /// already log-scaled is returned as is.
    pub fn to_log2(&self, pseudocount: f64) -> Result<Self> {
        if self.scale.is_log() {
            return Ok(self.clone());
        }
        check_pseudocount(pseudocount)?;
        Ok(Self {
            values: self.values.mapv(|x| (x + pseudocount).log2()),
            gene_ids: self.gene_ids.clone(),
            sample_ids: self.sample_ids.clone(),
            scale: Scale::Log2 { pseudocount },
        })
    }
}

fn check_pseudocount(pseudocount: f64) -> Result<()> {
    if !(pseudocount.is_finite() && pseudocount > 0.0) {
        return Err(CountQcError::invalid_parameter(
            "pseudocount",
            format!("must be a positive finite number, got {}", pseudocount),
        ));
    }
    Ok(())
}

/// Convert raw counts to counts per million, optionally log2-transformed.
///
/// Fails with `DegenerateLibrary` if any sample has no reads at all, since its
/// scale factor is undefined. Nothing is returned in that case.
pub fn normalize(store: &CountMatrixStore, params: &NormalizeParams) -> Result<NormalizedMatrix> {
    if params.log {
        check_pseudocount(params.pseudocount)?;
    }

    let library_sizes = store.library_sizes();
    if let Some(j) = library_sizes.iter().position(|&size| size == 0) {
        return Err(CountQcError::DegenerateLibrary {
            sample_id: store.sample_ids()[j].clone(),
        });
    }

    let scale_factors: Vec<f64> = library_sizes
        .iter()
        .map(|&size| PER_MILLION / size as f64)
        .collect();

    let counts = store.matrix().counts();
    let n_genes = store.n_genes();
    let n_samples = store.n_samples();

    // Rows are independent
    let flat: Vec<f64> = (0..n_genes)
        .into_par_iter()
        .flat_map_iter(|i| {
            let row = counts.row(i);
            let scale_factors = &scale_factors;
            (0..n_samples).map(move |j| {
                let cpm = row[j] as f64 * scale_factors[j];
                if params.log {
                    (cpm + params.pseudocount).log2()
                } else {
                    cpm
                }
            })
        })
        .collect();

    let values =
        Array2::from_shape_vec((n_genes, n_samples), flat).map_err(|e| CountQcError::InvalidInput {
            reason: format!("could not shape normalized values: {}", e),
        })?;

    let scale = if params.log {
        Scale::Log2 {
            pseudocount: params.pseudocount,
        }
    } else {
        Scale::Linear
    };

    NormalizedMatrix::new(values, store.gene_ids().to_vec(), store.sample_ids().to_vec(), scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CountMatrix, SampleMetadata};
    use ndarray::{array, Array2, Axis};

    fn store_from(counts: Array2<u64>) -> CountMatrixStore {
        let gene_ids: Vec<String> = (0..counts.nrows()).map(|i| format!("g{}", i)).collect();
        let sample_ids: Vec<String> = (0..counts.ncols()).map(|j| format!("s{}", j)).collect();
        let matrix = CountMatrix::new(counts, gene_ids, sample_ids.clone()).unwrap();
        CountMatrixStore::new(matrix, SampleMetadata::new(sample_ids)).unwrap()
    }

    #[test]
    fn test_cpm_columns_sum_to_one_million() {
        let store = store_from(array![[3, 70, 0], [11, 2, 9], [986, 28, 1]]);
        let norm = normalize(&store, &NormalizeParams::default()).unwrap();
        assert_eq!(norm.scale(), Scale::Linear);
        for col in norm.values().axis_iter(Axis(1)) {
            assert!((col.sum() - PER_MILLION).abs() < 1e-6, "column sum {}", col.sum());
        }
    }

    #[test]
    fn test_single_expressed_gene_is_one_million() {
        let store = store_from(array![[100, 200, 50, 10], [0, 0, 0, 0]]);
        assert_eq!(store.library_sizes(), &[100, 200, 50, 10]);
        let norm = normalize(&store, &NormalizeParams::default()).unwrap();
        for j in 0..4 {
            assert!((norm.values()[[0, j]] - 1e6).abs() < 1e-9);
            assert_eq!(norm.values()[[1, j]], 0.0);
        }
    }

    #[test]
    fn test_log_transform_uses_pseudocount() {
        let store = store_from(array![[1, 3], [3, 1]]);
        let params = NormalizeParams {
            log: true,
            pseudocount: 2.0,
        };
        let norm = normalize(&store, &params).unwrap();
        assert_eq!(norm.scale(), Scale::Log2 { pseudocount: 2.0 });
        assert!((norm.values()[[0, 0]] - (250_002.0f64).log2()).abs() < 1e-12);
        assert!((norm.values()[[1, 0]] - (750_002.0f64).log2()).abs() < 1e-12);
    }

    #[test]
    fn test_zero_library_is_degenerate() {
        let store = store_from(array![[5, 0, 1], [2, 0, 0]]);
        match normalize(&store, &NormalizeParams::default()) {
            Err(CountQcError::DegenerateLibrary { sample_id }) => assert_eq!(sample_id, "s1"),
            other => panic!("expected DegenerateLibrary, got {:?}", other),
        }
    }

    #[test]
    fn test_non_positive_pseudocount_rejected() {
        let store = store_from(array![[5, 4], [2, 1]]);
        for pseudocount in [0.0, -1.0, f64::NAN] {
            let params = NormalizeParams { log: true, pseudocount };
            assert!(matches!(
                normalize(&store, &params),
                Err(CountQcError::InvalidParameter { .. })
            ));
        }
    }

    #[test]
    fn test_to_log2_is_noop_on_log_matrix() {
        let store = store_from(array![[5, 4], [2, 1]]);
        let log = normalize(&store, &NormalizeParams { log: true, pseudocount: 1.0 }).unwrap();
        assert_eq!(log.to_log2(0.5).unwrap(), log);

        let linear = normalize(&store, &NormalizeParams::default()).unwrap();
        assert_eq!(linear.to_log2(1.0).unwrap(), log);
    }
}
