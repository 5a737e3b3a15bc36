//! Count matrix representation for RNA-seq data

use std::collections::HashSet;

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use crate::error::{CountQcError, Result};

/// Find the first identifier that occurs more than once
fn first_duplicate(ids: &[String]) -> Option<&str> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter()
        .find(|id| !seen.insert(id.as_str()))
        .map(|id| id.as_str())
}

/// Finite, non-negative, integral and representable as `u64`.
///
/// `u64::MAX as f64` rounds up to 2^64, so the upper bound is exclusive.
pub(crate) fn is_whole_count(x: f64) -> bool {
    x.is_finite() && x >= 0.0 && x.fract() == 0.0 && x < u64::MAX as f64
}

/// A matrix of raw integer read counts
/// Rows are genes, columns are samples
#[derive(Debug, Clone, PartialEq)]
pub struct CountMatrix {
    /// Raw count data (genes x samples)
    counts: Array2<u64>,
    /// Gene identifiers, unique
    gene_ids: Vec<String>,
    /// Sample identifiers in column order
    sample_ids: Vec<String>,
}

impl CountMatrix {
    /// Create a count matrix from integer counts
    pub fn new(
        counts: Array2<u64>,
        gene_ids: Vec<String>,
        sample_ids: Vec<String>,
    ) -> Result<Self> {
        let (n_genes, n_samples) = counts.dim();

        if gene_ids.len() != n_genes {
            return Err(CountQcError::schema(format!(
                "matrix has {} rows but {} gene IDs were given",
                n_genes,
                gene_ids.len()
            )));
        }

        if sample_ids.len() != n_samples {
            return Err(CountQcError::schema(format!(
                "matrix has {} columns but {} sample IDs were given",
                n_samples,
                sample_ids.len()
            )));
        }

        if let Some(dup) = first_duplicate(&gene_ids) {
            return Err(CountQcError::schema(format!("duplicate gene ID '{}'", dup)));
        }

        // Library sizes must fit in u64 so that later sums cannot wrap
        for (j, column) in counts.axis_iter(Axis(1)).enumerate() {
            let mut total: u64 = 0;
            for (i, &count) in column.iter().enumerate() {
                total = total.checked_add(count).ok_or_else(|| CountQcError::InvalidCount {
                    gene_id: gene_ids[i].clone(),
                    sample_id: sample_ids[j].clone(),
                    value: count as f64,
                })?;
            }
        }

        Ok(Self {
            counts,
            gene_ids,
            sample_ids,
        })
    }

    /// Create from floating-point values as parsed from text.
    ///
    /// Every entry must be a finite, non-negative whole number.
    pub fn from_f64(
        values: Array2<f64>,
        gene_ids: Vec<String>,
        sample_ids: Vec<String>,
    ) -> Result<Self> {
        let (n_genes, n_samples) = values.dim();
        if gene_ids.len() != n_genes || sample_ids.len() != n_samples {
            return Err(CountQcError::schema(format!(
                "matrix is {}x{} but {} gene IDs and {} sample IDs were given",
                n_genes,
                n_samples,
                gene_ids.len(),
                sample_ids.len()
            )));
        }

        if let Some(((i, j), value)) = values.indexed_iter().find(|item| !is_whole_count(*item.1)) {
            return Err(CountQcError::InvalidCount {
                gene_id: gene_ids[i].clone(),
                sample_id: sample_ids[j].clone(),
                value: *value,
            });
        }

        let counts = values.mapv(|x| x as u64);
        Self::new(counts, gene_ids, sample_ids)
    }

    /// Get the number of genes
    pub fn n_genes(&self) -> usize {
        self.counts.nrows()
    }

    /// Get the number of samples
    pub fn n_samples(&self) -> usize {
        self.counts.ncols()
    }

    /// Get the raw counts as a view
    pub fn counts(&self) -> ArrayView2<'_, u64> {
        self.counts.view()
    }

    pub fn gene_ids(&self) -> &[String] {
        &self.gene_ids
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Get counts for a specific gene
    pub fn gene_counts(&self, gene_idx: usize) -> ArrayView1<'_, u64> {
        self.counts.row(gene_idx)
    }

    /// Get counts for a specific sample
    pub fn sample_counts(&self, sample_idx: usize) -> ArrayView1<'_, u64> {
        self.counts.column(sample_idx)
    }

    /// Get gene index by ID
    pub fn gene_index(&self, gene_id: &str) -> Option<usize> {
        self.gene_ids.iter().position(|id| id == gene_id)
    }

    /// Get sample index by ID
    pub fn sample_index(&self, sample_id: &str) -> Option<usize> {
        self.sample_ids.iter().position(|id| id == sample_id)
    }

    /// Sum of counts per sample (library size); checked against overflow
    /// when the matrix was built
    pub fn library_sizes(&self) -> Vec<u64> {
        self.counts
            .axis_iter(Axis(1))
            .map(|col| col.sum())
            .collect()
    }

    /// Replace the column identifiers, keeping the data in place.
    ///
    /// Columns are renamed strictly by position; nothing is reordered.
    pub fn rename_samples(&self, sample_ids: Vec<String>) -> Result<Self> {
        if sample_ids.len() != self.n_samples() {
            return Err(CountQcError::schema(format!(
                "cannot rename {} columns with {} new sample IDs",
                self.n_samples(),
                sample_ids.len()
            )));
        }
        Self::new(self.counts.clone(), self.gene_ids.clone(), sample_ids)
    }

    /// Subset to specific samples
    pub fn subset_samples(&self, sample_indices: &[usize]) -> Result<Self> {
        let new_counts = self.counts.select(Axis(1), sample_indices);
        let new_sample_ids: Vec<String> = sample_indices
            .iter()
            .map(|&i| self.sample_ids[i].clone())
            .collect();

        Self::new(new_counts, self.gene_ids.clone(), new_sample_ids)
    }

    /// Subset to specific genes
    pub fn subset_genes(&self, gene_indices: &[usize]) -> Result<Self> {
        let new_counts = self.counts.select(Axis(0), gene_indices);
        let new_gene_ids: Vec<String> = gene_indices
            .iter()
            .map(|&i| self.gene_ids[i].clone())
            .collect();

        Self::new(new_counts, new_gene_ids, self.sample_ids.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn ids(prefix: &str, n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("{}{}", prefix, i)).collect()
    }

    #[test]
    fn test_count_matrix_creation() {
        let counts = array![[10, 20, 30], [5, 15, 25]];
        let matrix = CountMatrix::new(counts, ids("gene", 2), ids("s", 3)).unwrap();
        assert_eq!(matrix.n_genes(), 2);
        assert_eq!(matrix.n_samples(), 3);
        assert_eq!(matrix.gene_index("gene2"), Some(1));
        assert_eq!(matrix.sample_index("s4"), None);
    }

    #[test]
    fn test_negative_counts_rejected() {
        let values = array![[10.0, -5.0], [5.0, 15.0]];
        let err = CountMatrix::from_f64(values, ids("gene", 2), ids("s", 2)).unwrap_err();
        match err {
            CountQcError::InvalidCount { gene_id, sample_id, .. } => {
                assert_eq!(gene_id, "gene1");
                assert_eq!(sample_id, "s2");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_fractional_counts_rejected() {
        let values = array![[10.0, 2.5], [5.0, 15.0]];
        let result = CountMatrix::from_f64(values, ids("gene", 2), ids("s", 2));
        assert!(matches!(result, Err(CountQcError::InvalidCount { .. })));
    }

    #[test]
    fn test_duplicate_gene_ids_rejected() {
        let counts = array![[1, 2], [3, 4]];
        let gene_ids = vec!["g".to_string(), "g".to_string()];
        let result = CountMatrix::new(counts, gene_ids, ids("s", 2));
        assert!(matches!(result, Err(CountQcError::SchemaMismatch { .. })));
    }

    #[test]
    fn test_count_at_two_pow_64_rejected() {
        let values = array![[u64::MAX as f64, 1.0]];
        let result = CountMatrix::from_f64(values, ids("gene", 1), ids("s", 2));
        assert!(matches!(result, Err(CountQcError::InvalidCount { .. })));
    }

    #[test]
    fn test_library_size_overflow_rejected() {
        let half = u64::MAX / 2 + 1;
        let counts = array![[half, 1], [half, 1]];
        match CountMatrix::new(counts, ids("gene", 2), ids("s", 2)) {
            Err(CountQcError::InvalidCount { gene_id, sample_id, .. }) => {
                assert_eq!(gene_id, "gene2");
                assert_eq!(sample_id, "s1");
            }
            other => panic!("expected InvalidCount, got {:?}", other),
        }

        // A single count of u64::MAX is still a valid library
        let counts = array![[u64::MAX, 1], [0, 1]];
        let matrix = CountMatrix::new(counts, ids("gene", 2), ids("s", 2)).unwrap();
        assert_eq!(matrix.library_sizes(), vec![u64::MAX, 2]);
    }

    #[test]
    fn test_library_sizes() {
        let counts = array![[10, 20], [5, 15]];
        let matrix = CountMatrix::new(counts, ids("gene", 2), ids("s", 2)).unwrap();
        assert_eq!(matrix.library_sizes(), vec![15, 35]);
    }

    #[test]
    fn test_rename_samples_keeps_data() {
        let counts = array![[10, 20], [5, 15]];
        let matrix = CountMatrix::new(counts, ids("gene", 2), ids("s", 2)).unwrap();
        let renamed = matrix
            .rename_samples(vec!["a.bam".to_string(), "b.bam".to_string()])
            .unwrap();
        assert_eq!(renamed.sample_ids(), &["a.bam", "b.bam"]);
        assert_eq!(renamed.counts(), matrix.counts());
        assert!(matrix.rename_samples(vec!["x".to_string()]).is_err());
    }
}
