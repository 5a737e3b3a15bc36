//! CountMatrixStore - immutable count matrix bound to sample metadata

use super::{CountMatrix, SampleMetadata};
use crate::error::{CountQcError, Result};

/// Raw counts together with the metadata describing their columns.
///
/// Construction checks that the metadata and the matrix agree on the number,
/// order and names of samples. Once built the store is never mutated; every
/// transformation returns a new store.
#[derive(Debug, Clone)]
pub struct CountMatrixStore {
    counts: CountMatrix,
    metadata: SampleMetadata,
    /// Column sums of `counts`, recomputed for every new store
    library_sizes: Vec<u64>,
}

impl CountMatrixStore {
    /// Bind a count matrix to its sample metadata
    pub fn new(counts: CountMatrix, metadata: SampleMetadata) -> Result<Self> {
        if metadata.n_samples() != counts.n_samples() {
            return Err(CountQcError::schema(format!(
                "metadata describes {} samples but the count matrix has {} columns",
                metadata.n_samples(),
                counts.n_samples()
            )));
        }

        if let Some(dup) = metadata.duplicate_sample() {
            return Err(CountQcError::schema(format!(
                "duplicate sample ID '{}' in metadata",
                dup
            )));
        }

        if let Some((pos, (meta_id, col_id))) = metadata
            .sample_ids()
            .iter()
            .zip(counts.sample_ids())
            .enumerate()
            .find(|(_, (m, c))| m != c)
        {
            return Err(CountQcError::schema(format!(
                "column {} is '{}' in the count matrix but '{}' in the metadata",
                pos + 1,
                col_id,
                meta_id
            )));
        }

        let library_sizes = counts.library_sizes();
        log::debug!(
            "Bound {} genes x {} samples; library sizes {:?}",
            counts.n_genes(),
            counts.n_samples(),
            library_sizes
        );

        Ok(Self {
            counts,
            metadata,
            library_sizes,
        })
    }

    pub fn matrix(&self) -> &CountMatrix {
        &self.counts
    }

    pub fn metadata(&self) -> &SampleMetadata {
        &self.metadata
    }

    pub fn gene_ids(&self) -> &[String] {
        self.counts.gene_ids()
    }

    pub fn sample_ids(&self) -> &[String] {
        self.counts.sample_ids()
    }

    pub fn n_genes(&self) -> usize {
        self.counts.n_genes()
    }

    pub fn n_samples(&self) -> usize {
        self.counts.n_samples()
    }

    /// Total counts per sample, in column order
    pub fn library_sizes(&self) -> &[u64] {
        &self.library_sizes
    }

    /// Look up a raw count by gene and sample identifier
    pub fn count(&self, gene_id: &str, sample_id: &str) -> Option<u64> {
        let i = self.counts.gene_index(gene_id)?;
        let j = self.counts.sample_index(sample_id)?;
        Some(self.counts.counts()[[i, j]])
    }

    /// New store restricted to the given genes
    pub fn subset_genes(&self, gene_indices: &[usize]) -> Result<Self> {
        Self::new(self.counts.subset_genes(gene_indices)?, self.metadata.clone())
    }

    /// New store restricted to the given samples, in the given order
    pub fn subset_samples(&self, sample_indices: &[usize]) -> Result<Self> {
        Self::new(
            self.counts.subset_samples(sample_indices)?,
            self.metadata.subset(sample_indices)?,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sample_ids() -> Vec<String> {
        vec!["s1".to_string(), "s2".to_string(), "s3".to_string()]
    }

    fn matrix() -> CountMatrix {
        CountMatrix::new(
            array![[10, 0, 5], [20, 3, 0]],
            vec!["g1".to_string(), "g2".to_string()],
            sample_ids(),
        )
        .unwrap()
    }

    #[test]
    fn test_store_binds_matching_metadata() {
        let store = CountMatrixStore::new(matrix(), SampleMetadata::new(sample_ids())).unwrap();
        assert_eq!(store.library_sizes(), &[30, 3, 5]);
        assert_eq!(store.count("g2", "s2"), Some(3));
        assert_eq!(store.count("g3", "s2"), None);
    }

    #[test]
    fn test_sample_count_mismatch() {
        let meta = SampleMetadata::new(vec!["s1".to_string(), "s2".to_string()]);
        let result = CountMatrixStore::new(matrix(), meta);
        assert!(matches!(result, Err(CountQcError::SchemaMismatch { .. })));
    }

    #[test]
    fn test_sample_order_is_not_repaired() {
        let meta = SampleMetadata::new(vec!["s2".to_string(), "s1".to_string(), "s3".to_string()]);
        let result = CountMatrixStore::new(matrix(), meta);
        assert!(matches!(result, Err(CountQcError::SchemaMismatch { .. })));
    }

    #[test]
    fn test_renamed_columns_bind() {
        let meta = SampleMetadata::new(vec!["A".to_string(), "B".to_string(), "C".to_string()]);
        let renamed = matrix().rename_samples(meta.sample_ids().to_vec()).unwrap();
        let store = CountMatrixStore::new(renamed, meta).unwrap();
        assert_eq!(store.count("g1", "C"), Some(5));
    }

    #[test]
    fn test_subset_recomputes_library_sizes() {
        let store = CountMatrixStore::new(matrix(), SampleMetadata::new(sample_ids())).unwrap();
        let sub = store.subset_genes(&[1]).unwrap();
        assert_eq!(sub.library_sizes(), &[20, 3, 0]);
        assert_eq!(store.library_sizes(), &[30, 3, 5]);

        let swapped = store.subset_samples(&[2, 0]).unwrap();
        assert_eq!(swapped.sample_ids(), &["s3", "s1"]);
        assert_eq!(swapped.library_sizes(), &[5, 30]);
    }
}
