//! QC report: summary statistics plus the embedding, serializable to JSON

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde::Serialize;

use crate::distance::GeneSelection;
use crate::error::Result;
use crate::mds::EmbeddingResult;

/// Everything a downstream plot or clustering step needs from one QC run
#[derive(Debug, Clone, Serialize)]
pub struct QcReport {
    pub sample_ids: Vec<String>,
    pub library_sizes: Vec<u64>,
    /// Opaque sample attributes (attribute name -> value per sample)
    pub attributes: BTreeMap<String, Vec<String>>,
    pub genes_total: usize,
    pub genes_retained: usize,
    pub filter_threshold: f64,
    pub filter_min_samples: usize,
    pub gene_selection: GeneSelection,
    pub requested_top: usize,
    pub effective_top: usize,
    /// Sample x sample distances, row-major
    pub distances: Vec<Vec<f64>>,
    pub embedding: EmbeddingResult,
}

impl QcReport {
    /// Write the report as pretty-printed JSON
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}

impl std::fmt::Display for QcReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Sample QC Summary")?;
        writeln!(f, "=================")?;
        writeln!(f, "Samples: {}", self.sample_ids.len())?;
        let sizes = &self.library_sizes;
        if let (Some(min), Some(max)) = (sizes.iter().min(), sizes.iter().max()) {
            writeln!(f, "Library sizes: {} - {}", min, max)?;
        }
        writeln!(
            f,
            "Genes retained (value > {} in >= {} samples): {} of {}",
            self.filter_threshold, self.filter_min_samples, self.genes_retained, self.genes_total
        )?;
        write!(f, "Leading genes per pair: {}", self.effective_top)?;
        if self.effective_top < self.requested_top {
            write!(f, " (requested {})", self.requested_top)?;
        }
        writeln!(f)?;
        for (k, (lambda, prop)) in self
            .embedding
            .eigenvalues()
            .iter()
            .zip(self.embedding.proportion_explained())
            .enumerate()
        {
            writeln!(
                f,
                "  dim{}: eigenvalue {:.4}, {:.1}% explained",
                k + 1,
                lambda,
                prop * 100.0
            )?;
        }
        Ok(())
    }
}
