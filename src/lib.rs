//! rust_countqc: RNA-seq count normalization and sample-level QC
//!
//! Turns a gene x sample integer count matrix into counts per million,
//! filters out genes that are not expressed, computes leading log-fold-change
//! distances between samples and embeds them by classical multidimensional
//! scaling.
//!
//! # Example
//!
//! ```ignore
//! use rust_countqc::prelude::*;
//!
//! let counts = read_count_matrix("counts.tsv", &CountTableOptions::default())?;
//! let metadata = read_metadata("samples.csv")?;
//! let store = CountMatrixStore::new(counts, metadata)?;
//!
//! let params = QcParams::new(FilterParams { threshold: 0.5, min_samples: 2 });
//! let run = run_qc(&store, &params)?;
//! println!("{}", run.report(&store));
//! ```

pub mod cli;
pub mod data;
pub mod distance;
pub mod error;
pub mod filter;
pub mod io;
pub mod mds;
pub mod normalization;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::data::{CountMatrix, CountMatrixStore, SampleMetadata};
    pub use crate::distance::{pairwise_distance, DistanceMatrix, DistanceParams, GeneSelection};
    pub use crate::error::{CountQcError, Result};
    pub use crate::filter::{filter_expressed, FilterMask, FilterOutcome, FilterParams};
    pub use crate::io::{read_count_matrix, read_metadata, CountTableOptions, QcReport};
    pub use crate::mds::{embed, EmbeddingResult, MdsParams};
    pub use crate::normalization::{normalize, NormalizeParams, NormalizedMatrix, Scale};
    pub use crate::{run_qc, QcParams, QcRun};
}

use log::info;
use prelude::*;

/// Parameters for the full QC pipeline
#[derive(Debug, Clone)]
pub struct QcParams {
    pub filter: FilterParams,
    pub distance: DistanceParams,
    pub mds: MdsParams,
}

impl QcParams {
    /// Default distance and MDS settings around caller-chosen filter settings
    pub fn new(filter: FilterParams) -> Self {
        Self {
            filter,
            distance: DistanceParams::default(),
            mds: MdsParams::default(),
        }
    }
}

/// Every intermediate artifact of one QC run
#[derive(Debug, Clone)]
pub struct QcRun {
    /// Counts per million over all genes
    pub normalized: NormalizedMatrix,
    pub mask: FilterMask,
    pub distances: DistanceMatrix,
    pub embedding: EmbeddingResult,
}

impl QcRun {
    /// Summarize the run for the samples of `store`
    pub fn report(&self, store: &CountMatrixStore) -> QcReport {
        let metadata = store.metadata();
        let attributes = metadata
            .condition_names()
            .into_iter()
            .filter_map(|name| metadata.condition(name).map(|v| (name.to_string(), v.clone())))
            .collect();

        QcReport {
            sample_ids: store.sample_ids().to_vec(),
            library_sizes: store.library_sizes().to_vec(),
            attributes,
            genes_total: self.mask.len(),
            genes_retained: self.mask.n_retained(),
            filter_threshold: self.mask.params().threshold,
            filter_min_samples: self.mask.params().min_samples,
            gene_selection: self.distances.selection(),
            requested_top: self.distances.requested_top(),
            effective_top: self.distances.effective_top(),
            distances: self
                .distances
                .values()
                .outer_iter()
                .map(|row| row.to_vec())
                .collect(),
            embedding: self.embedding.clone(),
        }
    }
}

/// Run normalization, filtering, distance computation and MDS.
///
/// Filtering is applied to counts per million; distances are computed on
/// log2(cpm + `params.distance.pseudocount`). An empty filter outcome ends
/// the run with `EmptyResult`.
pub fn run_qc(store: &CountMatrixStore, params: &QcParams) -> Result<QcRun> {
    info!(
        "Normalizing {} genes x {} samples to counts per million...",
        store.n_genes(),
        store.n_samples()
    );
    let normalized = normalize(store, &NormalizeParams::default())?;

    info!("Filtering lowly expressed genes...");
    let mask = filter_expressed(&normalized, &params.filter)?.into_result()?;

    info!("Computing leading fold-change distances (top {})...", params.distance.top);
    let distances = pairwise_distance(&normalized, &mask, &params.distance)?;

    info!("Embedding samples in {} dimensions...", params.mds.dimensions);
    let embedding = embed(&distances, &params.mds)?;

    Ok(QcRun {
        normalized,
        mask,
        distances,
        embedding,
    })
}
