//! Error types for rust_countqc

use thiserror::Error;

/// Main error type for count QC operations
#[derive(Error, Debug)]
pub enum CountQcError {
    #[error("Schema mismatch: {reason}")]
    SchemaMismatch { reason: String },

    #[error("Invalid count at gene '{gene_id}', sample '{sample_id}': {value}")]
    InvalidCount {
        gene_id: String,
        sample_id: String,
        value: f64,
    },

    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Sample '{sample_id}' has a library size of zero; normalization is undefined")]
    DegenerateLibrary { sample_id: String },

    #[error("Empty result: {reason}")]
    EmptyResult { reason: String },

    #[error("Insufficient genes: requested top {requested}, only {available} retained")]
    InsufficientGenes { requested: usize, available: usize },

    #[error(
        "Eigenvalue {eigenvalue:.6e} for dimension {dimension} is negative; \
         distances are not embeddable in {dimension} real dimensions"
    )]
    NegativeEigenvalue { dimension: usize, eigenvalue: f64 },

    #[error("Numerical instability in {operation}: {details}")]
    NumericalInstability { operation: String, details: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },
}

impl CountQcError {
    pub(crate) fn invalid_parameter(name: &str, reason: impl Into<String>) -> Self {
        CountQcError::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn schema(reason: impl Into<String>) -> Self {
        CountQcError::SchemaMismatch {
            reason: reason.into(),
        }
    }
}

/// Result type alias for count QC operations
pub type Result<T> = std::result::Result<T, CountQcError>;
