//! Data structures for count QC: raw counts, sample metadata and their binding

mod count_matrix;
mod metadata;
mod store;

pub(crate) use count_matrix::is_whole_count;
pub use count_matrix::CountMatrix;
pub use metadata::SampleMetadata;
pub use store::CountMatrixStore;
