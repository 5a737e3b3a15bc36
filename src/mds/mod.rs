//! Low-dimensional sample embedding from a distance matrix

mod classical;
mod eigen;

pub use classical::{embed, EmbeddingResult, MdsParams};
pub use eigen::{symmetric_eigen, SymmetricEigen};
