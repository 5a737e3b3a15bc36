//! Scale normalization of raw count data

mod cpm;

pub use cpm::{normalize, NormalizeParams, NormalizedMatrix, Scale, PER_MILLION};
