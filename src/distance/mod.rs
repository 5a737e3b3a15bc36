//! Pairwise sample distances from normalized, filtered expression

mod leading_fc;
mod matrix;

pub use leading_fc::{pairwise_distance, DistanceParams, GeneSelection};
pub use matrix::{DistanceMatrix, GeneShortfall};
