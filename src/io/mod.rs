//! Input/Output for count tables, metadata and QC results

mod csv;
mod report;

pub use self::csv::{
    read_count_matrix, read_distance_matrix, read_metadata, write_distances, write_embedding,
    write_normalized, CountTableOptions,
};
pub use report::QcReport;
