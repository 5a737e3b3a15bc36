//! Command-line interface for rust_countqc

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "rust_countqc")]
#[command(version)]
#[command(about = "RNA-seq count normalization, expression filtering and MDS sample QC")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Number of threads (0 = auto) [default: 0]
    #[arg(short = 't', long, global = true, default_value = "0")]
    pub threads: usize,
}

/// Count table and metadata inputs shared by the subcommands
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Path to count table
    #[arg(short, long,
        long_help = "Path to count table.\n\
            Format: first column = gene IDs, remaining columns = raw integer counts per sample.\n\
            Tab or comma delimited (auto-detected); lines starting with '#' are skipped.")]
    pub counts: String,

    /// Path to sample metadata
    #[arg(short, long,
        long_help = "Path to sample metadata.\n\
            Format: first column = sample IDs in the same order as the count columns,\n\
            remaining columns = categorical attributes (e.g. group, batch).\n\
            Without metadata the count table header is used as is.")]
    pub metadata: Option<String>,

    /// Auxiliary column to drop from the count table
    #[arg(long = "drop-column", value_name = "NAME",
        long_help = "Auxiliary column to drop before parsing counts.\n\
            Can be specified multiple times: --drop-column Chr --drop-column Length")]
    pub drop_columns: Vec<String>,

    /// Rename count columns to the metadata sample IDs by position
    #[arg(long,
        long_help = "Replace the count table's column names with the metadata sample IDs,\n\
            position by position. Useful when the header holds BAM paths.\n\
            Columns are never reordered.")]
    pub rename_by_position: bool,
}

/// Expression filter settings
#[derive(Args, Debug, Clone)]
pub struct FilterArgs {
    /// Counts-per-million threshold a sample must exceed
    #[arg(long,
        long_help = "Counts-per-million threshold.\n\
            A gene is expressed in a sample when its CPM is strictly above this value.\n\
            A CPM matching roughly 10-15 reads at your library depth is a common choice.")]
    pub threshold: f64,

    /// Minimum number of expressing samples
    #[arg(long, value_name = "N",
        long_help = "Minimum number of samples that must express a gene for it to be kept.\n\
            Usually the size of the smallest group. Required unless --group is given.")]
    pub min_samples: Option<usize>,

    /// Metadata attribute whose smallest group sets --min-samples
    #[arg(long, value_name = "ATTRIBUTE")]
    pub group: Option<String>,
}

/// Leading fold-change distance settings
#[derive(Args, Debug, Clone)]
pub struct DistanceArgs {
    /// Number of leading genes per sample pair [default: 500]
    #[arg(long, default_value = "500")]
    pub top: usize,

    /// Gene selection [default: pairwise]
    #[arg(long, default_value = "pairwise",
        long_help = "How leading genes are chosen.\n\
            pairwise: top genes chosen separately for each pair of samples (default)\n\
            common:   one set of top genes by variance, shared by all pairs")]
    pub gene_selection: String,

    /// Pseudocount for log2(cpm + pseudocount) [default: 1.0]
    #[arg(long, default_value = "1.0")]
    pub pseudocount: f64,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Normalize counts to counts per million
    #[command(
        long_about = "Normalize counts to counts per million (CPM).\n\n\
            Each count is scaled by 1e6 / library size of its sample.\n\
            With --log, values are log2(cpm + pseudocount).",
        after_long_help = "\
Examples:
  rust_countqc normalize -c counts.tsv -o cpm.tsv
  rust_countqc normalize -c counts.tsv --drop-column Length --log -o logcpm.tsv"
    )]
    Normalize {
        #[command(flatten)]
        input: InputArgs,

        /// Output file path [default: normalized.tsv]
        #[arg(short, long, default_value = "normalized.tsv")]
        output: String,

        /// Output log2(cpm + pseudocount)
        #[arg(long)]
        log: bool,

        /// Pseudocount added before the log [default: 1.0]
        #[arg(long, default_value = "1.0")]
        pseudocount: f64,
    },

    /// Keep genes expressed in enough samples
    #[command(
        after_long_help = "\
Examples:
  rust_countqc filter -c counts.tsv --threshold 0.5 --min-samples 2 -o expressed.tsv
  rust_countqc filter -c counts.tsv -m samples.csv --threshold 0.5 --group condition"
    )]
    Filter {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        filter: FilterArgs,

        /// Output file path for the filtered CPM matrix [default: filtered.tsv]
        #[arg(short, long, default_value = "filtered.tsv")]
        output: String,
    },

    /// Compute leading fold-change distances between samples
    Distance {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        filter: FilterArgs,

        #[command(flatten)]
        distance: DistanceArgs,

        /// Output file path [default: distances.tsv]
        #[arg(short, long, default_value = "distances.tsv")]
        output: String,
    },

    /// Embed a precomputed distance matrix by classical MDS
    Mds {
        /// Path to a square distance matrix (as written by `distance`)
        #[arg(short, long)]
        distances: String,

        /// Number of dimensions [default: 2]
        #[arg(short = 'k', long, default_value = "2")]
        dimensions: usize,

        /// Output file path [default: embedding.tsv]
        #[arg(short, long, default_value = "embedding.tsv")]
        output: String,
    },

    /// Run normalization, filtering, distances and MDS in one go
    #[command(
        long_about = "Run the full sample QC pipeline.\n\n\
            Writes <prefix>.cpm.tsv, <prefix>.distances.tsv, <prefix>.embedding.tsv\n\
            and <prefix>.report.json.",
        after_long_help = "\
Examples:
  rust_countqc qc -c counts.tsv -m samples.csv --threshold 0.5 --group condition -o qc
  rust_countqc qc -c featurecounts.txt -m samples.csv --drop-column Length \\
    --rename-by-position --threshold 0.5 --min-samples 2 --top 1000 -k 3"
    )]
    Qc {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        filter: FilterArgs,

        #[command(flatten)]
        distance: DistanceArgs,

        /// Number of MDS dimensions [default: 2]
        #[arg(short = 'k', long, default_value = "2")]
        dimensions: usize,

        /// Output prefix [default: countqc]
        #[arg(short, long, default_value = "countqc")]
        output: String,
    },
}
