//! rust_countqc command-line interface

use clap::Parser;
use log::{info, LevelFilter};

use rust_countqc::cli::{Cli, Commands, DistanceArgs, FilterArgs, InputArgs};
use rust_countqc::io::{read_distance_matrix, write_distances, write_embedding, write_normalized};
use rust_countqc::prelude::*;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    if cli.threads > 0 {
        if let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
        {
            log::warn!("Could not configure {} threads: {}", cli.threads, e);
        }
    }

    let result = match cli.command {
        Some(Commands::Normalize {
            input,
            output,
            log,
            pseudocount,
        }) => run_normalize(&input, &output, log, pseudocount),
        Some(Commands::Filter { input, filter, output }) => run_filter(&input, &filter, &output),
        Some(Commands::Distance {
            input,
            filter,
            distance,
            output,
        }) => run_distance(&input, &filter, &distance, &output),
        Some(Commands::Mds {
            distances,
            dimensions,
            output,
        }) => run_mds(&distances, dimensions, &output),
        Some(Commands::Qc {
            input,
            filter,
            distance,
            dimensions,
            output,
        }) => run_pipeline(&input, &filter, &distance, dimensions, &output),
        None => {
            print_no_args();
            return;
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn print_no_args() {
    println!("rust_countqc v{}", VERSION);
    println!("Run `rust_countqc -h` for usage or `rust_countqc --help` for detailed information.");
}

/// Read the count table and metadata and bind them
fn load_store(input: &InputArgs) -> Result<CountMatrixStore> {
    info!("Loading count table from: {}", input.counts);
    let options = CountTableOptions {
        drop_columns: input.drop_columns.clone(),
    };
    let mut counts = read_count_matrix(&input.counts, &options)?;
    info!("  {} genes, {} samples", counts.n_genes(), counts.n_samples());

    let metadata = match &input.metadata {
        Some(path) => {
            info!("Loading metadata from: {}", path);
            read_metadata(path)?
        }
        None => SampleMetadata::new(counts.sample_ids().to_vec()),
    };

    if input.rename_by_position {
        info!("Renaming count columns to metadata sample IDs by position");
        counts = counts.rename_samples(metadata.sample_ids().to_vec())?;
    }

    let store = CountMatrixStore::new(counts, metadata)?;
    Ok(store)
}

fn filter_params(args: &FilterArgs, store: &CountMatrixStore) -> Result<FilterParams> {
    let min_samples = match (args.min_samples, &args.group) {
        (Some(n), _) => n,
        (None, Some(group)) => {
            let n = store
                .metadata()
                .smallest_group(group)
                .ok_or_else(|| CountQcError::InvalidInput {
                    reason: format!("attribute '{}' not found in metadata", group),
                })?;
            info!("Smallest '{}' group has {} samples; using it as --min-samples", group, n);
            n
        }
        (None, None) => {
            return Err(CountQcError::InvalidInput {
                reason: "either --min-samples or --group is required".to_string(),
            });
        }
    };

    Ok(FilterParams {
        threshold: args.threshold,
        min_samples,
    })
}

fn distance_params(args: &DistanceArgs) -> Result<DistanceParams> {
    Ok(DistanceParams {
        top: args.top,
        selection: args.gene_selection.parse()?,
        pseudocount: args.pseudocount,
    })
}

/// Normalize and filter; an empty filter outcome is an error at the CLI level
fn expressed_genes(
    store: &CountMatrixStore,
    args: &FilterArgs,
) -> Result<(NormalizedMatrix, FilterMask)> {
    let params = filter_params(args, store)?;
    let cpm = normalize(store, &NormalizeParams::default())?;
    let mask = filter_expressed(&cpm, &params)?.into_result()?;
    Ok((cpm, mask))
}

fn run_normalize(input: &InputArgs, output_path: &str, log: bool, pseudocount: f64) -> Result<()> {
    let store = load_store(input)?;

    info!("Normalizing to counts per million (log: {})...", log);
    let normalized = normalize(&store, &NormalizeParams { log, pseudocount })?;

    info!("Writing normalized values to: {}", output_path);
    write_normalized(output_path, &normalized)?;

    info!("Done!");
    Ok(())
}

fn run_filter(input: &InputArgs, filter: &FilterArgs, output_path: &str) -> Result<()> {
    let store = load_store(input)?;
    let (cpm, mask) = expressed_genes(&store, filter)?;

    info!("Writing {} expressed genes to: {}", mask.n_retained(), output_path);
    write_normalized(output_path, &cpm.select(&mask)?)?;

    info!("Done!");
    Ok(())
}

fn run_distance(
    input: &InputArgs,
    filter: &FilterArgs,
    distance: &DistanceArgs,
    output_path: &str,
) -> Result<()> {
    let store = load_store(input)?;
    let (cpm, mask) = expressed_genes(&store, filter)?;

    let params = distance_params(distance)?;
    info!(
        "Computing leading fold-change distances ({:?}, top {})...",
        params.selection, params.top
    );
    let distances = pairwise_distance(&cpm, &mask, &params)?;
    if let Some(shortfall) = distances.shortfall() {
        info!(
            "  used all {} retained genes (fewer than the requested {})",
            shortfall.available, shortfall.requested
        );
    }

    info!("Writing distance matrix to: {}", output_path);
    write_distances(output_path, &distances)?;

    info!("Done!");
    Ok(())
}

fn run_mds(distances_path: &str, dimensions: usize, output_path: &str) -> Result<()> {
    info!("Loading distance matrix from: {}", distances_path);
    let distances = read_distance_matrix(distances_path)?;

    let params = MdsParams {
        dimensions,
        ..MdsParams::default()
    };
    let embedding = embed(&distances, &params)?;

    info!("Writing embedding to: {}", output_path);
    write_embedding(output_path, &embedding, None)?;

    info!("Done!");
    Ok(())
}

fn run_pipeline(
    input: &InputArgs,
    filter: &FilterArgs,
    distance: &DistanceArgs,
    dimensions: usize,
    prefix: &str,
) -> Result<()> {
    let store = load_store(input)?;

    let params = QcParams {
        filter: filter_params(filter, &store)?,
        distance: distance_params(distance)?,
        mds: MdsParams {
            dimensions,
            ..MdsParams::default()
        },
    };

    let run = run_qc(&store, &params)?;
    let report = run.report(&store);

    let cpm_path = format!("{}.cpm.tsv", prefix);
    let distances_path = format!("{}.distances.tsv", prefix);
    let embedding_path = format!("{}.embedding.tsv", prefix);
    let report_path = format!("{}.report.json", prefix);

    info!("Writing results with prefix: {}", prefix);
    write_normalized(&cpm_path, &run.normalized.select(&run.mask)?)?;
    write_distances(&distances_path, &run.distances)?;
    write_embedding(&embedding_path, &run.embedding, Some(store.metadata()))?;
    report.write_json(&report_path)?;

    println!("\n{}", report);
    Ok(())
}
