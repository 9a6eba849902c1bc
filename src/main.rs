//! de_report command-line interface

use std::path::{Path, PathBuf};

use clap::Parser;
use log::{info, LevelFilter};

use de_report::cli::{Cli, Commands};
use de_report::config::parse_shrinkage_list;
use de_report::io::{write_count_matrix, write_metadata};
use de_report::prelude::*;
use de_report::simulate::read_gene_list;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() {
    if std::env::args().len() == 1 {
        print_no_args();
        return;
    }

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

    let result = match cli.command {
        Commands::Run {
            counts,
            metadata,
            output,
            config,
            symbols,
            go_gmt,
            kegg_gmt,
            shrinkage,
            threads,
        } => run_report_command(RunArgs {
            counts,
            metadata,
            output,
            config,
            symbols,
            go_gmt,
            kegg_gmt,
            shrinkage,
            threads,
        }),
        Commands::Simulate {
            n_genes,
            n_ctrl,
            n_trt,
            de_prop,
            fold_change,
            dispersion,
            seed,
            output,
            genes_file,
            metadata_output,
        } => run_simulate(
            &SimulationParams {
                n_genes,
                n_ctrl,
                n_trt,
                de_prop,
                fold_change,
                dispersion,
                seed,
            },
            &output,
            genes_file.as_deref(),
            metadata_output.as_deref(),
        ),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn print_no_args() {
    println!("de_report v{}", VERSION);
    println!("Run `de_report -h` for usage or `de_report --help` for detailed information.");
}

struct RunArgs {
    counts: PathBuf,
    metadata: PathBuf,
    output: PathBuf,
    config: Option<PathBuf>,
    symbols: Option<PathBuf>,
    go_gmt: Option<PathBuf>,
    kegg_gmt: Option<PathBuf>,
    shrinkage: Option<String>,
    threads: Option<usize>,
}

fn run_report_command(args: RunArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            PipelineConfig::from_json_file(path)?
        }
        None => PipelineConfig::default(),
    };

    // Flags win over the configuration file
    if args.symbols.is_some() {
        config.symbols = args.symbols;
    }
    if args.go_gmt.is_some() {
        config.go_gmt = args.go_gmt;
    }
    if args.kegg_gmt.is_some() {
        config.kegg_gmt = args.kegg_gmt;
    }
    if let Some(list) = &args.shrinkage {
        config.shrinkage = parse_shrinkage_list(list)?;
    }
    if let Some(threads) = args.threads {
        config.threads = threads;
    }

    if config.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .build_global()
            .ok();
    }

    let outputs = de_report::run_report(&args.counts, &args.metadata, &args.output, &config)?;

    let placeholders = outputs.artifacts.iter().filter(|a| a.is_placeholder()).count();
    info!("Contrast: {} (shrinkage: {})", outputs.result.contrast, outputs.result.shrinkage);
    info!(
        "Figures: {} drawn, {} placeholders",
        outputs.artifacts.len() - placeholders,
        placeholders
    );
    for path in outputs.paths() {
        println!("{}", path.display());
    }
    Ok(())
}

fn run_simulate(
    params: &SimulationParams,
    output: &Path,
    genes_file: Option<&Path>,
    metadata_output: Option<&Path>,
) -> Result<()> {
    let genes = genes_file.map(read_gene_list).transpose()?;
    let sim = simulate_counts(params, genes)?;

    write_count_matrix(output, &sim.counts)?;
    info!("Simulation complete. File saved to: {}", output.display());

    if let Some(path) = metadata_output {
        write_metadata(path, &sim.metadata)?;
        info!("Metadata saved to: {}", path.display());
    }
    Ok(())
}
