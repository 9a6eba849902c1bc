//! Command-line interface for de_report

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "de_report")]
#[command(version)]
#[command(about = "Differential expression report: testing, ranking, enrichment and figures")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full report pipeline
    #[command(
        long_about = "Run the full report pipeline\n\n\
            Fits a negative binomial model on the `group` column of the metadata,\n\
            tests the selected coefficient, shrinks fold changes, writes the\n\
            top-genes table, draws the heatmap, volcano and enrichment dot-plots,\n\
            and assembles them into combined_figures.svg.\n\n\
            Missing enrichment resources or empty gene sets never fail the run:\n\
            the affected figures are written as placeholders.",
        after_long_help = "\
Examples:
  # Basic run
  de_report run counts.tsv metadata.tsv -o results

  # With enrichment resources
  de_report run counts.tsv metadata.tsv -o results \\
    --symbols symbol2entrez.tsv --go-gmt go_bp.gmt --kegg-gmt kegg.gmt

  # Normal prior only, settings from a JSON file
  de_report run counts.tsv metadata.tsv --config settings.json --shrinkage normal"
    )]
    Run {
        /// Count matrix TSV (first column gene ids, one column per sample)
        counts: PathBuf,

        /// Sample metadata TSV
        #[arg(long_help = "Sample metadata TSV.\n\
            Must contain `sample` and `group` columns; other columns are ignored.\n\
            Every listed sample must be a column of the count matrix.")]
        metadata: PathBuf,

        /// Results directory [default: results]
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// JSON configuration file
        #[arg(long, value_name = "FILE",
            long_help = "JSON configuration file.\n\
                Any field may be omitted and keeps its default. Flags given on the\n\
                command line override values from the file.")]
        config: Option<PathBuf>,

        /// Symbol to Entrez id table (TSV with `symbol` and `entrez_id`)
        #[arg(long, value_name = "FILE")]
        symbols: Option<PathBuf>,

        /// GO biological process gene sets (GMT)
        #[arg(long, value_name = "FILE")]
        go_gmt: Option<PathBuf>,

        /// KEGG pathway gene sets (GMT)
        #[arg(long, value_name = "FILE")]
        kegg_gmt: Option<PathBuf>,

        /// Shrinkage methods in fallback order [default: ashr,normal]
        #[arg(long, value_name = "LIST",
            long_help = "Fold change shrinkage methods, tried in order until one succeeds.\n\
                ashr:    adaptive shrinkage with a normal mixture prior\n\
                normal:  zero-centred normal prior refit\n\
                An empty list keeps the unshrunk estimates.")]
        shrinkage: Option<String>,

        /// Number of threads (0 = auto) [default: 0]
        #[arg(short = 't', long)]
        threads: Option<usize>,
    },

    /// Simulate a negative binomial count matrix
    #[command(
        long_about = "Simulate a negative binomial count matrix.\n\n\
            Baseline means are uniform in [50, 2000). A fraction of genes is\n\
            differentially expressed: half are multiplied by the fold change in\n\
            the treated group, half are divided by it.",
        after_long_help = "\
Examples:
  de_report simulate --n-genes 2000 --seed 1 --output counts.tsv --metadata-output metadata.tsv"
    )]
    Simulate {
        /// Number of genes [default: 18000]
        #[arg(long, default_value = "18000")]
        n_genes: usize,

        /// Number of control samples [default: 5]
        #[arg(long, default_value = "5")]
        n_ctrl: usize,

        /// Number of treated samples [default: 5]
        #[arg(long, default_value = "5")]
        n_trt: usize,

        /// Proportion of differentially expressed genes [default: 0.1]
        #[arg(long, default_value = "0.1")]
        de_prop: f64,

        /// Fold change of differentially expressed genes [default: 4]
        #[arg(long, default_value = "4.0")]
        fold_change: f64,

        /// Negative binomial dispersion [default: 0.3]
        #[arg(long, default_value = "0.3")]
        dispersion: f64,

        /// Random seed [default: 42]
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Output count matrix [default: simulated_counts.tsv]
        #[arg(short, long, default_value = "simulated_counts.tsv")]
        output: PathBuf,

        /// File with one gene name per line
        #[arg(long, value_name = "FILE")]
        genes_file: Option<PathBuf>,

        /// Also write a matching `sample`/`group` metadata table
        #[arg(long, value_name = "FILE")]
        metadata_output: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "de_report", "run", "c.tsv", "m.tsv", "-o", "out", "--shrinkage", "normal", "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Run { counts, output, shrinkage, threads, .. } => {
                assert_eq!(counts, PathBuf::from("c.tsv"));
                assert_eq!(output, PathBuf::from("out"));
                assert_eq!(shrinkage.as_deref(), Some("normal"));
                assert_eq!(threads, None);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_parse_simulate_defaults() {
        let cli = Cli::try_parse_from(["de_report", "simulate"]).unwrap();
        match cli.command {
            Commands::Simulate { n_genes, fold_change, seed, metadata_output, .. } => {
                assert_eq!(n_genes, 18000);
                assert_eq!(fold_change, 4.0);
                assert_eq!(seed, 42);
                assert!(metadata_output.is_none());
            }
            _ => panic!("expected simulate"),
        }
    }

    #[test]
    fn test_run_requires_inputs() {
        assert!(Cli::try_parse_from(["de_report", "run", "c.tsv"]).is_err());
    }
}
