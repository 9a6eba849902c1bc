//! de_report: differential expression reporting in Rust
//!
//! Takes a gene-by-sample count matrix and a sample/group table, tests every
//! gene with a negative binomial model, ranks the results, runs gene-set
//! over-representation on the significant genes, and writes a fixed set of
//! figures plus a combined report.
//!
//! # Example
//!
//! ```ignore
//! use de_report::prelude::*;
//!
//! let config = PipelineConfig::default();
//! let outputs = run_report("counts.tsv", "metadata.tsv", "results", &config)?;
//! for path in outputs.paths() {
//!     println!("{}", path.display());
//! }
//! ```

pub mod cli;
pub mod config;
pub mod data;
pub mod dispersion;
pub mod engine;
pub mod enrichment;
pub mod error;
pub mod filter;
pub mod glm;
pub mod io;
pub mod normalization;
pub mod pipeline;
pub mod ranking;
pub mod render;
pub mod report;
pub mod shrinkage;
pub mod simulate;
pub mod stats;
pub mod testing;
pub mod transform;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{CapabilityRegistry, PipelineConfig, ShrinkageKind};
    pub use crate::data::{CountMatrix, SampleMetadata};
    pub use crate::dispersion::{estimate_dispersions, DispersionParams};
    pub use crate::engine::{DeAnalysis, DeseqLikeEngine, EngineParams, NegativeBinomialEngine};
    pub use crate::enrichment::{run_enrichment, EnrichmentBackend, GeneSetBackend, Ontology};
    pub use crate::error::{ReportError, Result};
    pub use crate::filter::independent_filtering;
    pub use crate::glm::GlmFitParams;
    pub use crate::io::{load_inputs, read_count_matrix, read_metadata, write_gene_table, DeResult, DeRow};
    pub use crate::normalization::estimate_size_factors;
    pub use crate::pipeline::{Pipeline, PipelineOutputs};
    pub use crate::ranking::RankingPolicy;
    pub use crate::render::{ArtifactKind, ArtifactOutcome};
    pub use crate::shrinkage::{AshrShrinkage, NormalShrinkage, ShrinkageStrategy};
    pub use crate::simulate::{simulate_counts, SimulationParams};
    pub use crate::testing::{benjamini_hochberg, wald_test};
    pub use crate::transform::{rlog, vst};
}

use std::path::Path;

use prelude::*;

/// Run the complete report pipeline with capabilities resolved from `config`
pub fn run_report<P, Q, R>(counts: P, metadata: Q, out_dir: R, config: &PipelineConfig) -> Result<PipelineOutputs>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
    R: AsRef<Path>,
{
    Pipeline::from_config(config).run(counts.as_ref(), metadata.as_ref(), out_dir.as_ref())
}
