//! Differential expression engine
//!
//! The pipeline only talks to the [`DeseqLikeEngine`] trait. The concrete
//! [`NegativeBinomialEngine`] chains size factors, dispersion estimation,
//! the GLM fit, the Wald test, independent filtering and fold change
//! shrinkage.

mod contrast;
mod negative_binomial;

pub use contrast::select_coefficient;
pub use negative_binomial::{EngineParams, NegativeBinomialEngine};

use ndarray::Array2;

use crate::data::{CountMatrix, SampleMetadata};
use crate::dispersion::DispersionTrend;
use crate::error::Result;
use crate::io::DeResult;
use crate::transform::TransformInput;

/// Model state kept for downstream transforms (heatmap normalization)
#[derive(Debug, Clone)]
pub struct NormalizationContext {
    /// Raw counts of the genes that passed pre-filtering
    pub counts: Array2<f64>,
    pub gene_ids: Vec<String>,
    pub sample_ids: Vec<String>,
    pub size_factors: Vec<f64>,
    pub trend: DispersionTrend,
    pub trended_dispersions: Vec<f64>,
}

impl NormalizationContext {
    pub fn transform_input(&self) -> TransformInput<'_> {
        TransformInput {
            counts: &self.counts,
            size_factors: &self.size_factors,
            trend: &self.trend,
            trended_dispersions: &self.trended_dispersions,
        }
    }

    pub fn gene_index(&self, gene_id: &str) -> Option<usize> {
        self.gene_ids.iter().position(|g| g == gene_id)
    }
}

/// Output of one engine run
#[derive(Debug, Clone)]
pub struct DeAnalysis {
    pub result: DeResult,
    pub context: NormalizationContext,
}

/// Fits a differential expression model to aligned counts and metadata
pub trait DeseqLikeEngine: Send + Sync {
    /// Errors are `ModelFit` and fatal to the run.
    fn run(&self, counts: &CountMatrix, metadata: &SampleMetadata) -> Result<DeAnalysis>;
}
