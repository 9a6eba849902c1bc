//! Negative binomial GLM engine with Wald testing

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::{select_coefficient, DeAnalysis, DeseqLikeEngine, NormalizationContext};
use crate::data::{CountMatrix, SampleMetadata};
use crate::dispersion::{estimate_dispersions, DispersionParams};
use crate::error::{ReportError, Result};
use crate::filter::independent_filtering;
use crate::glm::{build_group_design, default_ridge, fit_all_genes, GlmFitParams};
use crate::io::{DeResult, DeRow};
use crate::normalization::{estimate_size_factors, normalized_counts};
use crate::shrinkage::{apply_shrinkage_chain, ShrinkageInput, ShrinkageStrategy};
use crate::testing::wald_test;

/// Genes whose total count does not exceed this are dropped before fitting
const MIN_TOTAL_COUNT: f64 = 1.0;

/// Tunables of the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineParams {
    /// Target FDR for independent filtering
    pub alpha: f64,
    pub dispersion: DispersionParams,
    pub glm: GlmFitParams,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            alpha: 0.05,
            dispersion: DispersionParams::default(),
            glm: GlmFitParams::default(),
        }
    }
}

/// The `~ group` negative binomial model with a shrinkage fallback chain
pub struct NegativeBinomialEngine {
    pub params: EngineParams,
    pub shrinkage: Vec<Box<dyn ShrinkageStrategy>>,
}

impl NegativeBinomialEngine {
    pub fn new(params: EngineParams, shrinkage: Vec<Box<dyn ShrinkageStrategy>>) -> Self {
        Self { params, shrinkage }
    }
}

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

impl DeseqLikeEngine for NegativeBinomialEngine {
    fn run(&self, counts: &CountMatrix, metadata: &SampleMetadata) -> Result<DeAnalysis> {
        if counts.sample_ids() != metadata.sample_ids() {
            return Err(ReportError::model_fit("count matrix columns are not aligned to the metadata"));
        }
        let design = build_group_design(metadata)?;

        let keep: Vec<usize> = counts
            .gene_totals()
            .iter()
            .enumerate()
            .filter(|(_, &t)| t > MIN_TOTAL_COUNT)
            .map(|(i, _)| i)
            .collect();
        if keep.is_empty() {
            return Err(ReportError::model_fit(format!(
                "no genes with a total count above {}",
                MIN_TOTAL_COUNT
            )));
        }
        log::info!(
            "pre-filter kept {} of {} genes",
            keep.len(),
            counts.n_genes()
        );
        let filtered = counts.select_genes(&keep);
        let raw: Array2<f64> = filtered.counts().to_owned();

        let size_factors = estimate_size_factors(raw.view())?;
        log::info!("size factors: {:?}", size_factors.to_vec());
        let normalized = normalized_counts(raw.view(), &size_factors);
        let n_samples = raw.ncols() as f64;
        let base_means: Vec<f64> = normalized.rows().into_iter().map(|r| r.sum() / n_samples).collect();

        let dispersions = estimate_dispersions(
            &raw,
            &size_factors,
            &base_means,
            &design,
            &self.params.dispersion,
        )?;

        let lambda = vec![default_ridge(); design.n_coefs()];
        let fits = fit_all_genes(
            raw.view(),
            &design.matrix,
            size_factors.view(),
            &dispersions.final_dispersions,
            &lambda,
            &self.params.glm,
        );
        let unconverged = fits.iter().filter(|f| !f.converged).count();
        if unconverged > 0 {
            log::warn!("{} genes did not converge in the GLM fit", unconverged);
        }

        let coef_idx = select_coefficient(&design.coef_names)?;
        let contrast = design.coef_names[coef_idx].clone();
        log::info!("testing coefficient '{}'", contrast);

        let wald = wald_test(&fits, &base_means, coef_idx);
        let filter = independent_filtering(&base_means, &wald.pvalues, self.params.alpha);
        log::info!(
            "independent filtering: cutoff {:.3}, {} rejections at alpha {}",
            filter.cutoff,
            filter.rejections,
            self.params.alpha
        );

        let sf = size_factors.to_vec();
        let shrunk = apply_shrinkage_chain(
            &self.shrinkage,
            &ShrinkageInput {
                counts: &raw,
                design: &design,
                size_factors: &sf,
                dispersions: &dispersions.final_dispersions,
                trended_dispersions: &dispersions.trended,
                base_means: &base_means,
                fits: &fits,
                coef_idx,
                log2_fold_changes: &wald.log2_fold_changes,
                lfc_se: &wald.lfc_se,
            },
        );

        let rows: Vec<DeRow> = filtered
            .gene_ids()
            .iter()
            .enumerate()
            .map(|(i, gene_id)| DeRow {
                gene_id: gene_id.clone(),
                base_mean: base_means[i],
                log2_fold_change: shrunk.effects.log2_fold_changes[i],
                lfc_se: shrunk.effects.lfc_se[i],
                stat: wald.stat[i],
                pvalue: finite(wald.pvalues[i]),
                padj: finite(filter.padj[i]),
            })
            .collect();

        let result = DeResult::new(rows, contrast, shrunk.method);
        let context = NormalizationContext {
            counts: raw,
            gene_ids: filtered.gene_ids().to_vec(),
            sample_ids: filtered.sample_ids().to_vec(),
            size_factors: sf,
            trend: dispersions.trend,
            trended_dispersions: dispersions.trended,
        };
        Ok(DeAnalysis { result, context })
    }
}
