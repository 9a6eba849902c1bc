//! Regularized log transformation
//!
//! Each gene is refit with an intercept plus one coefficient per sample,
//! ridge-penalised toward the gene's mean. The prior variance comes from
//! the weighted upper quantile of per-sample log fold changes from the mean.

use ndarray::{Array2, ArrayView1};

use super::HEATMAP_INPUT;
use crate::error::{ReportError, Result};
use crate::glm::{fit_all_genes, sample_indicator_design, GlmFitParams};
use crate::stats::match_weighted_upper_quantile_for_variance;

/// rlog of raw `counts` (genes x samples) using trended dispersions
pub fn rlog(counts: &Array2<f64>, size_factors: &[f64], trended_dispersions: &[f64]) -> Result<Array2<f64>> {
    let (n_genes, n_samples) = counts.dim();
    if n_genes == 0 || n_samples == 0 {
        return Err(ReportError::render(HEATMAP_INPUT, "rlog needs a non-empty count matrix"));
    }
    if size_factors.len() != n_samples || trended_dispersions.len() != n_genes {
        return Err(ReportError::render(HEATMAP_INPUT, "rlog inputs do not match the count matrix"));
    }

    let normalized = Array2::from_shape_fn((n_genes, n_samples), |(i, j)| counts[[i, j]] / size_factors[j]);
    let base_means: Vec<f64> = normalized.rows().into_iter().map(|r| r.sum() / n_samples as f64).collect();

    let mut lfcs = Vec::with_capacity(n_genes * n_samples);
    let mut weights = Vec::with_capacity(n_genes * n_samples);
    for (i, row) in normalized.rows().into_iter().enumerate() {
        let bm = base_means[i];
        if bm <= 0.0 {
            continue;
        }
        let w = 1.0 / (1.0 / bm + trended_dispersions[i]);
        let log_bm = (bm + 0.5).log2();
        for &q in row.iter() {
            lfcs.push((q + 0.5).log2() - log_bm);
            weights.push(w);
        }
    }
    if lfcs.is_empty() {
        return Err(ReportError::render(HEATMAP_INPUT, "rlog: every gene has zero counts"));
    }
    let beta_prior_var = match_weighted_upper_quantile_for_variance(&lfcs, &weights, 0.05);
    log::debug!("rlog beta prior variance {:.6}", beta_prior_var);

    let ln2_sq = std::f64::consts::LN_2.powi(2);
    let mut lambda = vec![1.0 / beta_prior_var / ln2_sq; n_samples + 1];
    lambda[0] = 1e-6 / ln2_sq;

    let design = sample_indicator_design(n_samples);
    let fits = fit_all_genes(
        counts.view(),
        &design,
        ArrayView1::from(size_factors),
        trended_dispersions,
        &lambda,
        &GlmFitParams::default(),
    );

    let ln2 = std::f64::consts::LN_2;
    let mut out = Array2::zeros((n_genes, n_samples));
    for (i, fit) in fits.iter().enumerate() {
        for j in 0..n_samples {
            out[[i, j]] = (fit.coefficients[0] + fit.coefficients[j + 1]) / ln2;
        }
    }
    if out.iter().any(|v: &f64| !v.is_finite()) {
        return Err(ReportError::render(HEATMAP_INPUT, "rlog produced non-finite values"));
    }
    Ok(out)
}
