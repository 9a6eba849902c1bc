//! Normal-prior fold change shrinkage by ridge refit of the GLM
//!
//! The prior variance of each non-intercept coefficient is chosen so that a
//! zero-centred normal matches the weighted upper 5% quantile of the MLE
//! log2 fold changes. The GLM is then refit with the matching ridge penalty.

use ndarray::ArrayView1;

use super::{ShrinkageInput, ShrinkageStrategy, ShrunkEffects};
use crate::error::{ReportError, Result};
use crate::glm::{fit_all_genes, GlmFitParams};
use crate::stats::match_weighted_upper_quantile_for_variance;

/// Prior variances on the log2 scale, one per coefficient (intercept first).
///
/// Weights are 1 / (1/baseMean + trended dispersion); genes with zero
/// baseMean or |beta| >= 10 are ignored.
pub fn estimate_beta_prior_variance(input: &ShrinkageInput, upper_quantile: f64) -> Result<Vec<f64>> {
    let p = input.design.n_coefs();
    let nonzero: Vec<usize> = (0..input.base_means.len())
        .filter(|&i| input.base_means[i] > 0.0)
        .collect();
    if nonzero.is_empty() {
        return Err(ReportError::unavailable("normal", "every gene has zero mean"));
    }

    let log2_e = std::f64::consts::LOG2_E;
    let mut prior_var = vec![1e6; p];
    for (k, var) in prior_var.iter_mut().enumerate().skip(1) {
        let mut betas = Vec::with_capacity(nonzero.len());
        let mut weights = Vec::with_capacity(nonzero.len());
        for &i in &nonzero {
            let beta = input.fits[i].coefficients.get(k).copied().unwrap_or(f64::NAN) * log2_e;
            if beta.is_finite() && beta.abs() < 10.0 {
                betas.push(beta);
                weights.push(1.0 / (1.0 / input.base_means[i] + input.trended_dispersions[i]));
            }
        }
        if betas.is_empty() {
            return Err(ReportError::unavailable(
                "normal",
                format!("no finite estimates for coefficient {}", input.design.coef_names[k]),
            ));
        }
        *var = match_weighted_upper_quantile_for_variance(&betas, &weights, upper_quantile);
    }
    log::debug!("beta prior variances: {:?}", prior_var);
    Ok(prior_var)
}

/// Ridge-refit shrinkage with a fitted normal prior
#[derive(Debug, Clone)]
pub struct NormalShrinkage {
    pub upper_quantile: f64,
    pub glm: GlmFitParams,
}

impl Default for NormalShrinkage {
    fn default() -> Self {
        Self {
            upper_quantile: 0.05,
            glm: GlmFitParams::default(),
        }
    }
}

impl ShrinkageStrategy for NormalShrinkage {
    fn name(&self) -> &'static str {
        "normal"
    }

    fn shrink(&self, input: &ShrinkageInput) -> Result<ShrunkEffects> {
        let prior_var = estimate_beta_prior_variance(input, self.upper_quantile)?;
        let ln2 = std::f64::consts::LN_2;
        let ln2_sq = ln2 * ln2;
        let mut lambda: Vec<f64> = prior_var.iter().map(|v| 1.0 / v / ln2_sq).collect();
        lambda[0] = 1e-6 / ln2_sq;

        let fits = fit_all_genes(
            input.counts.view(),
            &input.design.matrix,
            ArrayView1::from(input.size_factors),
            input.dispersions,
            &lambda,
            &self.glm,
        );

        let mut effects = ShrunkEffects {
            log2_fold_changes: input.log2_fold_changes.to_vec(),
            lfc_se: input.lfc_se.to_vec(),
        };
        for (i, fit) in fits.iter().enumerate() {
            if input.base_means[i] == 0.0 {
                continue;
            }
            effects.log2_fold_changes[i] = fit.coefficients[input.coef_idx] / ln2;
            effects.lfc_se[i] = fit.standard_errors[input.coef_idx] / ln2;
        }
        Ok(effects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shrinkage::tests::Fixture;

    #[test]
    fn test_prior_variance_per_coefficient() {
        let fx = Fixture::new();
        let var = estimate_beta_prior_variance(&fx.input(), 0.05).unwrap();
        assert_eq!(var.len(), 2);
        assert_eq!(var[0], 1e6);
        assert!(var[1] > 0.0 && var[1].is_finite());
    }

    #[test]
    fn test_normal_shrinkage_pulls_toward_zero() {
        let fx = Fixture::new();
        let effects = NormalShrinkage::default().shrink(&fx.input()).unwrap();
        for (shrunk, mle) in effects.log2_fold_changes.iter().zip(&fx.lfc) {
            assert!(shrunk.abs() <= mle.abs() + 1e-4, "{} vs {}", shrunk, mle);
        }
    }

    #[test]
    fn test_all_zero_means_unavailable() {
        let fx = Fixture::new();
        let zeros = vec![0.0; 30];
        let mut input = fx.input();
        input.base_means = &zeros;
        assert!(matches!(
            estimate_beta_prior_variance(&input, 0.05),
            Err(ReportError::CapabilityUnavailable { .. })
        ));
    }
}
