//! Adaptive shrinkage (ashr) of fold changes
//!
//! Effects are modelled as draws from a scale mixture of zero-centred
//! normals on a data-adaptive grid of standard deviations. Mixture weights
//! are fit by EM on the marginal likelihood of the observed estimates, and
//! each gene reports its posterior mean and posterior SD.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{ShrinkageInput, ShrinkageStrategy, ShrunkEffects};
use crate::error::{ReportError, Result};

/// Parameters for the mixture fit
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AshrParams {
    /// Ratio between consecutive grid standard deviations
    pub grid_mult: f64,
    pub max_iter: usize,
    /// Largest change in a mixture weight that counts as converged
    pub tol: f64,
    /// Include a point mass at zero
    pub pointmass: bool,
}

impl Default for AshrParams {
    fn default() -> Self {
        Self {
            grid_mult: std::f64::consts::SQRT_2,
            max_iter: 1000,
            tol: 1e-6,
            pointmass: false,
        }
    }
}

/// Fitted mixture and per-observation posterior summaries
#[derive(Debug, Clone)]
pub struct AshrFit {
    pub posterior_mean: Vec<f64>,
    pub posterior_sd: Vec<f64>,
    pub pi: Vec<f64>,
    pub sigma: Vec<f64>,
}

fn normal_ln_pdf(x: f64, sd: f64) -> f64 {
    let z = x / sd;
    -0.5 * z * z - sd.ln() - 0.5 * (2.0 * std::f64::consts::PI).ln()
}

/// sdmin = min(se)/10, sdmax = 2 sqrt(max(b^2 - se^2)), spaced by `mult`
fn mixture_grid(betahat: &[f64], sebetahat: &[f64], params: &AshrParams) -> Vec<f64> {
    let se_min = sebetahat.iter().copied().fold(f64::INFINITY, f64::min);
    let se_max = sebetahat.iter().copied().fold(0.0_f64, f64::max);
    let sd_min = (se_min / 10.0).max(1e-8);

    let excess = betahat
        .iter()
        .zip(sebetahat)
        .map(|(b, s)| b * b - s * s)
        .fold(f64::NEG_INFINITY, f64::max);
    let sd_max = if excess > 0.0 {
        2.0 * excess.sqrt()
    } else {
        2.0 * se_max
    }
    .max(sd_min * params.grid_mult);

    let mult = params.grid_mult.max(1.0 + 1e-6);
    let steps = ((sd_max / sd_min).ln() / mult.ln()).ceil() as usize;
    let mut sigma: Vec<f64> = if params.pointmass { vec![0.0] } else { Vec::new() };
    sigma.extend((0..=steps).map(|k| sd_max / mult.powi((steps - k) as i32)));
    sigma
}

/// Component log-likelihoods: b ~ N(0, se^2 + sigma_k^2)
fn component_log_likelihoods(betahat: &[f64], sebetahat: &[f64], sigma: &[f64]) -> Vec<Vec<f64>> {
    betahat
        .par_iter()
        .zip(sebetahat)
        .map(|(&b, &se)| {
            sigma
                .iter()
                .map(|&s| normal_ln_pdf(b, (se * se + s * s).sqrt()))
                .collect()
        })
        .collect()
}

/// Posterior component membership for one observation
fn responsibilities(log_lik: &[f64], pi: &[f64]) -> Vec<f64> {
    let terms: Vec<f64> = log_lik
        .iter()
        .zip(pi)
        .map(|(&l, &p)| if p > 0.0 { p.ln() + l } else { f64::NEG_INFINITY })
        .collect();
    let max = terms.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let weights: Vec<f64> = terms.iter().map(|&t| (t - max).exp()).collect();
    let total: f64 = weights.iter().sum();
    weights.into_iter().map(|w| w / total).collect()
}

/// Fit the mixture to finite `(betahat, se)` pairs; other entries get NaN posteriors.
pub fn fit_ashr(betahat: &[f64], sebetahat: &[f64], params: &AshrParams) -> Result<AshrFit> {
    let valid: Vec<usize> = (0..betahat.len())
        .filter(|&i| betahat[i].is_finite() && sebetahat[i].is_finite() && sebetahat[i] > 0.0)
        .collect();
    if valid.is_empty() {
        return Err(ReportError::unavailable("ashr", "no finite fold change estimates"));
    }
    let b: Vec<f64> = valid.iter().map(|&i| betahat[i]).collect();
    let s: Vec<f64> = valid.iter().map(|&i| sebetahat[i]).collect();

    let sigma = mixture_grid(&b, &s, params);
    let k = sigma.len();
    let log_lik = component_log_likelihoods(&b, &s, &sigma);

    let mut pi = vec![1.0 / k as f64; k];
    for iter in 0..params.max_iter {
        let mut next = vec![0.0; k];
        for row in &log_lik {
            for (acc, r) in next.iter_mut().zip(responsibilities(row, &pi)) {
                *acc += r;
            }
        }
        next.iter_mut().for_each(|p| *p /= b.len() as f64);
        let change = pi.iter().zip(&next).map(|(a, c)| (a - c).abs()).fold(0.0, f64::max);
        pi = next;
        if change < params.tol {
            log::debug!("ashr EM converged after {} iterations", iter + 1);
            break;
        }
    }

    let mut posterior_mean = vec![f64::NAN; betahat.len()];
    let mut posterior_sd = vec![f64::NAN; betahat.len()];
    for (idx, &i) in valid.iter().enumerate() {
        let (bi, si) = (b[idx], s[idx]);
        let r = responsibilities(&log_lik[idx], &pi);
        let mut mean = 0.0;
        let mut second = 0.0;
        for (w, &sk) in r.iter().zip(&sigma) {
            if sk == 0.0 {
                continue;
            }
            let var = 1.0 / (1.0 / (si * si) + 1.0 / (sk * sk));
            let m = var * bi / (si * si);
            mean += w * m;
            second += w * (var + m * m);
        }
        posterior_mean[i] = mean;
        posterior_sd[i] = (second - mean * mean).max(0.0).sqrt();
    }

    Ok(AshrFit {
        posterior_mean,
        posterior_sd,
        pi,
        sigma,
    })
}

/// Adaptive shrinkage strategy
#[derive(Debug, Clone, Default)]
pub struct AshrShrinkage {
    pub params: AshrParams,
}

impl ShrinkageStrategy for AshrShrinkage {
    fn name(&self) -> &'static str {
        "ashr"
    }

    fn shrink(&self, input: &ShrinkageInput) -> Result<ShrunkEffects> {
        let fit = fit_ashr(input.log2_fold_changes, input.lfc_se, &self.params)?;
        let pick = |post: &[f64], mle: &[f64]| -> Vec<f64> {
            post.iter()
                .zip(mle)
                .map(|(&p, &m)| if p.is_finite() { p } else { m })
                .collect()
        };
        Ok(ShrunkEffects {
            log2_fold_changes: pick(&fit.posterior_mean, input.log2_fold_changes),
            lfc_se: pick(&fit.posterior_sd, input.lfc_se),
        })
    }
}
