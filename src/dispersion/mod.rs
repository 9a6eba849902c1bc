//! Dispersion estimation for negative binomial models
//!
//! Three stages: gene-wise Cox-Reid estimates, a dispersion-mean trend,
//! and empirical Bayes (MAP) shrinkage of the gene-wise values toward it.

mod gene_wise;
mod map;
mod trend;

pub use gene_wise::{estimate_gene_dispersion, estimate_gene_dispersions, GeneWiseDispersions};
pub use map::{estimate_map_dispersions, estimate_prior_variance, fit_map_dispersion, DispersionPrior};
pub use trend::{fit_dispersion_trend, mean_trend, DispersionTrend};

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{ReportError, Result};
use crate::glm::DesignMatrix;

/// Configurable parameters for dispersion estimation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispersionParams {
    /// Lower bound on any dispersion estimate
    pub min_disp: f64,
    /// Points per stage of the log-dispersion grid search
    pub grid_points: usize,
    /// Upper outliers beyond this many SDs of the log residuals keep their gene-wise estimate
    pub outlier_sd: f64,
}

impl Default for DispersionParams {
    fn default() -> Self {
        Self {
            min_disp: 1e-8,
            grid_points: 20,
            outlier_sd: 2.0,
        }
    }
}

impl DispersionParams {
    /// Upper bound: max(n_samples, 10)
    pub fn max_disp(&self, n_samples: usize) -> f64 {
        (n_samples as f64).max(10.0)
    }
}

/// Every dispersion product the downstream steps need
#[derive(Debug, Clone)]
pub struct DispersionEstimates {
    pub gene_wise: Vec<f64>,
    pub trend: DispersionTrend,
    pub trended: Vec<f64>,
    /// Dispersions used for the GLM fit
    pub final_dispersions: Vec<f64>,
    pub prior_var: f64,
}

/// Maximise a function of log(alpha) on [lo, hi]: coarse grid, fine grid, golden-section polish
pub(crate) fn maximize_log_alpha<F: Fn(f64) -> f64>(f: &F, lo: f64, hi: f64, grid_points: usize) -> f64 {
    let points = grid_points.max(3);
    let grid_max = |a: f64, b: f64| -> (f64, f64) {
        let step = (b - a) / (points - 1) as f64;
        let mut best = (a, f64::NEG_INFINITY);
        for k in 0..points {
            let x = a + step * k as f64;
            let v = f(x);
            if v > best.1 {
                best = (x, v);
            }
        }
        (best.0, step)
    };

    let (coarse, step) = grid_max(lo, hi);
    let (fine, fine_step) = grid_max((coarse - step).max(lo), (coarse + step).min(hi));

    // Golden-section search in the bracket around the fine optimum
    let mut a = (fine - fine_step).max(lo);
    let mut b = (fine + fine_step).min(hi);
    let ratio = (5.0_f64.sqrt() - 1.0) / 2.0;
    let mut c = b - ratio * (b - a);
    let mut d = a + ratio * (b - a);
    let (mut fc, mut fd) = (f(c), f(d));
    for _ in 0..40 {
        if (b - a).abs() < 1e-6 {
            break;
        }
        if fc > fd {
            b = d;
            d = c;
            fd = fc;
            c = b - ratio * (b - a);
            fc = f(c);
        } else {
            a = c;
            c = d;
            fc = fd;
            d = a + ratio * (b - a);
            fd = f(d);
        }
    }
    let polished = (a + b) / 2.0;
    if f(polished) >= f(fine) {
        polished
    } else {
        fine
    }
}

/// Gene-wise estimates, trend, and MAP dispersions for the count rows.
///
/// When every gene-wise estimate sits within two orders of magnitude of
/// `min_disp` there is nothing to shrink toward, and the gene-wise values
/// are used directly.
pub fn estimate_dispersions(
    counts: &Array2<f64>,
    size_factors: &Array1<f64>,
    base_means: &[f64],
    design: &DesignMatrix,
    params: &DispersionParams,
) -> Result<DispersionEstimates> {
    if counts.ncols() != design.n_samples() || size_factors.len() != design.n_samples() {
        return Err(ReportError::model_fit(format!(
            "count matrix has {} samples, design has {}",
            counts.ncols(),
            design.n_samples()
        )));
    }
    if design.df_residual() == 0 {
        return Err(ReportError::model_fit(
            "no residual degrees of freedom for dispersion estimation",
        ));
    }

    let gene = estimate_gene_dispersions(counts.view(), size_factors, design, params);
    log::info!("gene-wise dispersions estimated for {} genes", gene.dispersions.len());

    if gene.dispersions.iter().all(|&d| d < 100.0 * params.min_disp) {
        log::warn!("all gene-wise dispersions are near the lower bound; skipping trend and shrinkage");
        let trend = mean_trend(&gene.dispersions, params.min_disp);
        let trended = base_means.iter().map(|&m| trend.evaluate(m)).collect();
        return Ok(DispersionEstimates {
            final_dispersions: gene.dispersions.clone(),
            gene_wise: gene.dispersions,
            trend,
            trended,
            prior_var: 0.25,
        });
    }

    let trend = fit_dispersion_trend(base_means, &gene.dispersions, params.min_disp);
    let trended: Vec<f64> = base_means.iter().map(|&m| trend.evaluate(m)).collect();
    log::info!("dispersion trend: {} {:?}", trend.name(), trend);

    let prior = estimate_prior_variance(&gene.dispersions, &trended, design, params.min_disp);
    let (final_dispersions, outliers) = estimate_map_dispersions(
        counts,
        &gene.mu,
        design,
        &gene.dispersions,
        &trended,
        &prior,
        params,
    );
    log::info!(
        "MAP dispersions estimated (prior variance {:.4}, {} upper outliers)",
        prior.prior_var,
        outliers
    );

    Ok(DispersionEstimates {
        gene_wise: gene.dispersions,
        trend,
        trended,
        final_dispersions,
        prior_var: prior.prior_var,
    })
}
