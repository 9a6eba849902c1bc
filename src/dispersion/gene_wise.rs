//! Gene-wise dispersion estimates from the Cox-Reid adjusted profile likelihood

use ndarray::{Array1, Array2, ArrayView2};
use rayon::prelude::*;
use statrs::function::gamma::ln_gamma;

use super::{maximize_log_alpha, DispersionParams};
use crate::glm::{log_det_symmetric, solve_symmetric_system, DesignMatrix, MIN_MU};

/// Gene-wise estimates plus the fitted means they were profiled against
#[derive(Debug, Clone)]
pub struct GeneWiseDispersions {
    pub dispersions: Vec<f64>,
    /// Fitted means (genes x samples), reused by the MAP step
    pub mu: Array2<f64>,
}

/// Least-squares fit of normalized counts on the design, returned on the normalized scale
fn linear_model_fit(normalized: &[f64], design: &Array2<f64>) -> Vec<f64> {
    let n = normalized.len();
    let p = design.ncols();
    let mut xtx = vec![0.0; p * p];
    let mut xty = vec![0.0; p];
    for i in 0..n {
        for j in 0..p {
            xty[j] += design[[i, j]] * normalized[i];
            for k in 0..p {
                xtx[j * p + k] += design[[i, j]] * design[[i, k]];
            }
        }
    }
    let beta = solve_symmetric_system(&xtx, &xty, p);
    (0..n)
        .map(|i| (0..p).map(|k| design[[i, k]] * beta[k]).sum())
        .collect()
}

/// Moment estimate from residuals around the linear fit
fn rough_disp_estimate(normalized: &[f64], fitted: &[f64], df: usize) -> f64 {
    let est: f64 = normalized
        .iter()
        .zip(fitted)
        .map(|(&y, &m)| {
            let m = m.max(1.0);
            ((y - m).powi(2) - m) / (m * m)
        })
        .sum::<f64>()
        / df.max(1) as f64;
    est.max(0.0)
}

/// (variance - xim * mean) / mean^2 over the normalized counts
fn moments_disp_estimate(normalized: &[f64], xim: f64) -> f64 {
    let n = normalized.len() as f64;
    let mean = normalized.iter().sum::<f64>() / n;
    if mean <= 0.0 {
        return f64::INFINITY;
    }
    let var = normalized.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0).max(1.0);
    (var - xim * mean) / (mean * mean)
}

/// Log-likelihood in log(alpha) with the Cox-Reid adjustment -0.5 log|X'WX|
pub(super) fn cox_reid_log_likelihood(counts: &[f64], design: &Array2<f64>, mu: &[f64], log_alpha: f64) -> f64 {
    let alpha = log_alpha.exp();
    let inv = 1.0 / alpha;
    let p = design.ncols();

    let mut ll = 0.0;
    let mut xtwx = vec![0.0; p * p];
    for (i, (&y, &m)) in counts.iter().zip(mu).enumerate() {
        ll += ln_gamma(y + inv) - ln_gamma(inv) - y * (m + inv).ln() - inv * (m * alpha).ln_1p();
        let w = 1.0 / (1.0 / m + alpha);
        for j in 0..p {
            for k in 0..p {
                xtwx[j * p + k] += w * design[[i, j]] * design[[i, k]];
            }
        }
    }
    ll - 0.5 * log_det_symmetric(&xtwx, p)
}

/// Estimate one gene's dispersion
pub fn estimate_gene_dispersion(
    counts: &[f64],
    size_factors: &[f64],
    design: &DesignMatrix,
    params: &DispersionParams,
) -> (f64, Vec<f64>) {
    let n = counts.len();
    let max_disp = params.max_disp(n);
    let normalized: Vec<f64> = counts.iter().zip(size_factors).map(|(&c, &s)| c / s).collect();
    let xim = size_factors.iter().map(|s| 1.0 / s).sum::<f64>() / n as f64;

    let fitted = linear_model_fit(&normalized, &design.matrix);
    let rough = rough_disp_estimate(&normalized, &fitted, design.df_residual());
    let moments = moments_disp_estimate(&normalized, xim);
    let alpha_init = rough.min(moments).clamp(params.min_disp, max_disp);

    let mu: Vec<f64> = fitted
        .iter()
        .zip(size_factors)
        .map(|(&f, &s)| (f * s).max(MIN_MU))
        .collect();

    let objective = |log_alpha: f64| cox_reid_log_likelihood(counts, &design.matrix, &mu, log_alpha);
    let log_alpha = maximize_log_alpha(&objective, params.min_disp.ln(), max_disp.ln(), params.grid_points);

    let init_lp = objective(alpha_init.ln());
    let best_lp = objective(log_alpha);
    let alpha = if best_lp < init_lp + init_lp.abs() / 1e6 {
        alpha_init
    } else {
        log_alpha.exp()
    };
    (alpha.clamp(params.min_disp, max_disp), mu)
}

/// Gene-wise dispersions for every row of `counts`, in gene order
pub fn estimate_gene_dispersions(
    counts: ArrayView2<f64>,
    size_factors: &Array1<f64>,
    design: &DesignMatrix,
    params: &DispersionParams,
) -> GeneWiseDispersions {
    let (n_genes, n_samples) = counts.dim();
    let sf = size_factors.to_vec();

    let per_gene: Vec<(f64, Vec<f64>)> = (0..n_genes)
        .into_par_iter()
        .map(|i| {
            let row = counts.row(i).to_vec();
            estimate_gene_dispersion(&row, &sf, design, params)
        })
        .collect();

    let mut mu = Array2::zeros((n_genes, n_samples));
    let mut dispersions = Vec::with_capacity(n_genes);
    for (i, (alpha, gene_mu)) in per_gene.into_iter().enumerate() {
        dispersions.push(alpha);
        for (j, m) in gene_mu.into_iter().enumerate() {
            mu[[i, j]] = m;
        }
    }
    GeneWiseDispersions { dispersions, mu }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SampleMetadata;
    use crate::glm::build_group_design;

    fn design() -> DesignMatrix {
        let meta = SampleMetadata::new(
            (1..=6).map(|i| format!("s{}", i)).collect(),
            ["a", "a", "a", "b", "b", "b"].iter().map(|s| s.to_string()).collect(),
        )
        .unwrap();
        build_group_design(&meta).unwrap()
    }

    #[test]
    fn test_constant_counts_hit_lower_bound() {
        let params = DispersionParams::default();
        let (alpha, _) = estimate_gene_dispersion(&[100.0; 6], &[1.0; 6], &design(), &params);
        assert!(alpha < 1e-4, "alpha = {}", alpha);
    }

    #[test]
    fn test_overdispersed_gene_has_larger_dispersion() {
        let params = DispersionParams::default();
        let d = design();
        let (calm, _) = estimate_gene_dispersion(&[100.0, 105.0, 95.0, 200.0, 210.0, 190.0], &[1.0; 6], &d, &params);
        let (noisy, _) = estimate_gene_dispersion(&[20.0, 180.0, 100.0, 50.0, 400.0, 150.0], &[1.0; 6], &d, &params);
        assert!(noisy > calm);
        assert!(noisy > 0.1);
    }

    #[test]
    fn test_rough_estimate_non_negative() {
        assert_eq!(rough_disp_estimate(&[5.0, 5.0], &[5.0, 5.0], 1), 0.0);
    }
}
