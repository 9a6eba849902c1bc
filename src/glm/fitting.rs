//! Negative binomial GLM fitting by iteratively reweighted least squares

use ndarray::{Array2, ArrayView1, ArrayView2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::negative_binomial::{nb_log_likelihood, nb_mean, nb_weight, MAX_BETA, MIN_MU};

/// Ridge penalty on the natural-log scale used for the unpenalised fit
pub fn default_ridge() -> f64 {
    let ln2 = std::f64::consts::LN_2;
    1e-6 / (ln2 * ln2)
}

/// Configurable parameters for GLM fitting
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlmFitParams {
    /// Maximum IRLS iterations
    pub maxit: usize,
    /// Relative deviance convergence tolerance
    pub beta_tol: f64,
}

impl Default for GlmFitParams {
    fn default() -> Self {
        Self {
            maxit: 100,
            beta_tol: 1e-8,
        }
    }
}

/// Per-gene fit. Coefficients and standard errors are on the natural-log scale.
#[derive(Debug, Clone)]
pub struct GlmFit {
    pub coefficients: Vec<f64>,
    pub standard_errors: Vec<f64>,
    pub converged: bool,
    pub mu: Vec<f64>,
}

fn linear_predictor(design: &Array2<f64>, beta: &[f64], row: usize) -> f64 {
    (0..beta.len()).map(|k| design[[row, k]] * beta[k]).sum()
}

/// X'WX as a flat row-major matrix
fn cross_product(design: &Array2<f64>, weights: &[f64]) -> Vec<f64> {
    let p = design.ncols();
    let mut xtwx = vec![0.0; p * p];
    for i in 0..design.nrows() {
        let w = weights[i];
        for j in 0..p {
            for k in 0..p {
                xtwx[j * p + k] += w * design[[i, j]] * design[[i, k]];
            }
        }
    }
    xtwx
}

/// Solve `A x = b` for symmetric positive definite `A` (flat, row-major) by Cholesky.
///
/// Non-positive pivots are replaced by a tiny value so nearly singular
/// systems still produce a finite answer.
pub fn solve_symmetric_system(a: &[f64], b: &[f64], n: usize) -> Vec<f64> {
    let l = cholesky(a, n);
    let mut y = vec![0.0; n];
    for i in 0..n {
        let mut sum = b[i];
        for j in 0..i {
            sum -= l[i * n + j] * y[j];
        }
        y[i] = sum / l[i * n + i];
    }
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = y[i];
        for j in (i + 1)..n {
            sum -= l[j * n + i] * x[j];
        }
        x[i] = sum / l[i * n + i];
    }
    x
}

fn cholesky(a: &[f64], n: usize) -> Vec<f64> {
    let mut l = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[i * n + j];
            for k in 0..j {
                sum -= l[i * n + k] * l[j * n + k];
            }
            if i == j {
                l[i * n + j] = if sum > 0.0 { sum.sqrt() } else { 1e-6 };
            } else {
                l[i * n + j] = sum / l[j * n + j];
            }
        }
    }
    l
}

/// log|A| for a symmetric positive definite matrix
pub fn log_det_symmetric(a: &[f64], n: usize) -> f64 {
    let l = cholesky(a, n);
    (0..n).map(|i| 2.0 * l[i * n + i].ln()).sum()
}

pub fn invert_symmetric_matrix(a: &[f64], n: usize) -> Vec<f64> {
    let mut inv = vec![0.0; n * n];
    for i in 0..n {
        let mut e = vec![0.0; n];
        e[i] = 1.0;
        let col = solve_symmetric_system(a, &e, n);
        for j in 0..n {
            inv[j * n + i] = col[j];
        }
    }
    inv
}

/// Sandwich standard errors of a ridge-penalised fit:
/// (X'WX + L)^-1 X'WX (X'WX + L)^-1
fn ridge_standard_errors(design: &Array2<f64>, weights: &[f64], lambda: &[f64]) -> Vec<f64> {
    let p = design.ncols();
    let xtwx = cross_product(design, weights);
    let mut penalised = xtwx.clone();
    for k in 0..p {
        penalised[k * p + k] += lambda[k];
    }
    let inv = invert_symmetric_matrix(&penalised, p);

    (0..p)
        .map(|k| {
            let mut var = 0.0;
            for a in 0..p {
                for b in 0..p {
                    var += inv[k * p + a] * xtwx[a * p + b] * inv[b * p + k];
                }
            }
            if var > 0.0 {
                var.sqrt()
            } else {
                f64::NAN
            }
        })
        .collect()
}

/// Fit one gene with a per-coefficient ridge penalty `lambda` (natural-log scale)
pub fn fit_gene(
    counts: ArrayView1<f64>,
    design: &Array2<f64>,
    size_factors: ArrayView1<f64>,
    alpha: f64,
    lambda: &[f64],
    params: &GlmFitParams,
) -> GlmFit {
    let n = counts.len();
    let p = design.ncols();

    // Start from ridge least squares on log normalized counts
    let log_norm: Vec<f64> = counts
        .iter()
        .zip(size_factors.iter())
        .map(|(&c, &s)| (c / s + 0.1).ln())
        .collect();
    let mut xtx = cross_product(design, &vec![1.0; n]);
    for k in 0..p {
        xtx[k * p + k] += lambda[k];
    }
    let mut xty = vec![0.0; p];
    for i in 0..n {
        for k in 0..p {
            xty[k] += design[[i, k]] * log_norm[i];
        }
    }
    let mut beta = solve_symmetric_system(&xtx, &xty, p);
    if beta.iter().any(|b| !b.is_finite()) {
        beta = vec![0.0; p];
        beta[0] = (log_norm.iter().map(|v| v.exp()).sum::<f64>() / n as f64).ln();
    }

    let mut converged = false;
    let mut dev_old = 0.0;
    let mut mu = vec![0.0; n];
    let mut weights = vec![0.0; n];
    let mut z = vec![0.0; n];

    for iter in 0..params.maxit {
        for i in 0..n {
            let m = nb_mean(linear_predictor(design, &beta, i), size_factors[i]).max(MIN_MU);
            weights[i] = nb_weight(m, alpha);
            z[i] = (m / size_factors[i]).ln() + (counts[i] - m) / m;
        }

        let mut lhs = cross_product(design, &weights);
        for k in 0..p {
            lhs[k * p + k] += lambda[k];
        }
        let mut rhs = vec![0.0; p];
        for i in 0..n {
            for k in 0..p {
                rhs[k] += weights[i] * design[[i, k]] * z[i];
            }
        }
        beta = solve_symmetric_system(&lhs, &rhs, p);

        if beta.iter().any(|b| !b.is_finite() || b.abs() > MAX_BETA) {
            break;
        }

        for i in 0..n {
            mu[i] = nb_mean(linear_predictor(design, &beta, i), size_factors[i]).max(MIN_MU);
        }
        let dev: f64 = (0..n)
            .map(|i| -2.0 * nb_log_likelihood(counts[i], mu[i], alpha))
            .sum();
        let conv = (dev - dev_old).abs() / (dev.abs() + 0.1);
        if conv.is_nan() {
            break;
        }
        if iter > 0 && conv < params.beta_tol {
            converged = true;
            break;
        }
        dev_old = dev;
    }

    if !converged {
        log::debug!("IRLS did not converge (alpha={:.4e})", alpha);
    }

    for i in 0..n {
        mu[i] = nb_mean(linear_predictor(design, &beta, i), size_factors[i]).max(MIN_MU);
        weights[i] = nb_weight(mu[i], alpha);
    }
    let standard_errors = ridge_standard_errors(design, &weights, lambda);

    GlmFit {
        coefficients: beta,
        standard_errors,
        converged,
        mu,
    }
}

/// Fit every gene (row of `counts`) in parallel; results keep gene order
pub fn fit_all_genes(
    counts: ArrayView2<f64>,
    design: &Array2<f64>,
    size_factors: ArrayView1<f64>,
    dispersions: &[f64],
    lambda: &[f64],
    params: &GlmFitParams,
) -> Vec<GlmFit> {
    (0..counts.nrows())
        .into_par_iter()
        .map(|i| fit_gene(counts.row(i), design, size_factors, dispersions[i], lambda, params))
        .collect()
}
