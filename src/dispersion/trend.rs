//! Dispersion-mean trend fitting

use crate::error::{ReportError, Result};

/// Gene-wise estimates at or below this multiple of `min_disp` are excluded from the fit
const FIT_FLOOR_MULTIPLE: f64 = 100.0;

/// Fitted relationship between mean expression and dispersion
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DispersionTrend {
    /// dispersion = asympt_disp + extra_pois / mean
    Parametric { asympt_disp: f64, extra_pois: f64 },
    /// A single dispersion for every gene
    Mean(f64),
}

impl DispersionTrend {
    /// Trended dispersion at mean normalized count `mean`
    pub fn evaluate(&self, mean: f64) -> f64 {
        match *self {
            DispersionTrend::Parametric { asympt_disp, extra_pois } => {
                if mean > 0.0 {
                    asympt_disp + extra_pois / mean
                } else {
                    asympt_disp
                }
            }
            DispersionTrend::Mean(d) => d,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DispersionTrend::Parametric { .. } => "parametric",
            DispersionTrend::Mean(_) => "mean",
        }
    }
}

/// Fit the parametric trend, falling back to the mean of the usable estimates.
pub fn fit_dispersion_trend(base_means: &[f64], dispersions: &[f64], min_disp: f64) -> DispersionTrend {
    match fit_parametric_trend(base_means, dispersions, min_disp) {
        Ok(trend) => trend,
        Err(e) => {
            log::warn!("{}; using the mean dispersion as trend", e);
            mean_trend(dispersions, min_disp)
        }
    }
}

/// Trimmed mean (trim 0.001) of the estimates above `10 * min_disp`
pub fn mean_trend(dispersions: &[f64], min_disp: f64) -> DispersionTrend {
    let mut usable: Vec<f64> = dispersions
        .iter()
        .copied()
        .filter(|d| d.is_finite() && *d > 10.0 * min_disp)
        .collect();
    if usable.is_empty() {
        return DispersionTrend::Mean(min_disp);
    }
    usable.sort_by(|a, b| a.total_cmp(b));
    let n = usable.len();
    let trim = (n as f64 * 0.001).floor() as usize;
    let kept = &usable[trim..n - trim];
    DispersionTrend::Mean(kept.iter().sum::<f64>() / kept.len() as f64)
}

/// Iterated gamma-family GLM (identity link) of dispersion on 1/mean with residual filtering
fn fit_parametric_trend(base_means: &[f64], dispersions: &[f64], min_disp: f64) -> Result<DispersionTrend> {
    let points: Vec<(f64, f64)> = base_means
        .iter()
        .zip(dispersions)
        .filter(|(&m, &d)| m > 0.0 && d.is_finite() && d > FIT_FLOOR_MULTIPLE * min_disp)
        .map(|(&m, &d)| (m, d))
        .collect();

    if points.len() < 3 {
        return Err(ReportError::model_fit(format!(
            "parametric dispersion fit needs at least 3 usable genes, found {}",
            points.len()
        )));
    }

    let mut coefs = (0.1_f64, 1.0_f64);
    for iter in 0..11 {
        let old = coefs;
        let kept: Vec<(f64, f64)> = points
            .iter()
            .copied()
            .filter(|&(m, d)| {
                let fitted = coefs.0 + coefs.1 / m;
                fitted > 0.0 && {
                    let ratio = d / fitted;
                    ratio > 1e-4 && ratio < 15.0
                }
            })
            .collect();
        if kept.len() < 3 {
            return Err(ReportError::model_fit("too few genes left after residual filtering"));
        }

        let (next, glm_converged) = gamma_identity_glm(&kept, coefs);
        coefs = next;
        log::debug!(
            "trend iteration {}: {} genes, a0={:.6}, a1={:.6}",
            iter + 1,
            kept.len(),
            coefs.0,
            coefs.1
        );

        if coefs.0 <= 0.0 || coefs.1 <= 0.0 {
            return Err(ReportError::model_fit(format!(
                "parametric dispersion coefficients not positive (a0={:.4}, a1={:.4})",
                coefs.0, coefs.1
            )));
        }

        let change = (coefs.0 / old.0).ln().powi(2) + (coefs.1 / old.1).ln().powi(2);
        if change < 1e-6 && glm_converged {
            return Ok(DispersionTrend::Parametric {
                asympt_disp: coefs.0,
                extra_pois: coefs.1,
            });
        }
    }

    Err(ReportError::model_fit("parametric dispersion fit did not converge"))
}

fn gamma_deviance(data: &[(f64, f64)], a0: f64, a1: f64) -> f64 {
    data.iter()
        .map(|&(m, d)| {
            let mu = (a0 + a1 / m).max(1e-8);
            2.0 * (-(d / mu).ln() + (d - mu) / mu)
        })
        .sum()
}

/// Weighted least squares iterations for d ~ a0 + a1 * (1/mean) with weights 1/mu^2
fn gamma_identity_glm(data: &[(f64, f64)], start: (f64, f64)) -> ((f64, f64), bool) {
    let (mut a0, mut a1) = start;
    let mut dev_old = gamma_deviance(data, a0, a1);

    for _ in 0..25 {
        let (mut sw, mut swx, mut swz, mut swxx, mut swxz) = (0.0, 0.0, 0.0, 0.0, 0.0);
        for &(m, d) in data {
            let x = 1.0 / m;
            let mu = (a0 + a1 * x).max(1e-8);
            let w = 1.0 / (mu * mu);
            sw += w;
            swx += w * x;
            swz += w * d;
            swxx += w * x * x;
            swxz += w * x * d;
        }
        let det = sw * swxx - swx * swx;
        if det.abs() < 1e-10 {
            return ((a0, a1), false);
        }
        a0 = (swxx * swz - swx * swxz) / det;
        a1 = (sw * swxz - swx * swz) / det;

        let dev = gamma_deviance(data, a0, a1);
        if (dev_old - dev).abs() / (0.1 + dev.abs()) < 1e-8 {
            return ((a0, a1), true);
        }
        dev_old = dev;
    }
    ((a0, a1), false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovers_parametric_curve() {
        let means: Vec<f64> = (1..=200).map(|i| i as f64 * 5.0).collect();
        let disps: Vec<f64> = means.iter().map(|m| 0.05 + 2.0 / m).collect();
        match fit_dispersion_trend(&means, &disps, 1e-8) {
            DispersionTrend::Parametric { asympt_disp, extra_pois } => {
                assert!((asympt_disp - 0.05).abs() < 1e-3);
                assert!((extra_pois - 2.0).abs() < 1e-2);
            }
            other => panic!("expected parametric trend, got {:?}", other),
        }
    }

    #[test]
    fn test_too_few_points_falls_back_to_mean() {
        let trend = fit_dispersion_trend(&[10.0, 20.0], &[0.2, 0.4], 1e-8);
        match trend {
            DispersionTrend::Mean(d) => assert!((d - 0.3).abs() < 1e-12),
            other => panic!("expected mean trend, got {:?}", other),
        }
    }

    #[test]
    fn test_mean_trend_of_boundary_estimates_is_min_disp() {
        assert_eq!(mean_trend(&[1e-8, 1e-8], 1e-8), DispersionTrend::Mean(1e-8));
    }

    #[test]
    fn test_evaluate() {
        let t = DispersionTrend::Parametric { asympt_disp: 0.1, extra_pois: 2.0 };
        assert!((t.evaluate(4.0) - 0.6).abs() < 1e-12);
        assert_eq!(DispersionTrend::Mean(0.3).evaluate(100.0), 0.3);
    }
}
