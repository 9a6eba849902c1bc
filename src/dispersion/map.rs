//! Empirical Bayes shrinkage of gene-wise dispersions toward the trend

use ndarray::Array2;
use rayon::prelude::*;

use super::gene_wise::cox_reid_log_likelihood;
use super::{maximize_log_alpha, DispersionParams};
use crate::glm::DesignMatrix;
use crate::stats::{mad_squared, trigamma};

/// Lower bound on the log-dispersion prior variance
const MIN_PRIOR_VAR: f64 = 0.25;

/// Prior spread of log dispersions around the trend
#[derive(Debug, Clone, Copy)]
pub struct DispersionPrior {
    /// Variance of the normal prior on log dispersion
    pub prior_var: f64,
    /// Observed squared MAD of the log residuals, used for outlier detection
    pub var_log_disp_ests: f64,
}

/// varLogDisp - trigamma(df/2), floored at 0.25
pub fn estimate_prior_variance(
    gene_wise: &[f64],
    trended: &[f64],
    design: &DesignMatrix,
    min_disp: f64,
) -> DispersionPrior {
    let residuals: Vec<f64> = gene_wise
        .iter()
        .zip(trended)
        .filter(|(&g, &t)| g >= 100.0 * min_disp && t > 0.0 && g.is_finite())
        .map(|(&g, &t)| g.ln() - t.ln())
        .collect();

    if residuals.len() < 3 {
        return DispersionPrior {
            prior_var: MIN_PRIOR_VAR,
            var_log_disp_ests: MIN_PRIOR_VAR,
        };
    }

    let var_log_disp_ests = mad_squared(&residuals);
    let df = design.df_residual() as f64;
    let prior_var = if df > 0.0 {
        (var_log_disp_ests - trigamma(df / 2.0)).max(MIN_PRIOR_VAR)
    } else {
        MIN_PRIOR_VAR
    };
    log::debug!(
        "dispersion prior: varLogDispEsts={:.4}, df={}, prior_var={:.4}",
        var_log_disp_ests,
        df,
        prior_var
    );
    DispersionPrior {
        prior_var,
        var_log_disp_ests,
    }
}

/// Posterior mode of one gene's log dispersion under a normal prior centred at log(trend)
pub fn fit_map_dispersion(
    counts: &[f64],
    design: &DesignMatrix,
    mu: &[f64],
    trend_disp: f64,
    prior_var: f64,
    params: &DispersionParams,
) -> f64 {
    let max_disp = params.max_disp(counts.len());
    let log_trend = trend_disp.max(params.min_disp).ln();
    let objective = |log_alpha: f64| {
        cox_reid_log_likelihood(counts, &design.matrix, mu, log_alpha)
            - (log_alpha - log_trend).powi(2) / (2.0 * prior_var)
    };
    maximize_log_alpha(&objective, params.min_disp.ln(), max_disp.ln(), params.grid_points)
        .exp()
        .clamp(params.min_disp, max_disp)
}

/// Final dispersions: MAP estimates, except upper outliers keep their gene-wise value.
///
/// Returns the final dispersions and the number of outliers.
pub fn estimate_map_dispersions(
    counts: &Array2<f64>,
    mu: &Array2<f64>,
    design: &DesignMatrix,
    gene_wise: &[f64],
    trended: &[f64],
    prior: &DispersionPrior,
    params: &DispersionParams,
) -> (Vec<f64>, usize) {
    let map: Vec<f64> = (0..counts.nrows())
        .into_par_iter()
        .map(|i| {
            let y = counts.row(i).to_vec();
            let m = mu.row(i).to_vec();
            fit_map_dispersion(&y, design, &m, trended[i], prior.prior_var, params)
        })
        .collect();

    let threshold = params.outlier_sd * prior.var_log_disp_ests.sqrt();
    let mut outliers = 0;
    let finals = map
        .into_iter()
        .enumerate()
        .map(|(i, map_disp)| {
            let (g, t) = (gene_wise[i], trended[i]);
            if g > 0.0 && t > 0.0 && g.ln() - t.ln() > threshold {
                outliers += 1;
                g
            } else {
                map_disp
            }
        })
        .collect();
    (finals, outliers)
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
    fn test_prior_variance_floor() {
        let g = vec![0.1; 10];
        let t = vec![0.1; 10];
        let prior = estimate_prior_variance(&g, &t, &design(), 1e-8);
        assert_eq!(prior.prior_var, 0.25);
    }

    #[test]
    fn test_map_lies_between_gene_and_trend() {
        let counts = [20.0, 180.0, 100.0, 50.0, 400.0, 150.0];
        let mu = [100.0, 100.0, 100.0, 200.0, 200.0, 200.0];
        let params = DispersionParams::default();
        let d = design();
        let free = fit_map_dispersion(&counts, &d, &mu, 0.5, 1e6, &params);
        let shrunk = fit_map_dispersion(&counts, &d, &mu, 0.01, 0.25, &params);
        assert!(shrunk < free);
        assert!(shrunk > 0.01);
    }

    #[test]
    fn test_upper_outlier_keeps_gene_wise_value() {
        let counts = Array2::from_shape_vec((1, 6), vec![20.0, 180.0, 100.0, 50.0, 400.0, 150.0]).unwrap();
        let mu = Array2::from_shape_vec((1, 6), vec![100.0, 100.0, 100.0, 200.0, 200.0, 200.0]).unwrap();
        let prior = DispersionPrior {
            prior_var: 0.25,
            var_log_disp_ests: 0.25,
        };
        let (finals, outliers) = estimate_map_dispersions(
            &counts,
            &mu,
            &design(),
            &[0.8],
            &[0.01],
            &prior,
            &DispersionParams::default(),
        );
        assert_eq!(outliers, 1);
        assert_eq!(finals[0], 0.8);
    }
}
