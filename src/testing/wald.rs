//! Wald test for one model coefficient

use super::pvalue::calculate_pvalue;
use crate::glm::GlmFit;

/// Per-gene Wald statistics for one coefficient, log2 scale
#[derive(Debug, Clone, Default)]
pub struct WaldStatistics {
    pub log2_fold_changes: Vec<f64>,
    pub lfc_se: Vec<f64>,
    pub stat: Vec<f64>,
    pub pvalues: Vec<f64>,
}

/// Test coefficient `coef_idx` of every fit against zero.
///
/// Genes with a zero base mean get LFC 0, SE 0 and NaN statistic.
pub fn wald_test(fits: &[GlmFit], base_means: &[f64], coef_idx: usize) -> WaldStatistics {
    let ln2 = std::f64::consts::LN_2;
    let mut out = WaldStatistics::default();

    for (fit, &base_mean) in fits.iter().zip(base_means) {
        let beta = fit.coefficients.get(coef_idx).copied().unwrap_or(f64::NAN);
        let se = fit.standard_errors.get(coef_idx).copied().unwrap_or(f64::NAN);
        if base_mean == 0.0 {
            out.log2_fold_changes.push(0.0);
            out.lfc_se.push(0.0);
            out.stat.push(f64::NAN);
            out.pvalues.push(f64::NAN);
            continue;
        }
        let z = if se > 0.0 && se.is_finite() { beta / se } else { f64::NAN };
        out.log2_fold_changes.push(beta / ln2);
        out.lfc_se.push(se / ln2);
        out.stat.push(z);
        out.pvalues.push(calculate_pvalue(z));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fit(beta: f64, se: f64) -> GlmFit {
        GlmFit {
            coefficients: vec![3.0, beta],
            standard_errors: vec![0.1, se],
            converged: true,
            mu: vec![],
        }
    }

    #[test]
    fn test_wald_statistics() {
        let w = wald_test(&[fit(std::f64::consts::LN_2, 0.5)], &[100.0], 1);
        assert!((w.log2_fold_changes[0] - 1.0).abs() < 1e-12);
        assert!((w.stat[0] - std::f64::consts::LN_2 / 0.5).abs() < 1e-12);
        assert!(w.pvalues[0] > 0.0 && w.pvalues[0] < 1.0);
    }

    #[test]
    fn test_zero_base_mean_and_bad_se() {
        let w = wald_test(&[fit(1.0, 0.5), fit(1.0, f64::NAN)], &[0.0, 10.0], 1);
        assert_eq!(w.log2_fold_changes[0], 0.0);
        assert!(w.pvalues[0].is_nan());
        assert!(w.stat[1].is_nan());
        assert!(w.pvalues[1].is_nan());
    }
}
