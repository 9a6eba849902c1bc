//! Independent filtering on mean expression before multiple testing

use super::lowess::lowess;
use crate::stats::{cmp_nan_last, quantile_sorted};
use crate::testing::benjamini_hochberg;

/// Number of candidate filter quantiles
const N_THETA: usize = 50;

/// Result of choosing a baseMean cutoff
#[derive(Debug, Clone)]
pub struct FilterOutcome {
    /// Adjusted p-values; NaN for filtered genes
    pub padj: Vec<f64>,
    /// Chosen quantile of baseMean
    pub theta: f64,
    /// baseMean cutoff; genes below it were filtered
    pub cutoff: f64,
    pub rejections: usize,
}

/// Pick the baseMean quantile that maximises rejections at `alpha`, then BH-adjust the rest.
///
/// The rejection curve over 50 quantiles is smoothed with lowess (span 1/5);
/// the first quantile whose count exceeds `max(fit) - rmse` wins. With ten or
/// fewer rejections anywhere, nothing is filtered.
pub fn independent_filtering(base_means: &[f64], pvalues: &[f64], alpha: f64) -> FilterOutcome {
    let n = base_means.len();
    let unfiltered = || FilterOutcome {
        padj: benjamini_hochberg(pvalues),
        theta: 0.0,
        cutoff: 0.0,
        rejections: 0,
    };
    if n == 0 {
        return unfiltered();
    }

    let lower = base_means.iter().filter(|&&m| m == 0.0 || !m.is_finite()).count() as f64 / n as f64;
    let upper = if lower < 0.95 { 0.95 } else { 1.0 };
    let thetas: Vec<f64> = (0..N_THETA)
        .map(|i| lower + (upper - lower) * i as f64 / (N_THETA - 1) as f64)
        .collect();

    let mut sorted: Vec<f64> = base_means.iter().copied().filter(|m| m.is_finite()).collect();
    if sorted.is_empty() {
        return unfiltered();
    }
    sorted.sort_by(|a, b| cmp_nan_last(*a, *b));
    let cutoffs: Vec<f64> = thetas.iter().map(|&t| quantile_sorted(&sorted, t)).collect();

    let adjusted: Vec<Vec<f64>> = cutoffs
        .iter()
        .map(|&cutoff| {
            let kept: Vec<f64> = pvalues
                .iter()
                .zip(base_means)
                .map(|(&p, &m)| if m >= cutoff { p } else { f64::NAN })
                .collect();
            benjamini_hochberg(&kept)
        })
        .collect();
    let rejections: Vec<usize> = adjusted
        .iter()
        .map(|padj| padj.iter().filter(|&&p| p < alpha).count())
        .collect();

    let max_rejections = rejections.iter().copied().max().unwrap_or(0);
    let chosen = if max_rejections <= 10 {
        0
    } else {
        let y: Vec<f64> = rejections.iter().map(|&r| r as f64).collect();
        let fit = lowess(&thetas, &y, 0.2, 3);
        let residuals: Vec<f64> = y
            .iter()
            .zip(&fit)
            .filter(|(&r, _)| r > 0.0)
            .map(|(r, f)| r - f)
            .collect();
        let rmse = if residuals.is_empty() {
            0.0
        } else {
            (residuals.iter().map(|r| r * r).sum::<f64>() / residuals.len() as f64).sqrt()
        };
        let max_fit = fit.iter().copied().fold(f64::MIN, f64::max);
        let threshold = max_fit - rmse;
        y.iter().position(|&r| r > threshold).unwrap_or(0)
    };

    log::debug!(
        "independent filtering: theta={:.3}, cutoff={:.3}, rejections={} (max {})",
        thetas[chosen],
        cutoffs[chosen],
        rejections[chosen],
        max_rejections
    );

    FilterOutcome {
        padj: adjusted[chosen].clone(),
        theta: thetas[chosen],
        cutoff: cutoffs[chosen],
        rejections: rejections[chosen],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_few_rejections_do_not_filter() {
        let base_means = [1.0, 2.0, 3.0, 4.0];
        let pvalues = [0.01, 0.5, 0.2, 0.9];
        let out = independent_filtering(&base_means, &pvalues, 0.05);
        assert_eq!(out.theta, 0.0);
        assert_eq!(out.padj, benjamini_hochberg(&pvalues));
    }

    #[test]
    fn test_low_count_noise_is_filtered() {
        // 900 low-mean genes with uniform p-values dilute 40 real signals among high-mean genes
        let mut base_means = Vec::new();
        let mut pvalues = Vec::new();
        for i in 0..900 {
            base_means.push(1.0 + i as f64 * 0.01);
            pvalues.push((i as f64 + 0.5) / 900.0);
        }
        for i in 0..100 {
            base_means.push(1000.0 + i as f64);
            pvalues.push(if i >= 60 { 3e-3 } else { 0.5 });
        }

        assert!(benjamini_hochberg(&pvalues).iter().all(|&p| p >= 0.05));

        let out = independent_filtering(&base_means, &pvalues, 0.05);
        assert_eq!(out.rejections, 40);
        assert!(out.theta > 0.0);
        assert!(out.padj[0].is_nan());
        assert!(out.padj[960..].iter().all(|&p| p < 0.05));
    }

    #[test]
    fn test_empty_input() {
        let out = independent_filtering(&[], &[], 0.05);
        assert!(out.padj.is_empty());
    }
}
