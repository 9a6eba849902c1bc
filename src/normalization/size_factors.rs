//! Size factor estimation using the median of ratios method

use ndarray::{Array1, Array2, ArrayView2, Axis};

use crate::error::{ReportError, Result};
use crate::stats::median;

/// Median-of-ratios size factors.
///
/// Genes with a zero in any sample are excluded from the geometric-mean
/// reference. When no gene is positive in every sample the model cannot be
/// normalised and a model fit error is returned.
pub fn estimate_size_factors(counts: ArrayView2<f64>) -> Result<Array1<f64>> {
    let (n_genes, n_samples) = counts.dim();
    if n_genes == 0 || n_samples == 0 {
        return Err(ReportError::model_fit("count matrix is empty"));
    }

    let reference: Vec<(usize, f64)> = counts
        .axis_iter(Axis(0))
        .enumerate()
        .filter(|(_, row)| row.iter().all(|&x| x > 0.0))
        .map(|(i, row)| (i, row.iter().map(|x| x.ln()).sum::<f64>() / n_samples as f64))
        .collect();

    if reference.is_empty() {
        return Err(ReportError::model_fit(
            "every gene contains at least one zero; size factors cannot be estimated",
        ));
    }

    let mut size_factors = Array1::zeros(n_samples);
    for j in 0..n_samples {
        let log_ratios: Vec<f64> = reference
            .iter()
            .map(|&(i, log_geo_mean)| counts[[i, j]].ln() - log_geo_mean)
            .collect();
        size_factors[j] = median(&log_ratios).exp();
    }

    if size_factors.iter().any(|&s: &f64| !s.is_finite() || s <= 0.0) {
        return Err(ReportError::model_fit("invalid size factors computed"));
    }
    log::debug!("Size factors: {:?}", size_factors.to_vec());
    Ok(size_factors)
}

/// Counts divided by the per-sample size factors
pub fn normalized_counts(counts: ArrayView2<f64>, size_factors: &Array1<f64>) -> Array2<f64> {
    let mut out = counts.to_owned();
    for (mut col, &sf) in out.axis_iter_mut(Axis(1)).zip(size_factors.iter()) {
        col.mapv_inplace(|x| x / sf);
    }
    out
}
