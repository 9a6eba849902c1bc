//! P-values from test statistics

use statrs::distribution::{ContinuousCDF, Normal};

/// Two-sided normal p-value for a z statistic; NaN for non-finite input
pub fn calculate_pvalue(z: f64) -> f64 {
    if !z.is_finite() {
        return f64::NAN;
    }
    match Normal::new(0.0, 1.0) {
        Ok(normal) => (2.0 * normal.cdf(-z.abs())).min(1.0),
        Err(_) => f64::NAN,
    }
}
