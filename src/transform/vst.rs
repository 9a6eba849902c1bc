//! Variance stabilizing transformation from the fitted dispersion trend

use ndarray::Array2;

use crate::dispersion::DispersionTrend;
use super::HEATMAP_INPUT;
use crate::error::{ReportError, Result};

/// log2((1 + e + 2aq + 2 sqrt(aq(1 + e + aq))) / (4a)) for trend a + e/mean
fn vst_parametric(q: f64, asympt_disp: f64, extra_pois: f64) -> f64 {
    let (a, e) = (asympt_disp, extra_pois);
    let q = q.max(0.0);
    let numerator = 1.0 + e + 2.0 * a * q + 2.0 * (a * q * (1.0 + e + a * q)).sqrt();
    (numerator / (4.0 * a)).log2()
}

/// (2 asinh(sqrt(aq)) - ln a - ln 4) / ln 2 for a constant dispersion a
fn vst_mean(q: f64, alpha: f64) -> f64 {
    let q = q.max(0.0);
    (2.0 * (alpha * q).sqrt().asinh() - alpha.ln() - 4.0_f64.ln()) / std::f64::consts::LN_2
}

/// Apply the closed-form VST matching `trend` to normalized counts (genes x samples)
pub fn vst(normalized: &Array2<f64>, trend: &DispersionTrend) -> Result<Array2<f64>> {
    let transformed = match *trend {
        DispersionTrend::Parametric { asympt_disp, extra_pois } => {
            if asympt_disp <= 0.0 || extra_pois < 0.0 {
                return Err(ReportError::render(HEATMAP_INPUT, format!(
                    "vst needs a positive dispersion trend (a0={}, a1={})",
                    asympt_disp, extra_pois
                )));
            }
            normalized.mapv(|q| vst_parametric(q, asympt_disp, extra_pois))
        }
        DispersionTrend::Mean(alpha) => {
            if alpha <= 0.0 {
                return Err(ReportError::render(HEATMAP_INPUT, "vst needs a positive mean dispersion"));
            }
            normalized.mapv(|q| vst_mean(q, alpha))
        }
    };
    if transformed.iter().any(|v| !v.is_finite()) {
        return Err(ReportError::render(HEATMAP_INPUT, "vst produced non-finite values"));
    }
    Ok(transformed)
}
