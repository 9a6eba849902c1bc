//! Count transformations for visualisation

mod rlog;
mod vst;

pub use rlog::rlog;
pub use vst::vst;

use ndarray::Array2;

use crate::dispersion::DispersionTrend;
use crate::error::{ReportError, Result};

/// Artifact the transforms feed; their errors are recovered there
pub(crate) const HEATMAP_INPUT: &str = "heatmap.svg";

/// Above this many samples the VST is used instead of rlog
pub const VST_SAMPLE_THRESHOLD: usize = 30;

/// Transform that produced a matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformKind {
    Vst,
    Rlog,
    Log2,
}

impl TransformKind {
    pub fn label(&self) -> &'static str {
        match self {
            TransformKind::Vst => "vst",
            TransformKind::Rlog => "rlog",
            TransformKind::Log2 => "log2(normalized + 1)",
        }
    }
}

/// Model state the transforms are computed from
#[derive(Debug, Clone, Copy)]
pub struct TransformInput<'a> {
    /// Raw counts, genes x samples
    pub counts: &'a Array2<f64>,
    pub size_factors: &'a [f64],
    pub trend: &'a DispersionTrend,
    pub trended_dispersions: &'a [f64],
}

impl TransformInput<'_> {
    pub fn normalized(&self) -> Array2<f64> {
        let sf = self.size_factors;
        Array2::from_shape_fn(self.counts.dim(), |(i, j)| self.counts[[i, j]] / sf[j])
    }
}

/// log2(normalized count + 1)
pub fn log2_normalized(normalized: &Array2<f64>) -> Array2<f64> {
    normalized.mapv(|q| (q + 1.0).log2())
}

/// VST for large cohorts, rlog otherwise; log2(normalized + 1) when that fails.
///
/// Errors only when even the log2 fallback is not finite.
pub fn normalize_for_heatmap(input: &TransformInput) -> Result<(TransformKind, Array2<f64>)> {
    let n_samples = input.counts.ncols();
    let attempt = if n_samples > VST_SAMPLE_THRESHOLD {
        vst(&input.normalized(), input.trend).map(|m| (TransformKind::Vst, m))
    } else {
        rlog(input.counts, input.size_factors, input.trended_dispersions).map(|m| (TransformKind::Rlog, m))
    };
    match attempt {
        Ok(out) => Ok(out),
        Err(e) => {
            log::warn!("heatmap transform failed ({}); using log2(normalized + 1)", e);
            let fallback = log2_normalized(&input.normalized());
            if fallback.iter().any(|v| !v.is_finite()) {
                return Err(ReportError::render(HEATMAP_INPUT, "no transform produced finite values"));
            }
            Ok((TransformKind::Log2, fallback))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_small_cohort_uses_rlog() {
        let counts = array![[100.0, 120.0, 80.0, 110.0], [10.0, 30.0, 12.0, 25.0]];
        let trend = DispersionTrend::Mean(0.1);
        let input = TransformInput {
            counts: &counts,
            size_factors: &[1.0; 4],
            trend: &trend,
            trended_dispersions: &[0.1, 0.1],
        };
        let (kind, m) = normalize_for_heatmap(&input).unwrap();
        assert_eq!(kind, TransformKind::Rlog);
        assert_eq!(m.dim(), (2, 4));
    }

    #[test]
    fn test_large_cohort_uses_vst() {
        let counts = Array2::from_shape_fn((3, 31), |(i, j)| (10 * (i + 1) + j) as f64);
        let trend = DispersionTrend::Parametric { asympt_disp: 0.05, extra_pois: 1.0 };
        let sf = vec![1.0; 31];
        let input = TransformInput {
            counts: &counts,
            size_factors: &sf,
            trend: &trend,
            trended_dispersions: &[0.1, 0.1, 0.1],
        };
        let (kind, _) = normalize_for_heatmap(&input).unwrap();
        assert_eq!(kind, TransformKind::Vst);
    }

    #[test]
    fn test_failed_transform_falls_back_to_log2() {
        let counts = Array2::from_shape_fn((1, 31), |(_, j)| j as f64);
        let trend = DispersionTrend::Mean(0.0);
        let sf = vec![1.0; 31];
        let input = TransformInput {
            counts: &counts,
            size_factors: &sf,
            trend: &trend,
            trended_dispersions: &[0.1],
        };
        let (kind, m) = normalize_for_heatmap(&input).unwrap();
        assert_eq!(kind, TransformKind::Log2);
        assert!((m[[0, 1]] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_unusable_fallback_is_recoverable_render_error() {
        let counts = Array2::from_shape_fn((1, 31), |(_, j)| (j + 1) as f64);
        let trend = DispersionTrend::Mean(0.0);
        let sf = vec![0.0; 31];
        let input = TransformInput {
            counts: &counts,
            size_factors: &sf,
            trend: &trend,
            trended_dispersions: &[0.1],
        };
        let err = normalize_for_heatmap(&input).unwrap_err();
        assert!(matches!(err, ReportError::Render { .. }));
        assert!(!err.is_fatal());
    }
}
