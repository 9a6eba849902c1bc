//! Design matrix for the `~ group` model

use ndarray::Array2;

use crate::data::SampleMetadata;
use crate::error::{ReportError, Result};

/// Name of the metadata factor the model is built on
pub const DESIGN_VARIABLE: &str = "group";

/// Treatment-coded design matrix with its coefficient names
#[derive(Debug, Clone)]
pub struct DesignMatrix {
    pub matrix: Array2<f64>,
    /// `Intercept`, then `group_<level>_vs_<baseline>` for each non-baseline level
    pub coef_names: Vec<String>,
}

impl DesignMatrix {
    pub fn n_coefs(&self) -> usize {
        self.matrix.ncols()
    }

    pub fn n_samples(&self) -> usize {
        self.matrix.nrows()
    }

    /// Residual degrees of freedom
    pub fn df_residual(&self) -> usize {
        self.n_samples().saturating_sub(self.n_coefs())
    }
}

/// Build the `~ group` design with the first sorted level as baseline.
///
/// Fails with a model fit error when the factor has a single level or when
/// there are no residual degrees of freedom for dispersion estimation.
pub fn build_group_design(metadata: &SampleMetadata) -> Result<DesignMatrix> {
    let group = metadata.group();
    let levels = group.levels();
    if levels.len() < 2 {
        return Err(ReportError::model_fit(format!(
            "'{}' needs at least two levels, found {}",
            DESIGN_VARIABLE,
            levels.len()
        )));
    }

    let n = metadata.n_samples();
    let p = levels.len();
    if n <= p {
        return Err(ReportError::model_fit(format!(
            "design has {} coefficients but only {} samples; no replicates for dispersion estimation",
            p, n
        )));
    }

    let baseline = &levels[0];
    let mut coef_names = vec!["Intercept".to_string()];
    coef_names.extend(
        levels[1..]
            .iter()
            .map(|level| format!("{}_{}_vs_{}", DESIGN_VARIABLE, level, baseline)),
    );

    let mut matrix = Array2::zeros((n, p));
    for (i, &code) in group.codes().iter().enumerate() {
        matrix[[i, 0]] = 1.0;
        if code > 0 {
            matrix[[i, code]] = 1.0;
        }
    }

    Ok(DesignMatrix { matrix, coef_names })
}

/// Per-sample design used by the regularized log: intercept plus one indicator per sample
pub fn sample_indicator_design(n_samples: usize) -> Array2<f64> {
    let mut m = Array2::zeros((n_samples, n_samples + 1));
    for i in 0..n_samples {
        m[[i, 0]] = 1.0;
        m[[i, i + 1]] = 1.0;
    }
    m
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(groups: &[&str]) -> SampleMetadata {
        SampleMetadata::new(
            (1..=groups.len()).map(|i| format!("s{}", i)).collect(),
            groups.iter().map(|s| s.to_string()).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_two_group_design() {
        let d = build_group_design(&meta(&["treatment", "control", "treatment", "control"])).unwrap();
        assert_eq!(d.coef_names, vec!["Intercept", "group_treatment_vs_control"]);
        assert_eq!(d.matrix.column(1).to_vec(), vec![1.0, 0.0, 1.0, 0.0]);
        assert_eq!(d.df_residual(), 2);
    }

    #[test]
    fn test_three_group_names_in_level_order() {
        let d = build_group_design(&meta(&["b", "a", "c", "a", "b", "c"])).unwrap();
        assert_eq!(d.coef_names, vec!["Intercept", "group_b_vs_a", "group_c_vs_a"]);
    }

    #[test]
    fn test_single_level_is_model_fit_error() {
        let r = build_group_design(&meta(&["a", "a", "a"]));
        assert!(matches!(r, Err(ReportError::ModelFit { .. })));
    }

    #[test]
    fn test_no_replicates_is_model_fit_error() {
        let r = build_group_design(&meta(&["a", "b"]));
        assert!(matches!(r, Err(ReportError::ModelFit { .. })));
    }
}
