//! Choice of the reported coefficient

use crate::error::{ReportError, Result};
use crate::glm::DESIGN_VARIABLE;

/// True for names shaped like `group_<x>_vs_<y>` with non-empty levels
fn is_group_contrast(name: &str) -> bool {
    let Some(rest) = name
        .strip_prefix(DESIGN_VARIABLE)
        .and_then(|r| r.strip_prefix('_'))
    else {
        return false;
    };
    match rest.find("_vs_") {
        Some(pos) => pos > 0 && pos + 4 < rest.len(),
        None => false,
    }
}

/// Index of the coefficient to report.
///
/// The first `group_<x>_vs_<y>` name wins; otherwise the second coefficient
/// (the first after the intercept). With more than two groups this only ever
/// reports the first level against the baseline.
pub fn select_coefficient(coef_names: &[String]) -> Result<usize> {
    if let Some(idx) = coef_names.iter().position(|n| is_group_contrast(n)) {
        return Ok(idx);
    }
    if coef_names.len() > 1 {
        log::warn!(
            "no '{}_<x>_vs_<y>' coefficient; reporting '{}'",
            DESIGN_VARIABLE,
            coef_names[1]
        );
        return Ok(1);
    }
    Err(ReportError::model_fit("model has no coefficient besides the intercept"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_first_matching_coefficient_wins() {
        let n = names(&["Intercept", "group_b_vs_a", "group_c_vs_a"]);
        assert_eq!(select_coefficient(&n).unwrap(), 1);
        let n = names(&["Intercept", "batch2", "group_t_vs_c"]);
        assert_eq!(select_coefficient(&n).unwrap(), 2);
    }

    #[test]
    fn test_falls_back_to_second_coefficient() {
        let n = names(&["Intercept", "slope"]);
        assert_eq!(select_coefficient(&n).unwrap(), 1);
    }

    #[test]
    fn test_intercept_only_fails() {
        assert!(select_coefficient(&names(&["Intercept"])).is_err());
    }

    #[test]
    fn test_pattern_requires_both_levels() {
        assert!(!is_group_contrast("group__vs_a"));
        assert!(!is_group_contrast("group_a_vs_"));
        assert!(is_group_contrast("group_treatment_vs_control"));
    }
}
