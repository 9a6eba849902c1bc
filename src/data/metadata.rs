//! Sample metadata with the grouping factor

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{ReportError, Result};

/// Categorical factor with lexicographically sorted levels.
///
/// The first level is the baseline for treatment coding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Factor {
    levels: Vec<String>,
    codes: Vec<usize>,
}

impl Factor {
    pub fn new(values: &[String]) -> Self {
        let mut levels: Vec<String> = values.to_vec();
        levels.sort();
        levels.dedup();
        let codes = values
            .iter()
            .map(|v| levels.iter().position(|l| l == v).unwrap_or(0))
            .collect();
        Self { levels, codes }
    }

    pub fn levels(&self) -> &[String] {
        &self.levels
    }

    pub fn n_levels(&self) -> usize {
        self.levels.len()
    }

    /// Level index of each observation
    pub fn codes(&self) -> &[usize] {
        &self.codes
    }

    pub fn baseline(&self) -> Option<&str> {
        self.levels.first().map(|s| s.as_str())
    }

    pub fn value(&self, idx: usize) -> &str {
        &self.levels[self.codes[idx]]
    }

    /// Select observations in the given order, keeping the level set
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            levels: self.levels.clone(),
            codes: indices.iter().map(|&i| self.codes[i]).collect(),
        }
    }
}

/// One row per sample: the unique `sample` key and its `group`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleMetadata {
    sample_ids: Vec<String>,
    group: Factor,
}

impl SampleMetadata {
    pub fn new(sample_ids: Vec<String>, groups: Vec<String>) -> Result<Self> {
        if sample_ids.len() != groups.len() {
            return Err(ReportError::input(format!(
                "metadata has {} samples but {} group values",
                sample_ids.len(),
                groups.len()
            )));
        }
        if sample_ids.is_empty() {
            return Err(ReportError::input("metadata contains no samples"));
        }
        let mut seen = HashSet::new();
        for id in &sample_ids {
            if !seen.insert(id) {
                return Err(ReportError::input(format!("duplicate sample '{}' in metadata", id)));
            }
        }
        Ok(Self {
            group: Factor::new(&groups),
            sample_ids,
        })
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    pub fn group(&self) -> &Factor {
        &self.group
    }

    /// Number of samples in each level, in level order
    pub fn level_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.group.n_levels()];
        for &c in self.group.codes() {
            sizes[c] += 1;
        }
        sizes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_factor_levels_sorted() {
        let f = Factor::new(&strings(&["treatment", "control", "treatment"]));
        assert_eq!(f.levels(), &["control", "treatment"]);
        assert_eq!(f.codes(), &[1, 0, 1]);
        assert_eq!(f.baseline(), Some("control"));
        assert_eq!(f.value(0), "treatment");
    }

    #[test]
    fn test_duplicate_sample_rejected() {
        let r = SampleMetadata::new(strings(&["s1", "s1"]), strings(&["a", "b"]));
        assert!(matches!(r, Err(ReportError::Input { .. })));
    }

    #[test]
    fn test_level_sizes() {
        let m = SampleMetadata::new(strings(&["s1", "s2", "s3"]), strings(&["b", "a", "b"])).unwrap();
        assert_eq!(m.level_sizes(), vec![1, 2]);
    }
}
