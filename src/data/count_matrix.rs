//! Gene-by-sample count matrix

use std::collections::{HashMap, HashSet};

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use crate::error::{ReportError, Result};

/// Rename repeated gene identifiers to `name_1`, `name_2`, ...
///
/// A suffix already taken by another identifier is skipped.
fn deduplicate_names(names: Vec<String>) -> Vec<String> {
    let mut taken: HashSet<String> = names.iter().cloned().collect();
    let mut first_seen: HashSet<String> = HashSet::new();
    let mut next_suffix: HashMap<String, usize> = HashMap::new();
    names
        .into_iter()
        .map(|name| {
            if first_seen.insert(name.clone()) {
                return name;
            }
            let suffix = next_suffix.entry(name.clone()).or_insert(1);
            let mut renamed = format!("{}_{}", name, suffix);
            while taken.contains(&renamed) {
                *suffix += 1;
                renamed = format!("{}_{}", name, suffix);
            }
            *suffix += 1;
            taken.insert(renamed.clone());
            log::warn!("Duplicate gene name '{}' renamed to '{}'", name, renamed);
            renamed
        })
        .collect()
}

/// Read counts with genes as rows and samples as columns.
///
/// Values are rounded to integers on construction.
#[derive(Debug, Clone)]
pub struct CountMatrix {
    counts: Array2<f64>,
    gene_ids: Vec<String>,
    sample_ids: Vec<String>,
}

impl CountMatrix {
    pub fn new(counts: Array2<f64>, gene_ids: Vec<String>, sample_ids: Vec<String>) -> Result<Self> {
        let (n_genes, n_samples) = counts.dim();
        if gene_ids.len() != n_genes || sample_ids.len() != n_samples {
            return Err(ReportError::input(format!(
                "count matrix is {}x{} but has {} gene and {} sample identifiers",
                n_genes,
                n_samples,
                gene_ids.len(),
                sample_ids.len()
            )));
        }
        if counts.iter().any(|&x| !x.is_finite() || x < 0.0) {
            return Err(ReportError::input("counts must be non-negative finite values"));
        }
        if counts.iter().any(|&x| x != x.round()) {
            log::warn!("Non-integer counts found; values are rounded to the nearest integer");
        }

        Ok(Self {
            counts: counts.mapv(f64::round),
            gene_ids: deduplicate_names(gene_ids),
            sample_ids,
        })
    }

    pub fn n_genes(&self) -> usize {
        self.counts.nrows()
    }

    pub fn n_samples(&self) -> usize {
        self.counts.ncols()
    }

    pub fn counts(&self) -> ArrayView2<'_, f64> {
        self.counts.view()
    }

    pub fn gene_ids(&self) -> &[String] {
        &self.gene_ids
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn gene_counts(&self, gene_idx: usize) -> ArrayView1<'_, f64> {
        self.counts.row(gene_idx)
    }

    pub fn sample_index(&self, sample_id: &str) -> Option<usize> {
        self.sample_ids.iter().position(|id| id == sample_id)
    }

    /// Total count per gene across all samples
    pub fn gene_totals(&self) -> Vec<f64> {
        self.counts.axis_iter(Axis(0)).map(|row| row.sum()).collect()
    }

    /// Select samples (columns) in the given order
    pub fn select_samples(&self, sample_indices: &[usize]) -> Self {
        Self {
            counts: self.counts.select(Axis(1), sample_indices),
            gene_ids: self.gene_ids.clone(),
            sample_ids: sample_indices.iter().map(|&i| self.sample_ids[i].clone()).collect(),
        }
    }

    /// Select genes (rows) in the given order
    pub fn select_genes(&self, gene_indices: &[usize]) -> Self {
        Self {
            counts: self.counts.select(Axis(0), gene_indices),
            gene_ids: gene_indices.iter().map(|&i| self.gene_ids[i].clone()).collect(),
            sample_ids: self.sample_ids.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn ids(prefix: &str, n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("{}{}", prefix, i)).collect()
    }

    #[test]
    fn test_count_matrix_creation() {
        let m = CountMatrix::new(array![[10.0, 20.0, 30.0], [5.0, 15.0, 25.0]], ids("g", 2), ids("s", 3))
            .unwrap();
        assert_eq!(m.n_genes(), 2);
        assert_eq!(m.n_samples(), 3);
        assert_eq!(m.gene_totals(), vec![60.0, 45.0]);
    }

    #[test]
    fn test_negative_counts_rejected() {
        let result = CountMatrix::new(array![[10.0, -5.0], [5.0, 15.0]], ids("g", 2), ids("s", 2));
        assert!(matches!(result, Err(ReportError::Input { .. })));
    }

    #[test]
    fn test_fractional_counts_rounded() {
        let m = CountMatrix::new(array![[1.4, 2.6]], ids("g", 1), ids("s", 2)).unwrap();
        assert_eq!(m.gene_counts(0).to_vec(), vec![1.0, 3.0]);
    }

    #[test]
    fn test_duplicate_gene_names_renamed() {
        let m = CountMatrix::new(
            array![[1.0], [2.0], [3.0]],
            vec!["A".into(), "A".into(), "B".into()],
            ids("s", 1),
        )
        .unwrap();
        assert_eq!(m.gene_ids(), &["A", "A_1", "B"]);
    }

    #[test]
    fn test_renamed_duplicate_skips_existing_name() {
        let m = CountMatrix::new(
            array![[1.0], [2.0], [3.0]],
            vec!["A".into(), "A".into(), "A_1".into()],
            ids("s", 1),
        )
        .unwrap();
        assert_eq!(m.gene_ids(), &["A", "A_2", "A_1"]);
        assert_eq!(m.gene_counts(2).to_vec(), vec![3.0]);
    }

    #[test]
    fn test_select_samples_reorders() {
        let m = CountMatrix::new(array![[1.0, 2.0, 3.0]], ids("g", 1), ids("s", 3)).unwrap();
        let sub = m.select_samples(&[2, 0]);
        assert_eq!(sub.sample_ids(), &["s3", "s1"]);
        assert_eq!(sub.gene_counts(0).to_vec(), vec![3.0, 1.0]);
    }
}
