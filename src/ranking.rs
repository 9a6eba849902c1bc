//! Gene ranking and significance filters over a result table

use serde::{Deserialize, Serialize};

use crate::io::{DeResult, DeRow};

/// Thresholds for the top-genes table and the strict significant set
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingPolicy {
    /// padj cut for the top-genes table
    pub top_padj: f64,
    /// padj cut for the strict set
    pub strict_padj: f64,
    /// |log2FoldChange| must exceed this for the strict set
    pub strict_lfc: f64,
}

impl Default for RankingPolicy {
    fn default() -> Self {
        Self {
            top_padj: 0.05,
            strict_padj: 0.05,
            strict_lfc: 1.0,
        }
    }
}

impl RankingPolicy {
    pub fn is_strict_significant(&self, row: &DeRow) -> bool {
        row.padj.is_some_and(|p| p < self.strict_padj) && row.log2_fold_change.abs() > self.strict_lfc
    }

    /// Rows with padj below `top_padj`, padj ascending
    pub fn top_genes(&self, result: &DeResult) -> Vec<DeRow> {
        let mut rows: Vec<DeRow> = result
            .rows
            .iter()
            .filter(|r| r.padj.is_some_and(|p| p < self.top_padj))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.padj.unwrap_or(f64::NAN).total_cmp(&b.padj.unwrap_or(f64::NAN)));
        rows
    }

    /// Rows passing both the padj and the fold change cut, in result order
    pub fn strict_significant(&self, result: &DeResult) -> Vec<DeRow> {
        result
            .rows
            .iter()
            .filter(|r| self.is_strict_significant(r))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, lfc: f64, padj: Option<f64>) -> DeRow {
        DeRow {
            gene_id: id.to_string(),
            base_mean: 100.0,
            log2_fold_change: lfc,
            lfc_se: 0.2,
            stat: 1.0,
            pvalue: padj,
            padj,
        }
    }

    fn result() -> DeResult {
        DeResult::new(
            vec![
                row("a", 0.5, Some(0.01)),
                row("b", -2.0, Some(0.001)),
                row("c", 3.0, Some(0.2)),
                row("d", 4.0, None),
                row("e", 1.5, Some(0.049)),
            ],
            "group_t_vs_c".to_string(),
            "ashr".to_string(),
        )
    }

    #[test]
    fn test_top_genes_sorted_and_thresholded() {
        let top = RankingPolicy::default().top_genes(&result());
        let ids: Vec<&str> = top.iter().map(|r| r.gene_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "e"]);
        assert!(top.iter().all(|r| r.padj.unwrap() < 0.05));
    }

    #[test]
    fn test_strict_set_needs_fold_change() {
        let strict = RankingPolicy::default().strict_significant(&result());
        let ids: Vec<&str> = strict.iter().map(|r| r.gene_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "e"]);
    }

    #[test]
    fn test_empty_result_gives_empty_tables() {
        let empty = DeResult::new(vec![row("x", 5.0, None)], "c".to_string(), "none".to_string());
        let policy = RankingPolicy::default();
        assert!(policy.top_genes(&empty).is_empty());
        assert!(policy.strict_significant(&empty).is_empty());
    }
}
