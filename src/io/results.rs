//! Differential expression result table

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::stats::cmp_nan_last;

/// Column order of every persisted gene table
pub const GENE_TABLE_COLUMNS: [&str; 7] = [
    "gene_id",
    "baseMean",
    "log2FoldChange",
    "lfcSE",
    "stat",
    "pvalue",
    "padj",
];

/// Per-gene statistics for the selected coefficient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeRow {
    pub gene_id: String,
    pub base_mean: f64,
    pub log2_fold_change: f64,
    pub lfc_se: f64,
    pub stat: f64,
    pub pvalue: Option<f64>,
    pub padj: Option<f64>,
}

/// Results of one run: rows sorted by padj ascending, missing padj last
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeResult {
    pub rows: Vec<DeRow>,
    /// Coefficient the statistics refer to
    pub contrast: String,
    /// Shrinkage estimator applied to the fold changes ("none" when unshrunk)
    pub shrinkage: String,
}

impl DeResult {
    /// Build a result and apply the canonical padj ordering.
    ///
    /// The sort is stable, so ties keep the input order.
    pub fn new(mut rows: Vec<DeRow>, contrast: String, shrinkage: String) -> Self {
        rows.sort_by(|a, b| {
            cmp_nan_last(a.padj.unwrap_or(f64::NAN), b.padj.unwrap_or(f64::NAN))
        });
        Self { rows, contrast, shrinkage }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn format_value(v: f64) -> String {
    if v.is_finite() {
        format!("{}", v)
    } else {
        "NA".to_string()
    }
}

fn format_optional(v: Option<f64>) -> String {
    v.map(format_value).unwrap_or_else(|| "NA".to_string())
}

/// Write gene rows as TSV. The header is always written, even for zero rows.
pub fn write_gene_table<P: AsRef<Path>>(path: P, rows: &[DeRow]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new().delimiter(b'\t').from_path(path)?;
    writer.write_record(GENE_TABLE_COLUMNS)?;
    for row in rows {
        writer.write_record([
            row.gene_id.clone(),
            format_value(row.base_mean),
            format_value(row.log2_fold_change),
            format_value(row.lfc_se),
            format_value(row.stat),
            format_optional(row.pvalue),
            format_optional(row.padj),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn row(id: &str, lfc: f64, padj: Option<f64>) -> DeRow {
        DeRow {
            gene_id: id.to_string(),
            base_mean: 100.0,
            log2_fold_change: lfc,
            lfc_se: 0.2,
            stat: lfc / 0.2,
            pvalue: padj,
            padj,
        }
    }

    #[test]
    fn test_sort_puts_missing_padj_last() {
        let r = DeResult::new(
            vec![row("a", 0.0, None), row("b", 1.0, Some(0.5)), row("c", 2.0, Some(0.01))],
            "group_t_vs_c".into(),
            "none".into(),
        );
        let ids: Vec<&str> = r.rows.iter().map(|r| r.gene_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_sort_is_stable_on_ties() {
        let r = DeResult::new(
            vec![row("x", 0.0, Some(1.0)), row("y", 0.0, Some(1.0)), row("z", 0.0, Some(1.0))],
            String::new(),
            String::new(),
        );
        let ids: Vec<&str> = r.rows.iter().map(|r| r.gene_id.as_str()).collect();
        assert_eq!(ids, vec!["x", "y", "z"]);
    }

    #[test]
    fn test_empty_table_has_header_only() {
        let file = NamedTempFile::new().unwrap();
        write_gene_table(file.path(), &[]).unwrap();
        let text = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(text, "gene_id\tbaseMean\tlog2FoldChange\tlfcSE\tstat\tpvalue\tpadj\n");
    }

    #[test]
    fn test_missing_values_written_as_na() {
        let file = NamedTempFile::new().unwrap();
        write_gene_table(file.path(), &[row("g", 1.5, None)]).unwrap();
        let text = std::fs::read_to_string(file.path()).unwrap();
        let line = text.lines().nth(1).unwrap();
        assert!(line.starts_with("g\t100\t1.5\t"));
        assert!(line.ends_with("\tNA\tNA"));
    }
}
