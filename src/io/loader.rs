//! Input loading and validation
//!
//! Reads the count matrix and metadata, then restricts and reorders the
//! matrix columns to the metadata sample order. Any failure here is an
//! input error; nothing is written to disk.

use std::path::Path;

use crate::data::{CountMatrix, SampleMetadata};
use crate::error::{ReportError, Result};

use super::tsv::{read_count_matrix, read_metadata};

fn as_input_error(source: &Path, err: ReportError) -> ReportError {
    match err {
        ReportError::Input { reason } => ReportError::input(format!("{}: {}", source.display(), reason)),
        other => ReportError::input(format!("{}: {}", source.display(), other)),
    }
}

/// Align a count matrix to the metadata sample order.
///
/// Every metadata sample must be a count matrix column; extra matrix
/// columns are dropped.
pub fn align_to_metadata(counts: &CountMatrix, metadata: &SampleMetadata) -> Result<CountMatrix> {
    let missing: Vec<&str> = metadata
        .sample_ids()
        .iter()
        .filter(|s| counts.sample_index(s).is_none())
        .map(|s| s.as_str())
        .collect();
    if !missing.is_empty() {
        return Err(ReportError::input(format!(
            "metadata samples not found in count matrix: {}",
            missing.join(", ")
        )));
    }

    let order: Vec<usize> = metadata
        .sample_ids()
        .iter()
        .filter_map(|s| counts.sample_index(s))
        .collect();
    if order.len() < counts.n_samples() {
        log::info!(
            "Dropping {} count matrix columns absent from metadata",
            counts.n_samples() - order.len()
        );
    }
    Ok(counts.select_samples(&order))
}

/// Load and validate both inputs
pub fn load_inputs<P: AsRef<Path>, Q: AsRef<Path>>(
    counts_path: P,
    metadata_path: Q,
) -> Result<(CountMatrix, SampleMetadata)> {
    let counts_path = counts_path.as_ref();
    let metadata_path = metadata_path.as_ref();

    log::info!("Loading count matrix from: {}", counts_path.display());
    let counts = read_count_matrix(counts_path).map_err(|e| as_input_error(counts_path, e))?;
    log::info!("  {} genes, {} samples", counts.n_genes(), counts.n_samples());

    log::info!("Loading metadata from: {}", metadata_path.display());
    let metadata = read_metadata(metadata_path).map_err(|e| as_input_error(metadata_path, e))?;
    log::info!(
        "  {} samples, groups: {}",
        metadata.n_samples(),
        metadata.group().levels().join(", ")
    );

    let aligned = align_to_metadata(&counts, &metadata)?;
    Ok((aligned, metadata))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write(lines: &[&str]) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        for l in lines {
            writeln!(f, "{}", l).unwrap();
        }
        f
    }

    #[test]
    fn test_columns_follow_metadata_order() {
        let counts = write(&["gene\ta\tb\tc\td", "g1\t1\t2\t3\t4", "g2\t5\t6\t7\t8"]);
        let meta = write(&["sample\tgroup", "c\tx", "a\ty", "d\tx"]);
        let (m, md) = load_inputs(counts.path(), meta.path()).unwrap();
        assert_eq!(m.sample_ids(), md.sample_ids());
        assert_eq!(m.sample_ids(), &["c", "a", "d"]);
        assert_eq!(m.gene_counts(1).to_vec(), vec![7.0, 5.0, 8.0]);
    }

    #[test]
    fn test_unknown_sample_is_input_error() {
        let counts = write(&["gene\ta\tb", "g1\t1\t2"]);
        let meta = write(&["sample\tgroup", "a\tx", "zz\ty"]);
        let err = load_inputs(counts.path(), meta.path()).unwrap_err();
        assert!(matches!(err, ReportError::Input { .. }));
        assert!(err.to_string().contains("zz"));
    }

    #[test]
    fn test_missing_sample_column_is_input_error() {
        let counts = write(&["gene\ta\tb", "g1\t1\t2"]);
        let meta = write(&["name\tgroup", "a\tx"]);
        assert!(matches!(
            load_inputs(counts.path(), meta.path()),
            Err(ReportError::Input { .. })
        ));
    }

    #[test]
    fn test_unreadable_file_is_input_error() {
        let meta = write(&["sample\tgroup", "a\tx"]);
        let err = load_inputs("/nonexistent/counts.tsv", meta.path()).unwrap_err();
        assert!(matches!(err, ReportError::Input { .. }));
    }
}
