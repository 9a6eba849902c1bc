//! Tab-delimited reading and writing of count matrices and metadata

use std::path::Path;

use ndarray::Array2;

use crate::data::{CountMatrix, SampleMetadata};
use crate::error::{ReportError, Result};

pub(crate) fn tsv_reader<P: AsRef<Path>>(path: P) -> Result<csv::Reader<std::fs::File>> {
    Ok(csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)?)
}

fn tsv_writer<P: AsRef<Path>>(path: P) -> Result<csv::Writer<std::fs::File>> {
    Ok(csv::WriterBuilder::new().delimiter(b'\t').from_path(path)?)
}

pub(crate) fn strip_bom(s: &str) -> &str {
    s.trim_start_matches('\u{feff}')
}

/// Read a count matrix: first column gene identifiers, remaining columns samples
pub fn read_count_matrix<P: AsRef<Path>>(path: P) -> Result<CountMatrix> {
    let mut reader = tsv_reader(path)?;
    let header = reader.headers()?.clone();
    if header.len() < 2 {
        return Err(ReportError::input("count matrix needs a gene column and at least one sample column"));
    }
    let sample_ids: Vec<String> = header.iter().skip(1).map(|s| strip_bom(s).to_string()).collect();
    let n_samples = sample_ids.len();

    let mut gene_ids = Vec::new();
    let mut values = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }
        let gene = record.get(0).unwrap_or_default().to_string();
        for field in record.iter().skip(1) {
            let v: f64 = field.parse().map_err(|_| {
                ReportError::input(format!("invalid count value '{}' for gene '{}'", field, gene))
            })?;
            values.push(v);
        }
        gene_ids.push(gene);
    }

    if gene_ids.is_empty() {
        return Err(ReportError::input("count matrix contains no genes"));
    }

    let counts = Array2::from_shape_vec((gene_ids.len(), n_samples), values)
        .map_err(|e| ReportError::input(format!("malformed count matrix: {}", e)))?;
    CountMatrix::new(counts, gene_ids, sample_ids)
}

/// Read sample metadata. Requires `sample` and `group` columns; others are ignored.
pub fn read_metadata<P: AsRef<Path>>(path: P) -> Result<SampleMetadata> {
    let mut reader = tsv_reader(path)?;
    let header = reader.headers()?.clone();
    let column = |name: &str| header.iter().position(|h| strip_bom(h) == name);
    let (sample_col, group_col) = match (column("sample"), column("group")) {
        (Some(s), Some(g)) => (s, g),
        (None, _) => return Err(ReportError::input("metadata lacks a 'sample' column")),
        (_, None) => return Err(ReportError::input("metadata lacks a 'group' column")),
    };

    let mut samples = Vec::new();
    let mut groups = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }
        samples.push(record.get(sample_col).unwrap_or_default().to_string());
        groups.push(record.get(group_col).unwrap_or_default().to_string());
    }

    SampleMetadata::new(samples, groups)
}

/// Write a count matrix with a `gene_id` header column
pub fn write_count_matrix<P: AsRef<Path>>(path: P, matrix: &CountMatrix) -> Result<()> {
    let mut writer = tsv_writer(path)?;
    let mut header = vec!["gene_id".to_string()];
    header.extend(matrix.sample_ids().iter().cloned());
    writer.write_record(&header)?;
    for (i, gene) in matrix.gene_ids().iter().enumerate() {
        let mut row = vec![gene.clone()];
        row.extend(matrix.gene_counts(i).iter().map(|c| format!("{}", *c as u64)));
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write a two-column `sample`/`group` metadata table
pub fn write_metadata<P: AsRef<Path>>(path: P, metadata: &SampleMetadata) -> Result<()> {
    let mut writer = tsv_writer(path)?;
    writer.write_record(["sample", "group"])?;
    for (i, sample) in metadata.sample_ids().iter().enumerate() {
        writer.write_record([sample.as_str(), metadata.group().value(i)])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_count_matrix() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "gene_id\ts1\ts2\ts3").unwrap();
        writeln!(file, "gene1\t100\t200\t150").unwrap();
        writeln!(file, "gene2\t50\t75\t60").unwrap();

        let matrix = read_count_matrix(file.path()).unwrap();
        assert_eq!(matrix.n_genes(), 2);
        assert_eq!(matrix.sample_ids(), &["s1", "s2", "s3"]);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "gene_id\ts1\ts2").unwrap();
        writeln!(file, "gene1\t1").unwrap();
        assert!(read_count_matrix(file.path()).is_err());
    }

    #[test]
    fn test_non_numeric_count_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "gene_id\ts1").unwrap();
        writeln!(file, "gene1\tmany").unwrap();
        assert!(matches!(read_count_matrix(file.path()), Err(ReportError::Input { .. })));
    }

    #[test]
    fn test_metadata_extra_columns_ignored() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "batch\tgroup\tsample").unwrap();
        writeln!(file, "b1\tcontrol\ts1").unwrap();
        writeln!(file, "b2\ttreatment\ts2").unwrap();
        let meta = read_metadata(file.path()).unwrap();
        assert_eq!(meta.sample_ids(), &["s1", "s2"]);
        assert_eq!(meta.group().levels(), &["control", "treatment"]);
    }

    #[test]
    fn test_metadata_missing_group_column() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "sample\tcondition").unwrap();
        writeln!(file, "s1\tcontrol").unwrap();
        let err = read_metadata(file.path()).unwrap_err();
        assert!(err.to_string().contains("'group'"));
    }

    #[test]
    fn test_write_then_read_count_matrix() {
        let matrix = CountMatrix::new(
            ndarray::array![[1.0, 2.0], [3.0, 4.0]],
            vec!["a".into(), "b".into()],
            vec!["x".into(), "y".into()],
        )
        .unwrap();
        let file = NamedTempFile::new().unwrap();
        write_count_matrix(file.path(), &matrix).unwrap();
        let back = read_count_matrix(file.path()).unwrap();
        assert_eq!(back.counts(), matrix.counts());
    }
}
