//! Gene-set libraries in GMT format

use std::collections::BTreeSet;
use std::path::Path;

use crate::error::Result;

/// One named set of gene identifiers
#[derive(Debug, Clone, PartialEq)]
pub struct GeneSet {
    pub term_id: String,
    pub term_name: String,
    /// Sorted, deduplicated members
    pub genes: Vec<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct GeneSetLibrary {
    pub sets: Vec<GeneSet>,
}

impl GeneSetLibrary {
    pub fn new(sets: Vec<GeneSet>) -> Self {
        Self { sets }
    }

    /// Read a GMT file: `term_id<TAB>term_name<TAB>id<TAB>id...`.
    ///
    /// Non-numeric members are skipped; rows with fewer than three fields are ignored.
    pub fn from_gmt<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(path)?;

        let mut sets = Vec::new();
        for record in reader.records() {
            let record = record?;
            if record.len() < 3 {
                continue;
            }
            let genes: BTreeSet<u64> = record.iter().skip(2).filter_map(|g| g.parse().ok()).collect();
            if genes.is_empty() {
                continue;
            }
            sets.push(GeneSet {
                term_id: record[0].to_string(),
                term_name: record[1].to_string(),
                genes: genes.into_iter().collect(),
            });
        }
        log::debug!("loaded {} gene sets", sets.len());
        Ok(Self { sets })
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Every identifier that occurs in at least one set
    pub fn universe(&self) -> BTreeSet<u64> {
        self.sets.iter().flat_map(|s| s.genes.iter().copied()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_gmt() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "GO:0001\tcell cycle\t1\t2\t3\t2").unwrap();
        writeln!(f, "GO:0002\tapoptosis\t3\tNA\t4").unwrap();
        writeln!(f, "GO:0003\tempty").unwrap();
        let lib = GeneSetLibrary::from_gmt(f.path()).unwrap();
        assert_eq!(lib.len(), 2);
        assert_eq!(lib.sets[0].genes, vec![1, 2, 3]);
        assert_eq!(lib.sets[1].term_name, "apoptosis");
        assert_eq!(lib.sets[1].genes, vec![3, 4]);
        assert_eq!(lib.universe().len(), 4);
    }
}
