//! Gene symbol to numeric identifier table

use std::collections::HashMap;
use std::path::Path;

use crate::error::{ReportError, Result};
use crate::io::tsv::{strip_bom, tsv_reader};

/// Symbol lookup read from a TSV with `symbol` and `entrez_id` columns
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    ids: HashMap<String, u64>,
}

impl SymbolTable {
    /// Build from `(symbol, id)` pairs; the first pair for a symbol wins
    pub fn from_pairs<I: IntoIterator<Item = (String, u64)>>(pairs: I) -> Self {
        let mut ids = HashMap::new();
        for (symbol, id) in pairs {
            ids.entry(symbol).or_insert(id);
        }
        Self { ids }
    }

    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = tsv_reader(path)?;
        let header = reader.headers()?.clone();
        let column = |name: &str| header.iter().position(|h| strip_bom(h) == name);
        let (symbol_col, id_col) = match (column("symbol"), column("entrez_id")) {
            (Some(s), Some(i)) => (s, i),
            _ => {
                return Err(ReportError::unavailable(
                    "symbol mapping",
                    "symbol table needs 'symbol' and 'entrez_id' columns",
                ))
            }
        };

        let mut pairs = Vec::new();
        let mut skipped = 0;
        for record in reader.records() {
            let record = record?;
            let symbol = record.get(symbol_col).unwrap_or_default();
            match record.get(id_col).unwrap_or_default().parse::<u64>() {
                Ok(id) if !symbol.is_empty() => pairs.push((symbol.to_string(), id)),
                _ => skipped += 1,
            }
        }
        if skipped > 0 {
            log::debug!("symbol table: skipped {} rows without a numeric id", skipped);
        }
        Ok(Self::from_pairs(pairs))
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Identifiers for the mapped symbols, in input order; unmapped symbols are dropped
    pub fn map(&self, symbols: &[String]) -> Vec<u64> {
        symbols.iter().filter_map(|s| self.ids.get(s).copied()).collect()
    }
}
