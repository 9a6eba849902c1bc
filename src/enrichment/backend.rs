//! File-backed enrichment backend

use std::path::Path;

use super::gmt::GeneSetLibrary;
use super::mapping::SymbolTable;
use super::ora::{over_representation, EnrichmentParams};
use super::{EnrichedTerm, EnrichmentBackend, Ontology};
use crate::error::{ReportError, Result};

/// Symbol table plus one GMT library per ontology. Parts that failed to load stay `None`.
#[derive(Debug, Clone, Default)]
pub struct GeneSetBackend {
    pub symbols: Option<SymbolTable>,
    pub biological_process: Option<GeneSetLibrary>,
    pub pathway: Option<GeneSetLibrary>,
    pub params: EnrichmentParams,
}

fn load_optional<T>(
    what: &str,
    path: Option<&Path>,
    load: impl FnOnce(&Path) -> Result<T>,
) -> Option<T> {
    let path = path?;
    match load(path) {
        Ok(v) => Some(v),
        Err(e) => {
            log::warn!("{} at {} could not be loaded: {}", what, path.display(), e);
            None
        }
    }
}

impl GeneSetBackend {
    pub fn from_paths(
        symbols: Option<&Path>,
        go_gmt: Option<&Path>,
        kegg_gmt: Option<&Path>,
        params: EnrichmentParams,
    ) -> Self {
        Self {
            symbols: load_optional("symbol table", symbols, |p| SymbolTable::from_tsv(p)),
            biological_process: load_optional("GO gene sets", go_gmt, |p| GeneSetLibrary::from_gmt(p)),
            pathway: load_optional("KEGG gene sets", kegg_gmt, |p| GeneSetLibrary::from_gmt(p)),
            params,
        }
    }

    /// True when nothing is configured at all
    pub fn is_empty(&self) -> bool {
        self.symbols.is_none() && self.biological_process.is_none() && self.pathway.is_none()
    }

    fn library(&self, ontology: Ontology) -> Option<&GeneSetLibrary> {
        match ontology {
            Ontology::BiologicalProcess => self.biological_process.as_ref(),
            Ontology::Pathway => self.pathway.as_ref(),
        }
    }
}

impl EnrichmentBackend for GeneSetBackend {
    fn map_symbols(&self, symbols: &[String]) -> Result<Vec<u64>> {
        let table = self
            .symbols
            .as_ref()
            .ok_or_else(|| ReportError::unavailable("symbol mapping", "no symbol table configured"))?;
        Ok(table.map(symbols))
    }

    fn enrich(&self, ontology: Ontology, ids: &[u64]) -> Result<Vec<EnrichedTerm>> {
        let library = self.library(ontology).ok_or_else(|| {
            ReportError::unavailable(
                &format!("{} gene sets", ontology.label()),
                "not available: no GMT file configured",
            )
        })?;
        over_representation(library, ids, &self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_library_is_unavailable() {
        let backend = GeneSetBackend::default();
        let err = backend.enrich(Ontology::Pathway, &[1]).unwrap_err();
        assert!(matches!(err, ReportError::CapabilityUnavailable { .. }));
        assert!(err.to_string().contains("not available"));
        assert!(backend.map_symbols(&["A".to_string()]).is_err());
    }

    #[test]
    fn test_unreadable_file_leaves_part_unconfigured() {
        let backend = GeneSetBackend::from_paths(
            None,
            Some(Path::new("/nonexistent/go.gmt")),
            None,
            EnrichmentParams::default(),
        );
        assert!(backend.biological_process.is_none());
        assert!(backend.is_empty());
    }

    #[test]
    fn test_loads_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let symbols = dir.path().join("symbols.tsv");
        let gmt = dir.path().join("go.gmt");
        let mut f = std::fs::File::create(&symbols).unwrap();
        writeln!(f, "symbol\tentrez_id").unwrap();
        writeln!(f, "GENE1\t1").unwrap();
        let mut f = std::fs::File::create(&gmt).unwrap();
        writeln!(f, "GO:1\tterm\t1\t2").unwrap();

        let backend = GeneSetBackend::from_paths(Some(symbols.as_path()), Some(gmt.as_path()), None, EnrichmentParams::default());
        assert_eq!(backend.map_symbols(&["GENE1".to_string()]).unwrap(), vec![1]);
        assert_eq!(backend.biological_process.as_ref().map(|l| l.len()), Some(1));
        assert!(backend.pathway.is_none());
    }
}
