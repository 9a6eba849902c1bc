//! Functional enrichment of the significant gene set
//!
//! Symbols are mapped to numeric identifiers, then each ontology is tested
//! independently. Nothing in this module aborts the run: every failure is
//! folded into an [`EnrichmentOutcome`].

mod backend;
mod gmt;
mod mapping;
mod ora;

pub use backend::GeneSetBackend;
pub use gmt::{GeneSet, GeneSetLibrary};
pub use mapping::SymbolTable;
pub use ora::{over_representation, EnrichmentParams};

use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ontology {
    /// Gene Ontology biological process
    BiologicalProcess,
    /// KEGG pathways
    Pathway,
}

impl Ontology {
    pub fn label(&self) -> &'static str {
        match self {
            Ontology::BiologicalProcess => "GO",
            Ontology::Pathway => "KEGG",
        }
    }
}

/// One over-represented term
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedTerm {
    pub term_id: String,
    pub term_name: String,
    /// Query genes in the set
    pub count: usize,
    pub query_size: usize,
    pub set_size: usize,
    pub universe_size: usize,
    pub pvalue: f64,
    pub adjusted_pvalue: f64,
    pub gene_ids: Vec<u64>,
}

impl EnrichedTerm {
    pub fn gene_ratio(&self) -> f64 {
        if self.query_size == 0 {
            0.0
        } else {
            self.count as f64 / self.query_size as f64
        }
    }

    pub fn gene_ratio_label(&self) -> String {
        format!("{}/{}", self.count, self.query_size)
    }

    pub fn bg_ratio_label(&self) -> String {
        format!("{}/{}", self.set_size, self.universe_size)
    }
}

/// Result of testing one ontology
#[derive(Debug, Clone, PartialEq)]
pub enum EnrichmentOutcome {
    Tested(Vec<EnrichedTerm>),
    /// No identifiers reached the test
    NoInput,
    Failed(String),
}

impl EnrichmentOutcome {
    /// Terms when tested, empty otherwise
    pub fn terms(&self) -> &[EnrichedTerm] {
        match self {
            EnrichmentOutcome::Tested(terms) => terms,
            _ => &[],
        }
    }

    /// Why there is nothing to draw, if so
    pub fn empty_reason(&self, ontology: Ontology) -> Option<String> {
        match self {
            EnrichmentOutcome::Tested(terms) if !terms.is_empty() => None,
            EnrichmentOutcome::Tested(_) => Some(format!("No significant {} terms", ontology.label())),
            EnrichmentOutcome::NoInput => Some(format!("No genes available for {} enrichment", ontology.label())),
            EnrichmentOutcome::Failed(reason) => Some(format!("{} enrichment failed: {}", ontology.label(), reason)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EnrichmentReport {
    pub biological_process: EnrichmentOutcome,
    pub pathway: EnrichmentOutcome,
    /// Identifiers the symbols mapped to
    pub mapped_ids: Vec<u64>,
}

impl EnrichmentReport {
    pub fn outcome(&self, ontology: Ontology) -> &EnrichmentOutcome {
        match ontology {
            Ontology::BiologicalProcess => &self.biological_process,
            Ontology::Pathway => &self.pathway,
        }
    }
}

/// Source of identifier mapping and gene-set tests
pub trait EnrichmentBackend: Send + Sync {
    fn map_symbols(&self, symbols: &[String]) -> Result<Vec<u64>>;

    fn enrich(&self, ontology: Ontology, ids: &[u64]) -> Result<Vec<EnrichedTerm>>;
}

fn test_ontology(backend: Option<&dyn EnrichmentBackend>, ontology: Ontology, ids: &[u64]) -> EnrichmentOutcome {
    let Some(backend) = backend else {
        return EnrichmentOutcome::Failed(format!("{} enrichment not available", ontology.label()));
    };
    if ids.is_empty() {
        return EnrichmentOutcome::NoInput;
    }
    match backend.enrich(ontology, ids) {
        Ok(terms) => {
            log::info!("{} enrichment: {} significant terms", ontology.label(), terms.len());
            EnrichmentOutcome::Tested(terms)
        }
        Err(e) => {
            log::warn!("{} enrichment skipped: {}", ontology.label(), e);
            EnrichmentOutcome::Failed(e.to_string())
        }
    }
}

/// Map `symbols` and test both ontologies. Never fails.
pub fn run_enrichment(backend: Option<&dyn EnrichmentBackend>, symbols: &[String]) -> EnrichmentReport {
    let mapped_ids = match backend {
        Some(b) if !symbols.is_empty() => b.map_symbols(symbols).unwrap_or_else(|e| {
            log::warn!("symbol mapping failed, continuing without identifiers: {}", e);
            Vec::new()
        }),
        _ => Vec::new(),
    };
    log::info!("mapped {} of {} symbols", mapped_ids.len(), symbols.len());

    EnrichmentReport {
        biological_process: test_ontology(backend, Ontology::BiologicalProcess, &mapped_ids),
        pathway: test_ontology(backend, Ontology::Pathway, &mapped_ids),
        mapped_ids,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReportError;

    struct FakeBackend {
        fail_mapping: bool,
    }

    impl EnrichmentBackend for FakeBackend {
        fn map_symbols(&self, symbols: &[String]) -> Result<Vec<u64>> {
            if self.fail_mapping {
                return Err(ReportError::unavailable("symbol mapping", "offline"));
            }
            Ok((1..=symbols.len() as u64).collect())
        }

        fn enrich(&self, ontology: Ontology, ids: &[u64]) -> Result<Vec<EnrichedTerm>> {
            match ontology {
                Ontology::BiologicalProcess => Ok(vec![EnrichedTerm {
                    term_id: "GO:1".to_string(),
                    term_name: "x".to_string(),
                    count: ids.len(),
                    query_size: ids.len(),
                    set_size: 10,
                    universe_size: 100,
                    pvalue: 1e-5,
                    adjusted_pvalue: 1e-4,
                    gene_ids: ids.to_vec(),
                }]),
                Ontology::Pathway => Err(ReportError::unavailable("KEGG gene sets", "not available")),
            }
        }
    }

    #[test]
    fn test_ontologies_tracked_independently() {
        let backend = FakeBackend { fail_mapping: false };
        let report = run_enrichment(Some(&backend), &["A".to_string(), "B".to_string()]);
        assert_eq!(report.biological_process.terms().len(), 1);
        assert!(matches!(report.pathway, EnrichmentOutcome::Failed(_)));
        assert_eq!(report.mapped_ids, vec![1, 2]);
    }

    #[test]
    fn test_empty_symbols_give_no_input() {
        let backend = FakeBackend { fail_mapping: false };
        let report = run_enrichment(Some(&backend), &[]);
        assert_eq!(report.biological_process, EnrichmentOutcome::NoInput);
        assert_eq!(report.pathway, EnrichmentOutcome::NoInput);
    }

    #[test]
    fn test_mapping_failure_continues_with_empty_set() {
        let backend = FakeBackend { fail_mapping: true };
        let report = run_enrichment(Some(&backend), &["A".to_string()]);
        assert!(report.mapped_ids.is_empty());
        assert_eq!(report.biological_process, EnrichmentOutcome::NoInput);
    }

    #[test]
    fn test_no_backend_fails_both() {
        let report = run_enrichment(None, &["A".to_string()]);
        assert!(report.biological_process.empty_reason(Ontology::BiologicalProcess).is_some());
        assert!(matches!(report.pathway, EnrichmentOutcome::Failed(_)));
    }

    #[test]
    fn test_gene_ratio() {
        let t = EnrichedTerm {
            term_id: "T".into(),
            term_name: "t".into(),
            count: 3,
            query_size: 12,
            set_size: 40,
            universe_size: 400,
            pvalue: 0.01,
            adjusted_pvalue: 0.02,
            gene_ids: vec![],
        };
        assert!((t.gene_ratio() - 0.25).abs() < 1e-12);
        assert_eq!(t.gene_ratio_label(), "3/12");
    }
}
