//! End-to-end run: load, test, rank, draw, enrich, assemble
//!
//! Only input and model fit problems abort a run. Everything after a
//! successful fit degrades to placeholders, so the full output set is
//! always written.

use std::path::{Path, PathBuf};

use crate::config::{CapabilityRegistry, PipelineConfig};
use crate::engine::{DeseqLikeEngine, NegativeBinomialEngine};
use crate::enrichment::{run_enrichment, EnrichmentBackend, EnrichmentReport, Ontology};
use crate::error::{ReportError, Result};
use crate::io::{load_inputs, write_gene_table, DeResult};
use crate::ranking::RankingPolicy;
use crate::render::{
    draw_dotplot, draw_heatmap, draw_volcano, prepare_heatmap, render_or_placeholder, volcano_points, ArtifactKind,
    RenderedArtifact,
};
use crate::report::{assemble_report, ReportSummary};

pub const TOP_GENES_FILE: &str = "top_genes.tsv";

/// Files and intermediate results of one run
#[derive(Debug, Clone)]
pub struct PipelineOutputs {
    pub out_dir: PathBuf,
    pub top_genes: PathBuf,
    /// Heatmap, volcano, GO and KEGG, in that order
    pub artifacts: Vec<RenderedArtifact>,
    pub report: Option<ReportSummary>,
    pub result: DeResult,
    pub enrichment: EnrichmentReport,
}

impl PipelineOutputs {
    pub fn artifact(&self, kind: ArtifactKind) -> Option<&RenderedArtifact> {
        self.artifacts.iter().find(|a| a.kind == kind)
    }

    /// Every file the run produced
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths = vec![self.top_genes.clone()];
        paths.extend(self.artifacts.iter().map(|a| a.path.clone()));
        paths.extend(self.report.iter().map(|r| r.path.clone()));
        paths
    }
}

pub struct Pipeline {
    engine: Box<dyn DeseqLikeEngine>,
    enrichment: Option<Box<dyn EnrichmentBackend>>,
    ranking: RankingPolicy,
}

impl Pipeline {
    pub fn new(
        engine: Box<dyn DeseqLikeEngine>,
        enrichment: Option<Box<dyn EnrichmentBackend>>,
        ranking: RankingPolicy,
    ) -> Self {
        Self {
            engine,
            enrichment,
            ranking,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        let registry = CapabilityRegistry::from_config(config);
        let engine = NegativeBinomialEngine::new(config.engine.clone(), registry.shrinkage);
        Self::new(Box::new(engine), registry.enrichment, config.ranking)
    }

    pub fn run(&self, counts_path: &Path, metadata_path: &Path, out_dir: &Path) -> Result<PipelineOutputs> {
        let (counts, metadata) = load_inputs(counts_path, metadata_path)?;

        log::info!("Fitting differential expression model");
        let analysis = self.engine.run(&counts, &metadata)?;
        let result = &analysis.result;
        log::info!(
            "{} genes tested for {} (shrinkage: {})",
            result.len(),
            result.contrast,
            result.shrinkage
        );

        std::fs::create_dir_all(out_dir)
            .map_err(|e| ReportError::input(format!("cannot create {}: {}", out_dir.display(), e)))?;

        let top = self.ranking.top_genes(result);
        let top_genes = out_dir.join(TOP_GENES_FILE);
        write_gene_table(&top_genes, &top)
            .map_err(|e| ReportError::input(format!("cannot write {}: {}", top_genes.display(), e)))?;
        log::info!("{} genes with padj < {} written to {}", top.len(), self.ranking.top_padj, top_genes.display());

        let strict = self.ranking.strict_significant(result);
        log::info!(
            "{} genes with padj < {} and |log2FC| > {}",
            strict.len(),
            self.ranking.strict_padj,
            self.ranking.strict_lfc
        );

        let no_strict_genes = strict.is_empty().then(|| {
            format!(
                "No genes with padj < {} and |log2FC| > {}",
                self.ranking.strict_padj, self.ranking.strict_lfc
            )
        });
        let (heatmap, volcano) = rayon::join(
            || {
                render_or_placeholder(ArtifactKind::Heatmap, out_dir, no_strict_genes, |path| {
                    let data = prepare_heatmap(&strict, &analysis.context)?;
                    draw_heatmap(path, &data)
                })
            },
            || {
                render_or_placeholder(ArtifactKind::Volcano, out_dir, None, |path| {
                    draw_volcano(path, &volcano_points(result, &self.ranking), &self.ranking)
                })
            },
        );

        let symbols: Vec<String> = strict.iter().map(|r| r.gene_id.clone()).collect();
        let enrichment = run_enrichment(self.enrichment.as_deref(), &symbols);

        let mut artifacts = vec![heatmap, volcano];
        for ontology in [Ontology::BiologicalProcess, Ontology::Pathway] {
            let kind = ArtifactKind::for_ontology(ontology);
            let outcome = enrichment.outcome(ontology);
            artifacts.push(render_or_placeholder(kind, out_dir, outcome.empty_reason(ontology), |path| {
                draw_dotplot(path, kind, outcome.terms())
            }));
        }

        let report = match assemble_report(out_dir) {
            Ok(summary) => Some(summary),
            Err(e) => {
                log::warn!("{}", e);
                None
            }
        };

        Ok(PipelineOutputs {
            out_dir: out_dir.to_path_buf(),
            top_genes,
            artifacts,
            report,
            result: analysis.result,
            enrichment,
        })
    }
}
