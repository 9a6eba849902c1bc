//! Run configuration and capability wiring

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::engine::EngineParams;
use crate::enrichment::{EnrichmentBackend, EnrichmentParams, GeneSetBackend};
use crate::error::{ReportError, Result};
use crate::ranking::RankingPolicy;
use crate::shrinkage::{AshrParams, AshrShrinkage, NormalShrinkage, ShrinkageStrategy};

/// Log fold change shrinkage estimators, tried in the configured order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShrinkageKind {
    Ashr,
    Normal,
}

impl FromStr for ShrinkageKind {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ashr" => Ok(ShrinkageKind::Ashr),
            "normal" => Ok(ShrinkageKind::Normal),
            other => Err(ReportError::input(format!(
                "unknown shrinkage method '{}'; use 'ashr' or 'normal'",
                other
            ))),
        }
    }
}

/// Comma-separated list such as `ashr,normal`. An empty string disables shrinkage.
pub fn parse_shrinkage_list(s: &str) -> Result<Vec<ShrinkageKind>> {
    s.split(',')
        .filter(|part| !part.trim().is_empty())
        .map(ShrinkageKind::from_str)
        .collect()
}

/// Everything a run can be tuned with. Missing JSON fields take their defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub engine: EngineParams,
    pub ranking: RankingPolicy,
    pub ashr: AshrParams,
    /// Upper quantile used to match the normal prior on fold changes
    pub normal_upper_quantile: f64,
    pub enrichment: EnrichmentParams,
    pub shrinkage: Vec<ShrinkageKind>,
    /// TSV with `symbol` and `entrez_id` columns
    pub symbols: Option<PathBuf>,
    pub go_gmt: Option<PathBuf>,
    pub kegg_gmt: Option<PathBuf>,
    /// Worker threads; 0 uses the rayon default
    pub threads: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            engine: EngineParams::default(),
            ranking: RankingPolicy::default(),
            ashr: AshrParams::default(),
            normal_upper_quantile: 0.05,
            enrichment: EnrichmentParams::default(),
            shrinkage: vec![ShrinkageKind::Ashr, ShrinkageKind::Normal],
            symbols: None,
            go_gmt: None,
            kegg_gmt: None,
            threads: 0,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ReportError::input(format!("cannot read config {}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| ReportError::input(format!("invalid config {}: {}", path.display(), e)))
    }
}

/// Optional capabilities resolved once from the configuration
pub struct CapabilityRegistry {
    pub shrinkage: Vec<Box<dyn ShrinkageStrategy>>,
    pub enrichment: Option<Box<dyn EnrichmentBackend>>,
}

impl CapabilityRegistry {
    pub fn from_config(config: &PipelineConfig) -> Self {
        let shrinkage: Vec<Box<dyn ShrinkageStrategy>> = config
            .shrinkage
            .iter()
            .map(|kind| -> Box<dyn ShrinkageStrategy> {
                match kind {
                    ShrinkageKind::Ashr => Box::new(AshrShrinkage {
                        params: config.ashr.clone(),
                    }),
                    ShrinkageKind::Normal => Box::new(NormalShrinkage {
                        upper_quantile: config.normal_upper_quantile,
                        glm: config.engine.glm.clone(),
                    }),
                }
            })
            .collect();
        let names: Vec<&str> = shrinkage.iter().map(|s| s.name()).collect();
        log::info!("shrinkage chain: [{}]", names.join(", "));

        let backend = GeneSetBackend::from_paths(
            config.symbols.as_deref(),
            config.go_gmt.as_deref(),
            config.kegg_gmt.as_deref(),
            config.enrichment.clone(),
        );
        let enrichment: Option<Box<dyn EnrichmentBackend>> = if backend.is_empty() {
            log::warn!("no enrichment resources configured; GO and KEGG plots will be placeholders");
            None
        } else {
            Some(Box::new(backend))
        };

        Self { shrinkage, enrichment }
    }
}
