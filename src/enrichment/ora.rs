//! Over-representation analysis with the hypergeometric upper tail

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use statrs::distribution::{DiscreteCDF, Hypergeometric};

use super::gmt::GeneSetLibrary;
use super::EnrichedTerm;
use crate::error::{ReportError, Result};
use crate::testing::benjamini_hochberg;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentParams {
    /// Smallest gene set tested
    pub min_set_size: usize,
    /// Largest gene set tested
    pub max_set_size: usize,
    /// Terms are reported when their adjusted p-value is below this
    pub padj_cutoff: f64,
}

impl Default for EnrichmentParams {
    fn default() -> Self {
        Self {
            min_set_size: 10,
            max_set_size: 500,
            padj_cutoff: 0.05,
        }
    }
}

/// P(X >= k) for X ~ Hypergeometric(universe, set_size, query_size)
fn upper_tail(universe: u64, set_size: u64, query_size: u64, k: u64) -> Result<f64> {
    if k == 0 {
        return Ok(1.0);
    }
    let dist = Hypergeometric::new(universe, set_size, query_size)
        .map_err(|e| ReportError::unavailable("over-representation test", e.to_string()))?;
    Ok(dist.sf(k - 1).clamp(0.0, 1.0))
}

/// Test `query` against every set of `library` whose size is in range.
///
/// The universe is every identifier in the library; query identifiers outside
/// it are ignored. Returned terms are ranked by adjusted p-value, then
/// p-value, then term id.
pub fn over_representation(
    library: &GeneSetLibrary,
    query: &[u64],
    params: &EnrichmentParams,
) -> Result<Vec<EnrichedTerm>> {
    let universe = library.universe();
    let query: BTreeSet<u64> = query.iter().copied().filter(|g| universe.contains(g)).collect();
    if query.is_empty() {
        return Ok(Vec::new());
    }
    let n_universe = universe.len() as u64;
    let n_query = query.len() as u64;

    let mut candidates = Vec::new();
    for set in &library.sets {
        let size = set.genes.len();
        if size < params.min_set_size || size > params.max_set_size {
            continue;
        }
        let hits: Vec<u64> = set.genes.iter().copied().filter(|g| query.contains(g)).collect();
        if hits.is_empty() {
            continue;
        }
        let pvalue = upper_tail(n_universe, size as u64, n_query, hits.len() as u64)?;
        candidates.push((set, hits, pvalue));
    }

    let pvalues: Vec<f64> = candidates.iter().map(|(_, _, p)| *p).collect();
    let adjusted = benjamini_hochberg(&pvalues);

    let mut terms: Vec<EnrichedTerm> = candidates
        .into_iter()
        .zip(adjusted)
        .filter(|(_, adj)| *adj < params.padj_cutoff)
        .map(|((set, hits, pvalue), adj)| EnrichedTerm {
            term_id: set.term_id.clone(),
            term_name: set.term_name.clone(),
            count: hits.len(),
            query_size: n_query as usize,
            set_size: set.genes.len(),
            universe_size: n_universe as usize,
            pvalue,
            adjusted_pvalue: adj,
            gene_ids: hits,
        })
        .collect();

    terms.sort_by(|a, b| {
        a.adjusted_pvalue
            .total_cmp(&b.adjusted_pvalue)
            .then(a.pvalue.total_cmp(&b.pvalue))
            .then_with(|| a.term_id.cmp(&b.term_id))
    });
    Ok(terms)
}
