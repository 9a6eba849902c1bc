//! Synthetic negative binomial count matrices with a known DE subset

use std::path::Path;

use ndarray::Array2;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Gamma, Poisson};
use serde::{Deserialize, Serialize};

use crate::data::{CountMatrix, SampleMetadata};
use crate::error::{ReportError, Result};

pub const CONTROL_GROUP: &str = "control";
pub const TREATMENT_GROUP: &str = "treatment";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParams {
    pub n_genes: usize,
    pub n_ctrl: usize,
    pub n_trt: usize,
    /// Fraction of genes that are differentially expressed
    pub de_prop: f64,
    pub fold_change: f64,
    pub dispersion: f64,
    pub seed: u64,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            n_genes: 18000,
            n_ctrl: 5,
            n_trt: 5,
            de_prop: 0.1,
            fold_change: 4.0,
            dispersion: 0.3,
            seed: 42,
        }
    }
}

impl SimulationParams {
    fn validate(&self) -> Result<()> {
        if self.n_genes == 0 || self.n_ctrl == 0 || self.n_trt == 0 {
            return Err(ReportError::input("n_genes, n_ctrl and n_trt must be positive"));
        }
        if !(0.0..=1.0).contains(&self.de_prop) {
            return Err(ReportError::input(format!("de_prop must be in [0, 1], got {}", self.de_prop)));
        }
        if !(self.fold_change > 0.0) || !(self.dispersion > 0.0) {
            return Err(ReportError::input("fold_change and dispersion must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SimulatedCounts {
    pub counts: CountMatrix,
    pub metadata: SampleMetadata,
    /// Genes multiplied by the fold change in the treated group
    pub up_regulated: Vec<usize>,
    /// Genes divided by the fold change in the treated group
    pub down_regulated: Vec<usize>,
}

/// One draw from NB(mean, dispersion) as a gamma-Poisson mixture
fn nb_draw<R: Rng + ?Sized>(rng: &mut R, mean: f64, dispersion: f64) -> Result<f64> {
    let shape = 1.0 / dispersion;
    let gamma = Gamma::new(shape, mean * dispersion)
        .map_err(|e| ReportError::input(format!("invalid gamma parameters: {}", e)))?;
    let lambda: f64 = gamma.sample(rng);
    if lambda <= 0.0 {
        return Ok(0.0);
    }
    let poisson = Poisson::new(lambda).map_err(|e| ReportError::input(format!("invalid Poisson rate: {}", e)))?;
    Ok(poisson.sample(rng))
}

/// Simulate counts. `gene_names`, when given, must hold at least `n_genes` names.
pub fn simulate_counts(params: &SimulationParams, gene_names: Option<Vec<String>>) -> Result<SimulatedCounts> {
    params.validate()?;
    let n = params.n_genes;

    let genes = match gene_names {
        Some(names) if names.len() < n => {
            return Err(ReportError::input(format!(
                "gene list contains only {} names, fewer than n_genes={}",
                names.len(),
                n
            )))
        }
        Some(mut names) => {
            names.truncate(n);
            names
        }
        None => (1..=n).map(|i| format!("gene_{}", i)).collect(),
    };

    let mut samples: Vec<String> = (1..=params.n_ctrl).map(|i| format!("ctrl_{}", i)).collect();
    samples.extend((1..=params.n_trt).map(|i| format!("trt_{}", i)));
    let mut groups = vec![CONTROL_GROUP.to_string(); params.n_ctrl];
    groups.extend(std::iter::repeat(TREATMENT_GROUP.to_string()).take(params.n_trt));

    let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
    let n_de = (n as f64 * params.de_prop) as usize;
    let de = sample(&mut rng, n, n_de).into_vec();
    let (up, down) = de.split_at(n_de / 2);

    let mu_ctrl: Vec<f64> = (0..n).map(|_| rng.random_range(50.0..2000.0)).collect();
    let mut mu_trt = mu_ctrl.clone();
    for &g in up {
        mu_trt[g] *= params.fold_change;
    }
    for &g in down {
        mu_trt[g] /= params.fold_change;
    }

    let n_samples = samples.len();
    let mut counts = Array2::zeros((n, n_samples));
    for g in 0..n {
        for j in 0..n_samples {
            let mean = if j < params.n_ctrl { mu_ctrl[g] } else { mu_trt[g] };
            counts[[g, j]] = nb_draw(&mut rng, mean, params.dispersion)?;
        }
    }
    log::info!(
        "simulated {} genes x {} samples, {} up and {} down",
        n,
        n_samples,
        up.len(),
        down.len()
    );

    Ok(SimulatedCounts {
        counts: CountMatrix::new(counts, genes, samples.clone())?,
        metadata: SampleMetadata::new(samples, groups)?,
        up_regulated: up.to_vec(),
        down_regulated: down.to_vec(),
    })
}

/// One gene name per non-empty line
pub fn read_gene_list<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| ReportError::input(format!("cannot read gene list {}: {}", path.display(), e)))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect())
}
