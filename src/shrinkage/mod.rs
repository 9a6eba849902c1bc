//! Log fold change shrinkage
//!
//! Strategies are tried in order; the first one that succeeds provides the
//! reported effects. When all fail the MLE estimates are kept and the method
//! is recorded as `none`.

mod ashr;
mod normal;

pub use ashr::{fit_ashr, AshrFit, AshrParams, AshrShrinkage};
pub use normal::{estimate_beta_prior_variance, NormalShrinkage};

use ndarray::Array2;

use crate::error::Result;
use crate::glm::{DesignMatrix, GlmFit};

/// Everything a strategy may need about the fitted model
#[derive(Debug, Clone, Copy)]
pub struct ShrinkageInput<'a> {
    pub counts: &'a Array2<f64>,
    pub design: &'a DesignMatrix,
    pub size_factors: &'a [f64],
    pub dispersions: &'a [f64],
    pub trended_dispersions: &'a [f64],
    pub base_means: &'a [f64],
    pub fits: &'a [GlmFit],
    /// Index of the tested coefficient
    pub coef_idx: usize,
    /// MLE log2 fold changes and standard errors of that coefficient
    pub log2_fold_changes: &'a [f64],
    pub lfc_se: &'a [f64],
}

/// Shrunk log2 fold changes and their standard errors
#[derive(Debug, Clone, PartialEq)]
pub struct ShrunkEffects {
    pub log2_fold_changes: Vec<f64>,
    pub lfc_se: Vec<f64>,
}

/// A way of moderating fold change estimates
pub trait ShrinkageStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn shrink(&self, input: &ShrinkageInput) -> Result<ShrunkEffects>;
}

/// Effects produced by the chain plus the name of the method that produced them
#[derive(Debug, Clone)]
pub struct ShrinkageOutcome {
    pub method: String,
    pub effects: ShrunkEffects,
}

/// Run `strategies` in order until one succeeds
pub fn apply_shrinkage_chain(strategies: &[Box<dyn ShrinkageStrategy>], input: &ShrinkageInput) -> ShrinkageOutcome {
    for strategy in strategies {
        match strategy.shrink(input) {
            Ok(effects) => {
                log::info!("fold changes shrunk with {}", strategy.name());
                return ShrinkageOutcome {
                    method: strategy.name().to_string(),
                    effects,
                };
            }
            Err(e) => log::warn!("{} shrinkage unavailable: {}", strategy.name(), e),
        }
    }
    log::warn!("no shrinkage method succeeded; reporting MLE fold changes");
    ShrinkageOutcome {
        method: "none".to_string(),
        effects: ShrunkEffects {
            log2_fold_changes: input.log2_fold_changes.to_vec(),
            lfc_se: input.lfc_se.to_vec(),
        },
    }
}
