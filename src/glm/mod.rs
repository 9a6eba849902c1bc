//! Generalized linear model for negative binomial counts

mod design;
mod fitting;
mod negative_binomial;

pub use design::{build_group_design, sample_indicator_design, DesignMatrix, DESIGN_VARIABLE};
pub use fitting::{
    default_ridge, fit_all_genes, fit_gene, invert_symmetric_matrix, log_det_symmetric,
    solve_symmetric_system, GlmFit, GlmFitParams,
};
pub use negative_binomial::{nb_log_likelihood, nb_mean, nb_weight, MIN_MU};
