//! Filtering steps applied before multiple testing

mod independent;
mod lowess;

pub use independent::{independent_filtering, FilterOutcome};
pub use lowess::lowess;
