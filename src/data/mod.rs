//! Input data structures

mod count_matrix;
mod metadata;

pub use count_matrix::CountMatrix;
pub use metadata::{Factor, SampleMetadata};
