//! Input/output for tables

mod loader;
mod results;
pub(crate) mod tsv;

pub use loader::{align_to_metadata, load_inputs};
pub use results::{write_gene_table, DeResult, DeRow, GENE_TABLE_COLUMNS};
pub use tsv::{read_count_matrix, read_metadata, write_count_matrix, write_metadata};
