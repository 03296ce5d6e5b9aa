//! Declarative source mappings
//!
//! A mapping file holds one block per source. Each block names the source,
//! the destination table its results belong to, and every target variable as
//! the sum of raw dependent variables.

pub mod loader;
pub mod parser;

pub use loader::{load_mapping_blocks, split_blocks, LoaderError};
pub use parser::{AggregationSpec, MappingError};
