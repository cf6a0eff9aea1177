//! Data layer for spatial transcriptomics analysis: the spot-by-gene
//! dataset container, delimited table I/O, and structure-preserving
//! normalization/filtering transforms.

pub mod dataset;
pub mod error;
pub mod filter;
pub mod normalize;
pub mod table_io;

pub use dataset::SpotDataset;
pub use error::DataError;
