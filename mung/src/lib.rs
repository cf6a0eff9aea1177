//! MUNG: Mapping of Uneven Neighborhood Gene expression.
//!
//! Identifies spatially variable genes (SVGs) in spatial
//! transcriptomics data. The pipeline builds a spatial k-nearest
//! neighbour graph over spots, flags per-gene expression hotspots with
//! local Moran's I and conditional permutation testing, scores each
//! gene's hotspot contiguity with a neighborhood density index, and
//! groups the top genes into co-expression clusters by hotspot overlap.

pub mod cluster;
pub mod density;
pub mod error;
pub mod knn_graph;
pub mod moran;
pub mod pipeline;
pub mod run_svg;
mod svg_common;

pub use cluster::{SvgClusterArgs, SvgClusters};
pub use density::DensityResult;
pub use error::SvgError;
pub use knn_graph::SpatialKnn;
pub use moran::{HotspotResult, LocalMoranArgs};
pub use pipeline::{run_pipeline, SvgAnalysis, SvgPipelineArgs};
