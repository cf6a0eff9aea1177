use crate::cluster::{svg_clusters, SvgClusterArgs, SvgClusters};
use crate::density::{hotspot_density, DensityResult};
use crate::error::SvgError;
use crate::knn_graph::SpatialKnn;
use crate::moran::{local_moran, HotspotResult, LocalMoranArgs};
use crate::svg_common::*;

use spot_data::SpotDataset;

#[derive(Debug, Clone)]
pub struct SvgPipelineArgs {
    /// Number of nearest neighbours for the spatial graph
    pub knn: usize,
    /// Number of top genes (by AI) carried into clustering
    pub n_svgs: usize,
    /// Number of flat gene clusters
    pub n_clusters: usize,
    /// Worker budget for the per-gene stages
    pub cores: usize,
    /// Conditional permutations per spot
    pub permutations: usize,
    /// Pseudo p-value cutoff for hotspot calls
    pub significance: f64,
    /// Base random seed
    pub seed: u64,
}

impl Default for SvgPipelineArgs {
    fn default() -> Self {
        Self {
            knn: 6,
            n_svgs: 1000,
            n_clusters: 8,
            cores: num_cpus::get(),
            permutations: 999,
            significance: 0.05,
            seed: 42,
        }
    }
}

/// Immutable snapshot of every derived table the pipeline produces.
#[derive(Debug, Clone)]
pub struct SvgAnalysis {
    pub graph: SpatialKnn,
    pub hotspot: HotspotResult,
    pub density: DensityResult,
    pub clusters: SvgClusters,
}

/// Run the four analysis stages in order: spatial kNN graph, local
/// Moran hotspot detection, hotspot density aggregation, and SVG
/// clustering. Every stage is a pure function of the previous stage's
/// output; the dataset is only borrowed, so re-running on the same
/// inputs can never perturb them. All parameters are validated before
/// any stage starts.
pub fn run_pipeline(
    dataset: &SpotDataset,
    args: &SvgPipelineArgs,
) -> anyhow::Result<SvgAnalysis> {
    validate_args(args, dataset.n_spots())?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(args.cores)
        .build()?;

    pool.install(|| {
        info!(
            "pipeline start: {} spots x {} genes on {} workers",
            dataset.n_spots(),
            dataset.n_genes(),
            args.cores
        );

        let graph = SpatialKnn::build(dataset.coordinates(), args.knn)?;

        let hotspot = local_moran(
            dataset.counts(),
            &graph,
            &LocalMoranArgs {
                permutations: args.permutations,
                significance: args.significance,
                seed: args.seed,
            },
        )?;

        let density = hotspot_density(&hotspot.hotspot, &hotspot.p_values, &graph)?;

        let clusters = svg_clusters(
            &hotspot.hotspot,
            &density.ai,
            &SvgClusterArgs {
                n_svgs: args.n_svgs,
                n_clusters: args.n_clusters,
            },
        )?;

        Ok(SvgAnalysis {
            graph,
            hotspot,
            density,
            clusters,
        })
    })
}

fn validate_args(args: &SvgPipelineArgs, n_spots: usize) -> Result<(), SvgError> {
    if args.knn < 1 || args.knn >= n_spots {
        return Err(SvgError::invalid(
            "k",
            args.knn,
            format!("1 <= k < n_spots ({})", n_spots),
        ));
    }
    if args.n_svgs < 1 {
        return Err(SvgError::invalid("n_svgs", args.n_svgs, ">= 1"));
    }
    if args.n_clusters < 1 {
        return Err(SvgError::invalid("n_clusters", args.n_clusters, ">= 1"));
    }
    if args.cores < 1 {
        return Err(SvgError::invalid("cores", args.cores, ">= 1"));
    }
    if args.permutations < 1 {
        return Err(SvgError::invalid("permutations", args.permutations, ">= 1"));
    }
    if !(args.significance > 0. && args.significance < 1.) {
        return Err(SvgError::invalid(
            "significance",
            args.significance,
            "0 < significance < 1",
        ));
    }
    Ok(())
}
