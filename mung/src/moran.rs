use crate::error::SvgError;
use crate::knn_graph::SpatialKnn;
use crate::svg_common::*;

use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Debug, Clone)]
pub struct LocalMoranArgs {
    /// Number of conditional permutations per spot
    pub permutations: usize,
    /// Pseudo p-value cutoff for hotspot calls
    pub significance: f64,
    /// Base random seed; gene `g` draws from `seed + g`
    pub seed: u64,
}

impl Default for LocalMoranArgs {
    fn default() -> Self {
        Self {
            permutations: 999,
            significance: 0.05,
            seed: 42,
        }
    }
}

/// Per-gene hotspot calls with the permutation statistics behind them.
/// All three matrices are spot x gene, aligned with the input counts.
#[derive(Debug, Clone)]
pub struct HotspotResult {
    /// 1 where the spot is a significant high-high cluster member
    pub hotspot: BinMat,
    /// Conditional-permutation pseudo p-values
    pub p_values: Mat,
    /// Mean of the permuted statistic (permutation expectation)
    pub expectation: Mat,
}

struct GeneColumn {
    hotspot: Vec<u8>,
    p_values: Vec<f64>,
    expectation: Vec<f64>,
}

/// Local Moran's I hotspot detection over every gene column.
///
/// For gene `g` and spot `i`, with mean-centred expression `z` and
/// row-standardized weights, the local statistic is
/// `I_i = (z_i / m2) * sum_j w_ij z_j` where `m2 = sum z^2 / n`.
/// Significance comes from conditionally permuting the remaining spots;
/// a spot is a hotspot when `p < significance` and both the spot and
/// its weighted neighbourhood sit above the gene mean (high-high).
///
/// Gene columns are independent tasks on the rayon pool; results are
/// merged back in the original column order. A zero-variance gene
/// degrades to an all-zero hotspot column with NaN statistics, and a
/// column that flags every spot is reset to zero (such a gene carries
/// no spatial information). Non-finite expression aborts the stage.
pub fn local_moran(
    counts: &Mat,
    graph: &SpatialKnn,
    args: &LocalMoranArgs,
) -> Result<HotspotResult, SvgError> {
    let (n_spots, n_genes) = counts.shape();

    if graph.n_spots() != n_spots {
        return Err(SvgError::ShapeMismatch {
            stage: "hotspot detection",
            details: format!(
                "expression matrix has {} spots but the graph has {}",
                n_spots,
                graph.n_spots()
            ),
        });
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

    info!(
        "hotspot detection: {} genes x {} spots, {} permutations",
        n_genes, n_spots, args.permutations
    );

    let columns: Vec<GeneColumn> = (0..n_genes)
        .into_par_iter()
        .progress_count(n_genes as u64)
        .map(|g| gene_local_moran(counts, graph, args, g))
        .collect::<Result<_, SvgError>>()?;

    Ok(HotspotResult {
        hotspot: BinMat::from_fn(n_spots, n_genes, |i, g| columns[g].hotspot[i]),
        p_values: Mat::from_fn(n_spots, n_genes, |i, g| columns[g].p_values[i]),
        expectation: Mat::from_fn(n_spots, n_genes, |i, g| columns[g].expectation[i]),
    })
}

fn gene_local_moran(
    counts: &Mat,
    graph: &SpatialKnn,
    args: &LocalMoranArgs,
    g: usize,
) -> Result<GeneColumn, SvgError> {
    let x = counts.column(g);
    let n = x.len();
    let k = graph.k();
    let w = graph.weight();

    let mean = x.mean();
    let z: Vec<f64> = x.iter().map(|v| v - mean).collect();

    if z.iter().any(|v| !v.is_finite()) {
        return Err(SvgError::StageFailure {
            stage: "hotspot detection",
            gene: g,
            details: "non-finite expression value".into(),
        });
    }

    let m2 = z.iter().map(|v| v * v).sum::<f64>() / n as f64;
    if m2 <= 0. {
        // zero-variance gene: no spatial signal to test
        return Ok(GeneColumn {
            hotspot: vec![0; n],
            p_values: vec![f64::NAN; n],
            expectation: vec![f64::NAN; n],
        });
    }

    let mut rng = StdRng::seed_from_u64(args.seed.wrapping_add(g as u64));

    let mut hotspot = vec![0_u8; n];
    let mut p_values = vec![f64::NAN; n];
    let mut expectation = vec![f64::NAN; n];
    let mut others: Vec<f64> = Vec::with_capacity(n - 1);

    for i in 0..n {
        let lag = graph.neighbors_of(i).iter().map(|&j| z[j]).sum::<f64>() * w;
        let observed = z[i] / m2 * lag;
        let high_high = z[i] > 0. && lag > 0.;

        // conditional permutation: reassign z over every spot but i
        others.clear();
        others.extend_from_slice(&z[..i]);
        others.extend_from_slice(&z[i + 1..]);

        let mut larger = 0_usize;
        let mut permuted_sum = 0.;
        for _ in 0..args.permutations {
            let draw = rand::seq::index::sample(&mut rng, n - 1, k);
            let lag_perm = draw.iter().map(|t| others[t]).sum::<f64>() * w;
            let permuted = z[i] / m2 * lag_perm;
            if permuted >= observed {
                larger += 1;
            }
            permuted_sum += permuted;
        }
        // fold to the observed tail
        if larger * 2 > args.permutations {
            larger = args.permutations - larger;
        }

        p_values[i] = (larger as f64 + 1.) / (args.permutations as f64 + 1.);
        expectation[i] = permuted_sum / args.permutations as f64;
        hotspot[i] = u8::from(p_values[i] < args.significance && high_high);
    }

    // a column that covers every spot carries no spatial information
    if hotspot.iter().all(|&h| h == 1) {
        hotspot.fill(0);
    }

    Ok(GeneColumn {
        hotspot,
        p_values,
        expectation,
    })
}
