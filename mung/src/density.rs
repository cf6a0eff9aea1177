use crate::error::SvgError;
use crate::knn_graph::SpatialKnn;
use crate::svg_common::*;

/// Floor for p-values inside `-ln(p)` so a zero never produces an
/// infinite weight (cap ~ 690.8). Permutation p-values are bounded
/// below by `1/(permutations+1)`, so this only fires on external input.
const MIN_P: f64 = 1e-300;

/// Hotspot density summaries, spot x gene `di` and one `ai` per gene.
#[derive(Debug, Clone)]
pub struct DensityResult {
    /// Aggregation index per gene, in [0, 1]
    pub ai: DVec,
    /// Density index per spot and gene; zero off-hotspot
    pub di: Mat,
}

/// Neighborhood significance-mass aggregation over hotspot sets.
///
/// For gene `g` with hotspot set `H`, every hotspot spot `i` scores
/// `Di(i) = sum of -ln(p) over hotspot neighbours / sum over all
/// neighbours`, and `AI(g)` is the mean of `Di` over `H`. A gene with
/// no hotspots scores zero. High AI means a hotspot's neighborhood
/// significance is mostly carried by co-hotspot neighbours, i.e. the
/// gene's hotspots form contiguous patches rather than scatter.
pub fn hotspot_density(
    hotspot: &BinMat,
    p_values: &Mat,
    graph: &SpatialKnn,
) -> Result<DensityResult, SvgError> {
    let (n_spots, n_genes) = hotspot.shape();

    if p_values.shape() != (n_spots, n_genes) {
        return Err(SvgError::ShapeMismatch {
            stage: "density aggregation",
            details: format!(
                "hotspot matrix is {} x {} but p-values are {} x {}",
                n_spots,
                n_genes,
                p_values.nrows(),
                p_values.ncols()
            ),
        });
    }
    if graph.n_spots() != n_spots {
        return Err(SvgError::ShapeMismatch {
            stage: "density aggregation",
            details: format!(
                "hotspot matrix has {} spots but the graph has {}",
                n_spots,
                graph.n_spots()
            ),
        });
    }

    info!("density aggregation over {} genes", n_genes);

    let columns: Vec<(f64, Vec<f64>)> = (0..n_genes)
        .into_par_iter()
        .progress_count(n_genes as u64)
        .map(|g| gene_density(hotspot, p_values, graph, g))
        .collect::<Result<_, SvgError>>()?;

    Ok(DensityResult {
        ai: DVec::from_fn(n_genes, |g, _| columns[g].0),
        di: Mat::from_fn(n_spots, n_genes, |i, g| columns[g].1[i]),
    })
}

fn gene_density(
    hotspot: &BinMat,
    p_values: &Mat,
    graph: &SpatialKnn,
    g: usize,
) -> Result<(f64, Vec<f64>), SvgError> {
    let n = hotspot.nrows();
    let mut di = vec![0.; n];

    let hotspots: Vec<usize> = (0..n).filter(|&i| hotspot[(i, g)] == 1).collect();
    if hotspots.is_empty() {
        return Ok((0., di));
    }

    let weight = |j: usize| -> Result<f64, SvgError> {
        let p = p_values[(j, g)];
        if !p.is_finite() || p < 0. {
            return Err(SvgError::StageFailure {
                stage: "density aggregation",
                gene: g,
                details: format!("malformed significance weight at spot {}", j),
            });
        }
        Ok(-p.max(MIN_P).ln())
    };

    for &i in hotspots.iter() {
        let mut inter = 0.;
        let mut total = 0.;
        for &j in graph.neighbors_of(i) {
            let w = weight(j)?;
            total += w;
            if hotspot[(j, g)] == 1 {
                inter += w;
            }
        }
        if total > 0. {
            di[i] = inter / total;
        }
    }

    let ai = hotspots.iter().map(|&i| di[i]).sum::<f64>() / hotspots.len() as f64;
    Ok((ai, di))
}
