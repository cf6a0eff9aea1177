use crate::error::SvgError;
use crate::svg_common::*;

/// Directed k-nearest-neighbour relation over spot coordinates.
///
/// For each spot the `k` nearest other spots by Euclidean distance are
/// kept, ordered by ascending distance with ties broken by ascending
/// spot index, so construction is fully deterministic. Membership is
/// per-direction: `j` being a neighbour of `i` says nothing about the
/// reverse. Weights are row-standardized (each neighbour carries 1/k).
#[derive(Debug, Clone)]
pub struct SpatialKnn {
    k: usize,
    neighbors: Vec<Vec<usize>>,
}

impl SpatialKnn {
    /// Build the graph from a spot x 2 coordinate table. Requires
    /// `1 <= k < n_spots`. The scan is exact (no approximate index) to
    /// honour the deterministic tie order.
    pub fn build(coordinates: &Mat, k: usize) -> Result<Self, SvgError> {
        let n = coordinates.nrows();

        if coordinates.ncols() != 2 {
            return Err(SvgError::ShapeMismatch {
                stage: "knn graph",
                details: format!("coordinate table is {} x {}, want 2 columns", n, coordinates.ncols()),
            });
        }
        if k < 1 || k >= n {
            return Err(SvgError::invalid(
                "k",
                k,
                format!("1 <= k < n_spots ({})", n),
            ));
        }

        let neighbors: Vec<Vec<usize>> = (0..n)
            .into_par_iter()
            .progress_count(n as u64)
            .map(|i| {
                let (xi, yi) = (coordinates[(i, 0)], coordinates[(i, 1)]);
                let mut candidates: Vec<(f64, usize)> = (0..n)
                    .filter(|&j| j != i)
                    .map(|j| {
                        let dx = coordinates[(j, 0)] - xi;
                        let dy = coordinates[(j, 1)] - yi;
                        (dx * dx + dy * dy, j)
                    })
                    .collect();

                candidates.sort_unstable_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
                candidates.truncate(k);
                candidates.into_iter().map(|(_, j)| j).collect()
            })
            .collect();

        info!("built spatial kNN graph: {} spots, k = {}", n, k);

        Ok(Self { k, neighbors })
    }

    pub fn n_spots(&self) -> usize {
        self.neighbors.len()
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Neighbours of spot `i`, ordered by ascending distance.
    pub fn neighbors_of(&self, i: usize) -> &[usize] {
        &self.neighbors[i]
    }

    /// Whether `j` is one of the k nearest neighbours of `i`.
    pub fn is_neighbor(&self, i: usize, j: usize) -> bool {
        self.neighbors[i].contains(&j)
    }

    /// Row-standardized weight carried by each neighbour edge.
    pub fn weight(&self) -> f64 {
        1. / self.k as f64
    }
}
