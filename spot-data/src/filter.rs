//! Gene pre-filters applied before the analysis pipeline. Each filter
//! keeps a subset of gene columns and returns a fresh dataset with the
//! same spots and coordinates.

use crate::dataset::{Mat, SpotDataset};
use crate::error::DataError;

/// Keep genes whose (sample) variance is strictly greater than `var`.
/// With the default `var = 0` this also removes all-zero genes.
pub fn low_variance_filter(dataset: &SpotDataset, var: f64) -> Result<SpotDataset, DataError> {
    let keep = select_genes(dataset, |col| column_variance(col) > var);
    subset_genes(dataset, &keep)
}

/// Drop genes expressed (count >= 1) in more than `max_ratio` of spots.
pub fn high_expression_filter(
    dataset: &SpotDataset,
    max_ratio: f64,
) -> Result<SpotDataset, DataError> {
    let n = dataset.n_spots() as f64;
    let keep = select_genes(dataset, |col| {
        let expressed = col.iter().filter(|&&x| x >= 1.).count() as f64;
        expressed / n <= max_ratio
    });
    subset_genes(dataset, &keep)
}

/// Keep genes whose mean expression lies strictly below the given
/// quantile of all gene means.
pub fn quantile_filter(dataset: &SpotDataset, quantile: f64) -> Result<SpotDataset, DataError> {
    let means: Vec<f64> = (0..dataset.n_genes())
        .map(|g| dataset.counts().column(g).mean())
        .collect();
    let cutoff = linear_quantile(&means, quantile);
    let keep: Vec<usize> = means
        .iter()
        .enumerate()
        .filter(|(_, &m)| m < cutoff)
        .map(|(g, _)| g)
        .collect();
    subset_genes(dataset, &keep)
}

fn select_genes(
    dataset: &SpotDataset,
    pred: impl Fn(nalgebra::DVectorView<f64>) -> bool,
) -> Vec<usize> {
    (0..dataset.n_genes())
        .filter(|&g| pred(dataset.counts().column(g)))
        .collect()
}

fn subset_genes(dataset: &SpotDataset, keep: &[usize]) -> Result<SpotDataset, DataError> {
    let counts = Mat::from_fn(dataset.n_spots(), keep.len(), |i, j| {
        dataset.counts()[(i, keep[j])]
    });
    let gene_names = keep
        .iter()
        .map(|&g| dataset.gene_names()[g].clone())
        .collect();

    SpotDataset::from_aligned(
        counts,
        dataset.spot_names().to_vec(),
        gene_names,
        dataset.coordinates().clone(),
    )
}

fn column_variance(col: nalgebra::DVectorView<f64>) -> f64 {
    let n = col.len();
    if n < 2 {
        return 0.;
    }
    let mean = col.mean();
    col.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / (n as f64 - 1.)
}

/// Linearly interpolated quantile of a sample (the pandas default).
fn linear_quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let q = q.clamp(0., 1.);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (pos - lo as f64) * (sorted[hi] - sorted[lo])
    }
}
