//! Per-spot depth normalizers. Each transform keeps the dataset
//! structure (same spots, same genes, same coordinates) and returns a
//! fresh dataset.

use crate::dataset::{Mat, SpotDataset};
use crate::error::DataError;

const SCALE: f64 = 1e4;

/// Counts-per-10k scaling: each spot row is divided by its total count
/// and multiplied by 1e4. Spots with zero total are left at zero.
pub fn cpm(dataset: &SpotDataset) -> Result<SpotDataset, DataError> {
    rebuild(dataset, scale_rows(dataset.counts(), |x| x))
}

/// Log1p of counts-per-10k: `ln(1 + cpm)`.
pub fn logcpm(dataset: &SpotDataset) -> Result<SpotDataset, DataError> {
    rebuild(dataset, scale_rows(dataset.counts(), |x| (1. + x).ln()))
}

fn scale_rows(counts: &Mat, f: impl Fn(f64) -> f64) -> Mat {
    let row_totals: Vec<f64> = (0..counts.nrows())
        .map(|i| counts.row(i).iter().sum())
        .collect();

    Mat::from_fn(counts.nrows(), counts.ncols(), |i, j| {
        if row_totals[i] > 0. {
            f(counts[(i, j)] * SCALE / row_totals[i])
        } else {
            f(0.)
        }
    })
}

fn rebuild(dataset: &SpotDataset, counts: Mat) -> Result<SpotDataset, DataError> {
    SpotDataset::from_aligned(
        counts,
        dataset.spot_names().to_vec(),
        dataset.gene_names().to_vec(),
        dataset.coordinates().clone(),
    )
}
