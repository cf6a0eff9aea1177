use crate::error::DataError;

use log::warn;
use nalgebra::DMatrix;
use std::collections::HashMap;

pub type Mat = DMatrix<f64>;

/// A spatial transcriptomics dataset: a spot-by-gene expression matrix
/// paired with a spot-by-2 coordinate table sharing the same spot keys
/// in the same order. Immutable after construction; transforms return a
/// new dataset.
#[derive(Debug, Clone)]
pub struct SpotDataset {
    counts: Mat,
    coordinates: Mat,
    spot_names: Vec<Box<str>>,
    gene_names: Vec<Box<str>>,
}

impl SpotDataset {
    /// Build a dataset from independently indexed expression and
    /// coordinate tables. Spots are sorted lexicographically by name in
    /// both tables and the two key sequences must then agree exactly.
    ///
    /// * `counts` - spot x gene expression matrix
    /// * `spot_names` - row names of `counts`
    /// * `gene_names` - column names of `counts`
    /// * `coordinates` - spot x 2 (x, y) table
    /// * `coordinate_spots` - row names of `coordinates`
    pub fn new(
        counts: Mat,
        spot_names: Vec<Box<str>>,
        gene_names: Vec<Box<str>>,
        coordinates: Mat,
        coordinate_spots: Vec<Box<str>>,
    ) -> Result<Self, DataError> {
        if counts.nrows() != coordinates.nrows() {
            return Err(DataError::SpotCountMismatch {
                expression: counts.nrows(),
                coordinates: coordinates.nrows(),
            });
        }
        if spot_names.len() != counts.nrows() {
            return Err(DataError::NameCountMismatch {
                nrows: counts.nrows(),
                ncols: counts.ncols(),
                nnames: spot_names.len(),
                axis: "spot",
            });
        }
        if coordinate_spots.len() != coordinates.nrows() {
            return Err(DataError::NameCountMismatch {
                nrows: coordinates.nrows(),
                ncols: coordinates.ncols(),
                nnames: coordinate_spots.len(),
                axis: "coordinate row",
            });
        }

        let (counts, spot_names) = sort_rows_by_name(counts, spot_names);
        let (coordinates, coordinate_spots) = sort_rows_by_name(coordinates, coordinate_spots);

        for (row, (a, b)) in spot_names.iter().zip(coordinate_spots.iter()).enumerate() {
            if a != b {
                return Err(DataError::SpotNameMismatch {
                    row,
                    expression: a.clone(),
                    coordinates: b.clone(),
                });
            }
        }

        Self::from_aligned(counts, spot_names, gene_names, coordinates)
    }

    /// Build a dataset whose expression and coordinate rows are already
    /// aligned spot-for-spot. No sorting is applied.
    pub fn from_aligned(
        counts: Mat,
        spot_names: Vec<Box<str>>,
        gene_names: Vec<Box<str>>,
        coordinates: Mat,
    ) -> Result<Self, DataError> {
        if counts.nrows() != coordinates.nrows() {
            return Err(DataError::SpotCountMismatch {
                expression: counts.nrows(),
                coordinates: coordinates.nrows(),
            });
        }
        if coordinates.ncols() != 2 {
            return Err(DataError::CoordinateShape {
                found: coordinates.ncols(),
            });
        }
        if spot_names.len() != counts.nrows() {
            return Err(DataError::NameCountMismatch {
                nrows: counts.nrows(),
                ncols: counts.ncols(),
                nnames: spot_names.len(),
                axis: "spot",
            });
        }
        if gene_names.len() != counts.ncols() {
            return Err(DataError::NameCountMismatch {
                nrows: counts.nrows(),
                ncols: counts.ncols(),
                nnames: gene_names.len(),
                axis: "gene",
            });
        }

        let mut counts = counts;
        for x in counts.iter_mut() {
            if !x.is_finite() {
                *x = 0.;
            }
        }

        let gene_names = disambiguate_gene_names(gene_names);

        Ok(Self {
            counts,
            coordinates,
            spot_names,
            gene_names,
        })
    }

    pub fn n_spots(&self) -> usize {
        self.counts.nrows()
    }

    pub fn n_genes(&self) -> usize {
        self.counts.ncols()
    }

    /// Spot x gene expression matrix
    pub fn counts(&self) -> &Mat {
        &self.counts
    }

    /// Spot x 2 coordinate table, rows aligned with `counts`
    pub fn coordinates(&self) -> &Mat {
        &self.coordinates
    }

    pub fn spot_names(&self) -> &[Box<str>] {
        &self.spot_names
    }

    pub fn gene_names(&self) -> &[Box<str>] {
        &self.gene_names
    }

    /// Column index of a gene name, if present
    pub fn gene_index(&self, gene: &str) -> Option<usize> {
        self.gene_names.iter().position(|g| g.as_ref() == gene)
    }
}

fn sort_rows_by_name(mat: Mat, names: Vec<Box<str>>) -> (Mat, Vec<Box<str>>) {
    let mut order: Vec<usize> = (0..names.len()).collect();
    order.sort_by(|&a, &b| names[a].cmp(&names[b]));

    if order.iter().enumerate().all(|(i, &o)| i == o) {
        return (mat, names);
    }

    let sorted = Mat::from_fn(mat.nrows(), mat.ncols(), |i, j| mat[(order[i], j)]);
    let sorted_names = order.iter().map(|&o| names[o].clone()).collect();
    (sorted, sorted_names)
}

/// Rename duplicated gene names in place: the first occurrence keeps the
/// original name, later ones get `.1`, `.2`, ... suffixes.
fn disambiguate_gene_names(names: Vec<Box<str>>) -> Vec<Box<str>> {
    let mut seen: HashMap<Box<str>, usize> = HashMap::new();
    let mut renamed = 0_usize;

    let out = names
        .into_iter()
        .map(|g| {
            let hits = seen.entry(g.clone()).or_insert(0);
            *hits += 1;
            if *hits > 1 {
                renamed += 1;
                format!("{}.{}", g, *hits - 1).into_boxed_str()
            } else {
                g
            }
        })
        .collect();

    if renamed > 0 {
        warn!("{} duplicated gene names found; auto renamed", renamed);
    }

    out
}
