/// Fatal dataset construction errors. These are raised before any
/// analysis stage runs and are not recoverable.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error(
        "expression matrix and coordinate table have different numbers of spots: {expression} vs {coordinates}"
    )]
    SpotCountMismatch {
        expression: usize,
        coordinates: usize,
    },

    #[error("spot name mismatch at row {row}: expression '{expression}' vs coordinates '{coordinates}'")]
    SpotNameMismatch {
        row: usize,
        expression: Box<str>,
        coordinates: Box<str>,
    },

    #[error("coordinate table must have exactly two columns (x, y), found {found}")]
    CoordinateShape { found: usize },

    #[error("expression matrix is {nrows} x {ncols} but {nnames} {axis} names were given")]
    NameCountMismatch {
        nrows: usize,
        ncols: usize,
        nnames: usize,
        axis: &'static str,
    },
}
