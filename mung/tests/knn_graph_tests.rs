use mung::{SpatialKnn, SvgError};
use nalgebra::DMatrix;

type Mat = DMatrix<f64>;

fn line_coords(xs: &[f64]) -> Mat {
    Mat::from_fn(xs.len(), 2, |i, j| if j == 0 { xs[i] } else { 0. })
}

#[test]
fn k_out_of_range_is_invalid_parameter() {
    let coords = line_coords(&[0., 1., 2., 3.]);

    let err = SpatialKnn::build(&coords, 0).unwrap_err();
    assert!(matches!(err, SvgError::InvalidParameter { name: "k", .. }));

    let err = SpatialKnn::build(&coords, 4).unwrap_err();
    assert!(matches!(err, SvgError::InvalidParameter { name: "k", .. }));

    assert!(SpatialKnn::build(&coords, 3).is_ok());
}

#[test]
fn neighbors_are_ordered_by_distance() -> anyhow::Result<()> {
    let coords = line_coords(&[0., 1., 3., 7.]);
    let graph = SpatialKnn::build(&coords, 2)?;

    assert_eq!(graph.neighbors_of(0), &[1, 2]);
    assert_eq!(graph.neighbors_of(1), &[0, 2]);
    assert_eq!(graph.neighbors_of(2), &[1, 0]);
    assert_eq!(graph.neighbors_of(3), &[2, 1]);
    Ok(())
}

#[test]
fn distance_ties_break_by_ascending_index() -> anyhow::Result<()> {
    // spots 0 and 2 are equidistant from spot 1
    let coords = line_coords(&[0., 1., 2.]);
    let graph = SpatialKnn::build(&coords, 1)?;

    assert_eq!(graph.neighbors_of(1), &[0]);
    Ok(())
}

#[test]
fn membership_is_directed() -> anyhow::Result<()> {
    let coords = line_coords(&[0., 1., 1.5]);
    let graph = SpatialKnn::build(&coords, 1)?;

    assert!(graph.is_neighbor(0, 1));
    assert!(!graph.is_neighbor(1, 0)); // 1's nearest is 2
    assert!(graph.is_neighbor(1, 2));
    assert!(graph.is_neighbor(2, 1));
    Ok(())
}

#[test]
fn weights_are_row_standardized() -> anyhow::Result<()> {
    let coords = line_coords(&[0., 1., 2., 3., 4.]);
    let graph = SpatialKnn::build(&coords, 4)?;

    assert_eq!(graph.k(), 4);
    assert!((graph.weight() - 0.25).abs() < 1e-12);
    assert_eq!(graph.neighbors_of(0).len(), 4);
    Ok(())
}

#[test]
fn coordinate_shape_is_checked() {
    let coords = Mat::zeros(4, 3);
    let err = SpatialKnn::build(&coords, 2).unwrap_err();
    assert!(matches!(err, SvgError::ShapeMismatch { .. }));
}
