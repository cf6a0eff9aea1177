use mung::moran::local_moran;
use mung::{LocalMoranArgs, SpatialKnn, SvgError};
use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

type Mat = DMatrix<f64>;

/// 10 x 10 grid of unit-spaced spots, row-major spot order.
fn grid_coords(side: usize) -> Mat {
    Mat::from_fn(side * side, 2, |s, j| {
        if j == 0 {
            (s / side) as f64
        } else {
            (s % side) as f64
        }
    })
}

fn in_block(spot: usize, side: usize) -> bool {
    let (r, c) = (spot / side, spot % side);
    (3..6).contains(&r) && (3..6).contains(&c)
}

#[test]
fn planted_block_is_recovered() -> anyhow::Result<()> {
    let side = 10;
    let coords = grid_coords(side);
    let graph = SpatialKnn::build(&coords, 4)?;

    let counts = Mat::from_fn(side * side, 1, |s, _| if in_block(s, side) { 1. } else { 0. });
    let result = local_moran(&counts, &graph, &LocalMoranArgs::default())?;

    for s in 0..side * side {
        let expected = u8::from(in_block(s, side));
        assert_eq!(
            result.hotspot[(s, 0)],
            expected,
            "spot {} (row {}, col {})",
            s,
            s / side,
            s % side
        );
    }
    Ok(())
}

#[test]
fn spatially_uncorrelated_gene_stays_quiet() -> anyhow::Result<()> {
    let n = 200;
    let mut rng = StdRng::seed_from_u64(7);

    let coords = Mat::from_fn(n, 2, |_, _| rng.random_range(0.0..100.0));
    let counts = Mat::from_fn(n, 1, |_, _| rng.random_range(0.0..1.0));

    let graph = SpatialKnn::build(&coords, 6)?;
    let result = local_moran(&counts, &graph, &LocalMoranArgs::default())?;

    let flagged: usize = (0..n).map(|s| result.hotspot[(s, 0)] as usize).sum();
    assert!(
        flagged <= n / 10,
        "{} of {} spots flagged on random data",
        flagged,
        n
    );
    Ok(())
}

#[test]
fn constant_gene_degenerates_silently() -> anyhow::Result<()> {
    let coords = grid_coords(4);
    let graph = SpatialKnn::build(&coords, 3)?;

    let counts = Mat::from_element(16, 1, 5.);
    let result = local_moran(&counts, &graph, &LocalMoranArgs::default())?;

    for s in 0..16 {
        assert_eq!(result.hotspot[(s, 0)], 0);
        assert!(result.p_values[(s, 0)].is_nan());
        assert!(result.expectation[(s, 0)].is_nan());
    }
    Ok(())
}

#[test]
fn pseudo_p_values_are_bounded() -> anyhow::Result<()> {
    let side = 6;
    let coords = grid_coords(side);
    let graph = SpatialKnn::build(&coords, 4)?;

    let counts = Mat::from_fn(side * side, 1, |s, _| (s % 5) as f64);
    let args = LocalMoranArgs {
        permutations: 99,
        ..Default::default()
    };
    let result = local_moran(&counts, &graph, &args)?;

    let floor = 1. / 100.;
    for s in 0..side * side {
        let p = result.p_values[(s, 0)];
        assert!(p >= floor && p <= 1., "p = {} out of range", p);
        assert_eq!(result.hotspot[(s, 0)] & !1, 0); // binary
    }
    Ok(())
}

#[test]
fn identical_seed_reproduces_results() -> anyhow::Result<()> {
    let side = 8;
    let coords = grid_coords(side);
    let graph = SpatialKnn::build(&coords, 4)?;

    let mut rng = StdRng::seed_from_u64(11);
    let counts = Mat::from_fn(side * side, 3, |_, _| rng.random_range(0.0..10.0));

    let args = LocalMoranArgs {
        permutations: 99,
        ..Default::default()
    };
    let a = local_moran(&counts, &graph, &args)?;
    let b = local_moran(&counts, &graph, &args)?;

    assert_eq!(a.hotspot, b.hotspot);
    assert_eq!(a.p_values, b.p_values);
    assert_eq!(a.expectation, b.expectation);
    Ok(())
}

#[test]
fn graph_and_matrix_shapes_must_agree() -> anyhow::Result<()> {
    let graph = SpatialKnn::build(&grid_coords(4), 3)?;
    let counts = Mat::zeros(10, 2);

    let err = local_moran(&counts, &graph, &LocalMoranArgs::default()).unwrap_err();
    assert!(matches!(err, SvgError::ShapeMismatch { .. }));
    Ok(())
}

#[test]
fn non_finite_expression_aborts_the_stage() -> anyhow::Result<()> {
    let graph = SpatialKnn::build(&grid_coords(4), 3)?;
    let mut counts = Mat::from_fn(16, 2, |s, g| (s + g) as f64);
    counts[(3, 1)] = f64::NAN;

    let err = local_moran(&counts, &graph, &LocalMoranArgs::default()).unwrap_err();
    assert!(matches!(
        err,
        SvgError::StageFailure { gene: 1, .. }
    ));
    Ok(())
}
