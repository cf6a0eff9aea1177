use approx::assert_abs_diff_eq;
use mung::{run_pipeline, SvgError, SvgPipelineArgs};
use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use spot_data::SpotDataset;

type Mat = DMatrix<f64>;

const SIDE: usize = 10;

fn in_block(spot: usize) -> bool {
    let (r, c) = (spot / SIDE, spot % SIDE);
    (3..6).contains(&r) && (3..6).contains(&c)
}

/// 10 x 10 unit grid with three genes: one confined to a 3 x 3 block,
/// one spatially random, one constant.
fn grid_dataset() -> SpotDataset {
    let n = SIDE * SIDE;
    let coords = Mat::from_fn(n, 2, |s, j| {
        if j == 0 {
            (s / SIDE) as f64
        } else {
            (s % SIDE) as f64
        }
    });

    let mut rng = StdRng::seed_from_u64(3);
    let counts = Mat::from_fn(n, 3, |s, g| match g {
        0 => {
            if in_block(s) {
                10.
            } else {
                0.
            }
        }
        1 => rng.random_range(0.0..1.0),
        _ => 2.,
    });

    let spot_names = (0..n).map(|i| Box::from(format!("s{}", i))).collect();
    let gene_names = ["block", "noise", "flat"]
        .iter()
        .map(|x| Box::from(*x))
        .collect();

    SpotDataset::from_aligned(counts, spot_names, gene_names, coords).expect("grid dataset")
}

/// Element-wise equality that treats two NaNs as equal, for matrices
/// carrying NaN columns from degenerate genes.
fn assert_same_values(a: &Mat, b: &Mat) {
    assert_eq!(a.shape(), b.shape());
    for (x, y) in a.iter().zip(b.iter()) {
        assert!(x == y || (x.is_nan() && y.is_nan()), "{} vs {}", x, y);
    }
}

fn small_args() -> SvgPipelineArgs {
    SvgPipelineArgs {
        knn: 4,
        n_svgs: 3,
        n_clusters: 2,
        cores: 2,
        ..Default::default()
    }
}

#[test]
fn planted_block_dominates_the_analysis() -> anyhow::Result<()> {
    let dataset = grid_dataset();
    let out = run_pipeline(&dataset, &small_args())?;

    // the block gene is recovered spot for spot
    for s in 0..dataset.n_spots() {
        assert_eq!(
            out.hotspot.hotspot[(s, 0)],
            u8::from(in_block(s)),
            "spot {}",
            s
        );
    }

    // a tight territory aggregates strongly
    assert!(out.density.ai[0] > 0.75, "block AI = {}", out.density.ai[0]);
    assert!(out.density.ai[0] >= out.density.ai[1]);

    // the constant gene degrades to nothing
    assert_abs_diff_eq!(out.density.ai[2], 0.);

    // every gene survives selection and gets a label
    assert_eq!(out.clusters.selected.len(), 3);
    assert_eq!(out.clusters.labels.len(), 3);
    assert_eq!(out.clusters.selected[0], 0);
    Ok(())
}

#[test]
fn block_spots_carry_the_block_gene_cluster() -> anyhow::Result<()> {
    let dataset = grid_dataset();
    let out = run_pipeline(&dataset, &small_args())?;

    let pos = out
        .clusters
        .selected
        .iter()
        .position(|&g| g == 0)
        .expect("block gene selected");
    let block_label = out.clusters.labels[pos];

    for s in 0..dataset.n_spots() {
        if in_block(s) {
            assert_eq!(out.clusters.spot_types[s].cluster, Some(block_label));
        }
    }
    Ok(())
}

#[test]
fn identical_inputs_give_identical_outputs() -> anyhow::Result<()> {
    let dataset = grid_dataset();
    let args = small_args();

    let a = run_pipeline(&dataset, &args)?;
    let b = run_pipeline(&dataset, &args)?;

    assert_eq!(a.hotspot.hotspot, b.hotspot.hotspot);
    // the flat gene's p column is all NaN, so compare NaN-aware
    assert_same_values(&a.hotspot.p_values, &b.hotspot.p_values);
    assert_same_values(&a.hotspot.expectation, &b.hotspot.expectation);
    assert_eq!(a.density.di, b.density.di);
    assert_eq!(a.clusters.selected, b.clusters.selected);
    assert_eq!(a.clusters.labels, b.clusters.labels);
    assert_eq!(a.clusters.spot_types, b.clusters.spot_types);
    Ok(())
}

#[test]
fn worker_count_does_not_change_the_answer() -> anyhow::Result<()> {
    let dataset = grid_dataset();

    let one = run_pipeline(
        &dataset,
        &SvgPipelineArgs {
            cores: 1,
            ..small_args()
        },
    )?;
    let four = run_pipeline(
        &dataset,
        &SvgPipelineArgs {
            cores: 4,
            ..small_args()
        },
    )?;

    assert_eq!(one.hotspot.hotspot, four.hotspot.hotspot);
    assert_same_values(&one.hotspot.p_values, &four.hotspot.p_values);
    assert_eq!(one.clusters.labels, four.clusters.labels);
    Ok(())
}

#[test]
fn dataset_is_untouched_by_a_run() -> anyhow::Result<()> {
    let dataset = grid_dataset();
    let before = dataset.counts().clone();

    run_pipeline(&dataset, &small_args())?;

    assert_eq!(dataset.counts(), &before);
    Ok(())
}

#[test]
fn out_of_range_parameters_fail_before_any_stage() {
    let dataset = grid_dataset();

    let cases = [
        SvgPipelineArgs {
            knn: 0,
            ..small_args()
        },
        SvgPipelineArgs {
            knn: dataset.n_spots(),
            ..small_args()
        },
        SvgPipelineArgs {
            n_svgs: 0,
            ..small_args()
        },
        SvgPipelineArgs {
            n_clusters: 0,
            ..small_args()
        },
        SvgPipelineArgs {
            cores: 0,
            ..small_args()
        },
        SvgPipelineArgs {
            permutations: 0,
            ..small_args()
        },
        SvgPipelineArgs {
            significance: 1.,
            ..small_args()
        },
    ];

    for args in cases {
        let err = run_pipeline(&dataset, &args).unwrap_err();
        assert!(
            matches!(
                err.downcast_ref::<SvgError>(),
                Some(SvgError::InvalidParameter { .. })
            ),
            "expected a parameter error, got {}",
            err
        );
    }
}
