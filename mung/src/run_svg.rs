use crate::pipeline::{run_pipeline, SvgAnalysis, SvgPipelineArgs};
use crate::svg_common::*;

use clap::{Parser, ValueEnum};
use spot_data::table_io::{open_buf_writer, read_named_matrix, write_named_matrix, NamedMat};
use spot_data::{filter, normalize, SpotDataset};
use std::io::Write;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalizer {
    /// Use the counts as given
    None,
    /// Counts-per-10k scaling
    Cpm,
    /// log1p of counts-per-10k
    Logcpm,
}

#[derive(Parser, Debug, Clone)]
///
/// Identify spatially variable genes in spatial transcriptomics data
///
pub struct SvgArgs {
    /// Count matrix file (spot x gene). Tab- or comma-separated with a
    /// header of gene names and a first column of spot names; `.gz` is
    /// read transparently.
    count_file: Box<str>,

    /// Coordinate file (spot x 2, columns x and y), same format and
    /// spot names as the count matrix.
    coord_file: Box<str>,

    /// Transpose the count matrix after reading (gene x spot input)
    #[arg(long)]
    transpose_counts: bool,

    /// Transpose the coordinate table after reading
    #[arg(long)]
    transpose_coords: bool,

    /// Number of nearest neighbours for the spatial KNN graph
    #[arg(short = 'k', long, default_value_t = 6)]
    knn: usize,

    /// Number of SVGs to carry into clustering
    #[arg(long, default_value_t = 1000)]
    n_svgs: usize,

    /// Number of SVG clusters to cut
    #[arg(long, default_value_t = 8)]
    n_svg_clusters: usize,

    /// Number of conditional permutations per spot
    #[arg(long, default_value_t = 999)]
    permutations: usize,

    /// Pseudo p-value cutoff for hotspot calls
    #[arg(long, default_value_t = 0.05)]
    alpha: f64,

    /// Base random seed (gene `g` draws from `seed + g`)
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Number of worker threads. Use all available cpus by default.
    #[arg(long, default_value_t = num_cpus::get())]
    cores: usize,

    /// Depth normalization applied before the pipeline
    #[arg(long, value_enum, default_value_t = Normalizer::None)]
    normalize: Normalizer,

    /// Drop genes with (sample) variance at or below this value
    #[arg(long)]
    min_variance: Option<f64>,

    /// Drop genes expressed in more than this ratio of spots
    #[arg(long)]
    max_expression_ratio: Option<f64>,

    /// Keep genes with mean expression below this quantile of all means
    #[arg(long)]
    mean_quantile: Option<f64>,

    /// Output header; one `{out}.{table}.tsv.gz` per derived table
    #[arg(long, short, required = true)]
    out: Box<str>,

    /// verbosity
    #[arg(long, short)]
    verbose: bool,
}

/// Read the two input tables, assemble the dataset, run the pipeline,
/// and write one gzipped TSV per derived table.
pub fn run_find_svg(args: SvgArgs) -> anyhow::Result<()> {
    if args.verbose {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    info!("reading {}", args.count_file);
    let counts = maybe_transpose(read_named_matrix(&args.count_file)?, args.transpose_counts);

    info!("reading {}", args.coord_file);
    let coords = maybe_transpose(read_named_matrix(&args.coord_file)?, args.transpose_coords);

    let dataset = SpotDataset::new(counts.mat, counts.rows, counts.cols, coords.mat, coords.rows)?;
    info!(
        "dataset: {} spots x {} genes",
        dataset.n_spots(),
        dataset.n_genes()
    );

    let dataset = match args.normalize {
        Normalizer::None => dataset,
        Normalizer::Cpm => normalize::cpm(&dataset)?,
        Normalizer::Logcpm => normalize::logcpm(&dataset)?,
    };

    let mut dataset = dataset;
    if let Some(var) = args.min_variance {
        dataset = filter::low_variance_filter(&dataset, var)?;
        info!("{} genes after variance filter", dataset.n_genes());
    }
    if let Some(ratio) = args.max_expression_ratio {
        dataset = filter::high_expression_filter(&dataset, ratio)?;
        info!("{} genes after expression-ratio filter", dataset.n_genes());
    }
    if let Some(q) = args.mean_quantile {
        dataset = filter::quantile_filter(&dataset, q)?;
        info!("{} genes after quantile filter", dataset.n_genes());
    }

    let analysis = run_pipeline(
        &dataset,
        &SvgPipelineArgs {
            knn: args.knn,
            n_svgs: args.n_svgs,
            n_clusters: args.n_svg_clusters,
            cores: args.cores,
            permutations: args.permutations,
            significance: args.alpha,
            seed: args.seed,
        },
    )?;

    info!("writing result tables with header {}", args.out);
    write_outputs(&dataset, &analysis, &args.out)?;

    Ok(())
}

fn maybe_transpose(table: NamedMat, transpose: bool) -> NamedMat {
    if transpose {
        NamedMat {
            mat: table.mat.transpose(),
            rows: table.cols,
            cols: table.rows,
        }
    } else {
        table
    }
}

fn write_outputs(
    dataset: &SpotDataset,
    analysis: &SvgAnalysis,
    header: &str,
) -> anyhow::Result<()> {
    let spots = dataset.spot_names();
    let genes = dataset.gene_names();
    let out = |name: &str| format!("{}.{}.tsv.gz", header, name);

    write_named_matrix(&out("hotspot"), &analysis.hotspot.hotspot, spots, genes, "spot")?;
    write_named_matrix(&out("pvalue"), &analysis.hotspot.p_values, spots, genes, "spot")?;
    write_named_matrix(&out("di"), &analysis.density.di, spots, genes, "spot")?;

    let ai = Mat::from_fn(genes.len(), 1, |g, _| analysis.density.ai[g]);
    write_named_matrix(&out("ai"), &ai, genes, &["AI".into()], "gene")?;

    let mut buf = open_buf_writer(&out("svg_cluster"))?;
    writeln!(buf, "gene\tcluster")?;
    for (gene, label) in analysis.clusters.assignments_sorted() {
        writeln!(buf, "{}\t{}", genes[gene], label)?;
    }
    buf.flush()?;

    let mut buf = open_buf_writer(&out("spot_type"))?;
    writeln!(buf, "spot\tcluster\tuncertain")?;
    for (i, st) in analysis.clusters.spot_types.iter().enumerate() {
        match st.cluster {
            Some(label) => writeln!(buf, "{}\t{}\t{}", spots[i], label, st.uncertain)?,
            None => writeln!(buf, "{}\tNA\t{}", spots[i], st.uncertain)?,
        }
    }
    buf.flush()?;

    Ok(())
}
