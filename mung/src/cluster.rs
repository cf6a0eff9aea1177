use crate::error::SvgError;
use crate::svg_common::*;

#[derive(Debug, Clone)]
pub struct SvgClusterArgs {
    /// Number of top genes (by AI) to carry into clustering
    pub n_svgs: usize,
    /// Number of flat gene clusters to cut
    pub n_clusters: usize,
}

impl Default for SvgClusterArgs {
    fn default() -> Self {
        Self {
            n_svgs: 1000,
            n_clusters: 8,
        }
    }
}

/// Dominant gene-cluster call for one spot. `cluster` is `None` when no
/// selected gene is a hotspot at the spot. A spot is `uncertain` when
/// it has no call or the top two cluster tallies tie (ties resolve to
/// the lowest label).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotType {
    pub cluster: Option<usize>,
    pub uncertain: bool,
}

/// Gene cluster assignment over the selected SVGs plus the per-spot
/// dominant-cluster labels derived from it.
#[derive(Debug, Clone)]
pub struct SvgClusters {
    /// Selected gene column indices, AI-descending (ties by column order)
    pub selected: Vec<usize>,
    /// Cluster label per selected gene, 1-based, parallel to `selected`
    pub labels: Vec<usize>,
    /// Dominant cluster per spot
    pub spot_types: Vec<SpotType>,
}

impl SvgClusters {
    /// (gene column, label) pairs sorted by label then column order,
    /// the presentation order of the cluster table.
    pub fn assignments_sorted(&self) -> Vec<(usize, usize)> {
        let mut out: Vec<(usize, usize)> = self
            .selected
            .iter()
            .copied()
            .zip(self.labels.iter().copied())
            .collect();
        out.sort_by_key(|&(gene, label)| (label, gene));
        out
    }
}

/// Select the top `n_svgs` genes by aggregation index, build their
/// pairwise Jaccard distances over hotspot columns, cluster with Ward
/// linkage cut to `n_clusters` flat clusters, and derive per-spot
/// dominant labels by majority vote.
///
/// When fewer genes than `n_svgs` have nonzero AI the selection is
/// padded with zero-AI genes in column order. When `n_clusters` exceeds
/// the number of selected genes every gene becomes its own cluster.
pub fn svg_clusters(
    hotspot: &BinMat,
    ai: &DVec,
    args: &SvgClusterArgs,
) -> Result<SvgClusters, SvgError> {
    if args.n_svgs < 1 {
        return Err(SvgError::invalid("n_svgs", args.n_svgs, ">= 1"));
    }
    if args.n_clusters < 1 {
        return Err(SvgError::invalid("n_clusters", args.n_clusters, ">= 1"));
    }
    if ai.len() != hotspot.ncols() {
        return Err(SvgError::ShapeMismatch {
            stage: "cluster assignment",
            details: format!(
                "{} AI entries for {} hotspot columns",
                ai.len(),
                hotspot.ncols()
            ),
        });
    }

    let selected = top_genes_by_ai(ai, args.n_svgs);
    let n_selected = selected.len();
    let n_clusters = args.n_clusters.min(n_selected);

    info!(
        "clustering {} selected genes into {} clusters",
        n_selected, n_clusters
    );

    let dist = jaccard_distances(hotspot, &selected);
    let merges = ward_linkage(&dist);
    let labels = cut_maxclust(&merges, n_selected, n_clusters);

    let spot_types = assign_spot_types(hotspot, &selected, &labels);

    Ok(SvgClusters {
        selected,
        labels,
        spot_types,
    })
}

/// Gene columns ranked by AI descending, stable tie-break by column
/// order, truncated to `n_svgs`.
fn top_genes_by_ai(ai: &DVec, n_svgs: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..ai.len()).collect();
    order.sort_by(|&a, &b| ai[b].total_cmp(&ai[a]).then(a.cmp(&b)));
    order.truncate(n_svgs);
    order
}

/// Pairwise Jaccard distances between hotspot indicator columns. Two
/// empty hotspot sets are at distance 1 by convention.
fn jaccard_distances(hotspot: &BinMat, genes: &[usize]) -> Mat {
    let d = genes.len();
    let n = hotspot.nrows();

    let mut dist = Mat::zeros(d, d);
    for a in 0..d {
        for b in (a + 1)..d {
            let (ga, gb) = (genes[a], genes[b]);
            let mut inter = 0_usize;
            let mut union = 0_usize;
            for i in 0..n {
                let (ha, hb) = (hotspot[(i, ga)], hotspot[(i, gb)]);
                if ha == 1 && hb == 1 {
                    inter += 1;
                }
                if ha == 1 || hb == 1 {
                    union += 1;
                }
            }
            let value = if union == 0 {
                1.
            } else {
                1. - inter as f64 / union as f64
            };
            dist[(a, b)] = value;
            dist[(b, a)] = value;
        }
    }
    dist
}

/// One agglomeration step: clusters represented by leaves `a` and `b`
/// merged at the given height.
#[derive(Debug, Clone)]
struct Merge {
    a: usize,
    b: usize,
    height: f64,
}

/// Ward-linkage agglomeration by the nearest-neighbour chain algorithm
/// with the Lance-Williams distance update. Each active cluster keeps
/// its lowest leaf index as representative; the returned merges are in
/// chain discovery order (heights are monotone after sorting, Ward
/// admits no inversions).
fn ward_linkage(dist: &Mat) -> Vec<Merge> {
    let n = dist.nrows();
    let mut d = dist.clone();
    let mut size = vec![1_usize; n];
    let mut active = vec![true; n];

    let mut chain: Vec<usize> = Vec::with_capacity(n);
    let mut merges: Vec<Merge> = Vec::with_capacity(n.saturating_sub(1));

    while merges.len() + 1 < n {
        if chain.is_empty() {
            let first = (0..n).find(|&i| active[i]).unwrap_or(0);
            chain.push(first);
        }

        loop {
            let a = *chain.last().unwrap_or(&0);

            // nearest active cluster, ties to the smallest index
            let mut nearest = None;
            let mut best = f64::INFINITY;
            for b in 0..n {
                if b == a || !active[b] {
                    continue;
                }
                if d[(a, b)] < best {
                    best = d[(a, b)];
                    nearest = Some(b);
                }
            }
            let Some(b) = nearest else { break };

            if chain.len() >= 2 && chain[chain.len() - 2] == b {
                // reciprocal nearest neighbours: merge
                chain.pop();
                chain.pop();

                let (lo, hi) = (a.min(b), a.max(b));
                merges.push(Merge {
                    a: lo,
                    b: hi,
                    height: best,
                });

                // Lance-Williams Ward update against the surviving rep
                let (sa, sb) = (size[lo] as f64, size[hi] as f64);
                let dab2 = best * best;
                for x in 0..n {
                    if !active[x] || x == lo || x == hi {
                        continue;
                    }
                    let sx = size[x] as f64;
                    let dax2 = d[(lo, x)] * d[(lo, x)];
                    let dbx2 = d[(hi, x)] * d[(hi, x)];
                    let merged = ((sx + sa) * dax2 + (sx + sb) * dbx2 - sx * dab2)
                        / (sa + sb + sx);
                    let merged = merged.max(0.).sqrt();
                    d[(lo, x)] = merged;
                    d[(x, lo)] = merged;
                }

                active[hi] = false;
                size[lo] += size[hi];
                break;
            }

            chain.push(b);
        }
    }

    merges.sort_by(|p, q| p.height.total_cmp(&q.height));
    merges
}

/// Cut the dendrogram to exactly `n_clusters` flat clusters (maxclust):
/// apply the first `n - n_clusters` merges in height order, then number
/// the resulting groups 1..=n_clusters by first appearance.
fn cut_maxclust(merges: &[Merge], n: usize, n_clusters: usize) -> Vec<usize> {
    let mut parent: Vec<usize> = (0..n).collect();

    fn find(parent: &mut Vec<usize>, mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    for merge in merges.iter().take(n.saturating_sub(n_clusters)) {
        let ra = find(&mut parent, merge.a);
        let rb = find(&mut parent, merge.b);
        let (lo, hi) = (ra.min(rb), ra.max(rb));
        parent[hi] = lo;
    }

    let mut label_of_root: HashMap<usize, usize> = HashMap::new();
    let mut labels = vec![0_usize; n];
    for i in 0..n {
        let root = find(&mut parent, i);
        let next = label_of_root.len() + 1;
        labels[i] = *label_of_root.entry(root).or_insert(next);
    }
    labels
}

/// Majority vote over the clusters of selected genes hotspot at each
/// spot. Ties go to the lowest label and are flagged uncertain; spots
/// with no hotspot among the selected genes get no label.
fn assign_spot_types(hotspot: &BinMat, selected: &[usize], labels: &[usize]) -> Vec<SpotType> {
    let n_spots = hotspot.nrows();
    let n_labels = labels.iter().copied().max().unwrap_or(0);

    (0..n_spots)
        .map(|i| {
            let mut tally = vec![0_usize; n_labels + 1];
            for (&gene, &label) in selected.iter().zip(labels.iter()) {
                if hotspot[(i, gene)] == 1 {
                    tally[label] += 1;
                }
            }

            let top = tally.iter().copied().max().unwrap_or(0);
            if top == 0 {
                return SpotType {
                    cluster: None,
                    uncertain: true,
                };
            }

            let dominant = tally.iter().position(|&c| c == top).unwrap_or(0);
            let tied = tally.iter().filter(|&&c| c == top).count() > 1;

            SpotType {
                cluster: Some(dominant),
                uncertain: tied,
            }
        })
        .collect()
}
