//! Graph edit passes: long-edge removal, degree pruning, merging.
//!
//! These post-process a built k-NN graph into a sparser navigable graph.
//! Rows only ever shrink here; the passes never add edges.

use crate::distance::PairDistance;
use crate::error::{DescentError, Result};
use crate::graph::NNGraph;
use crate::heap::NPOS;
use crate::rng::stream_rng;
use crate::sparse::{SparseGraph, SparseRow};
use rand::rngs::SmallRng;
use rand::Rng;
use smallvec::SmallVec;

/// Remove dominated long edges from a dense k-NN graph.
///
/// Scanning each row in ascending-distance order, an edge `(i, j)` is
/// dominated when some already-kept neighbor `k` of `i` satisfies
/// `d(k, j) < d(i, j)`. A dominated edge is dropped with probability
/// `prune_probability` (one uniform draw per dominated edge); the first
/// neighbor of a row is always retained.
pub fn diversify(
    distance: &PairDistance<'_>,
    graph: &NNGraph,
    prune_probability: f32,
    seed: u64,
) -> Result<SparseGraph> {
    check_probability(prune_probability)?;
    let rows = (0..graph.n_points())
        .map(|i| {
            let mut cols: SmallVec<[usize; 16]> = SmallVec::new();
            let mut dists: SmallVec<[f32; 16]> = SmallVec::new();
            for slot in 0..graph.n_nbrs() {
                let j = graph.index(i, slot);
                if j == NPOS {
                    continue;
                }
                cols.push(j);
                dists.push(graph.distance(i, slot));
            }
            let mut rng = stream_rng(seed, i as u64);
            diversify_row(distance, &cols, &dists, prune_probability, &mut rng)
        })
        .collect();
    Ok(SparseGraph::from_rows(rows))
}

/// Sparse-graph variant of [`diversify`]; rows are sorted by distance before
/// scanning so the dominance test always sees closer neighbors first.
pub fn diversify_sparse(
    distance: &PairDistance<'_>,
    graph: &SparseGraph,
    prune_probability: f32,
    seed: u64,
) -> Result<SparseGraph> {
    check_probability(prune_probability)?;
    let rows = (0..graph.n_points())
        .map(|i| {
            let (cols, dists) = graph.sorted_row(i);
            let mut rng = stream_rng(seed, i as u64);
            diversify_row(distance, &cols, &dists, prune_probability, &mut rng)
        })
        .collect();
    Ok(SparseGraph::from_rows(rows))
}

fn diversify_row(
    distance: &PairDistance<'_>,
    cols: &[usize],
    dists: &[f32],
    prune_probability: f32,
    rng: &mut SmallRng,
) -> SparseRow {
    let mut kept_cols: SmallVec<[usize; 16]> = SmallVec::new();
    let mut kept_dists: SmallVec<[f32; 16]> = SmallVec::new();
    for (pos, (&j, &d_ij)) in cols.iter().zip(dists.iter()).enumerate() {
        if pos > 0 {
            let dominated = kept_cols.iter().any(|&k| distance.compute(k, j) < d_ij);
            if dominated && rng.gen::<f32>() < prune_probability {
                continue;
            }
        }
        kept_cols.push(j);
        kept_dists.push(d_ij);
    }
    (kept_cols, kept_dists)
}

/// Truncate each row to its closest `max_degree` neighbors.
pub fn degree_prune(graph: &SparseGraph, max_degree: usize) -> SparseGraph {
    let rows = (0..graph.n_points())
        .map(|i| {
            let (mut cols, mut dists) = graph.sorted_row(i);
            cols.truncate(max_degree);
            dists.truncate(max_degree);
            (cols, dists)
        })
        .collect();
    SparseGraph::from_rows(rows)
}

/// Union of two sparse graphs per source vertex.
///
/// Duplicate `(i, j)` edges collapse keeping the smaller distance; output
/// rows are sorted ascending by distance.
pub fn merge_graphs(g1: &SparseGraph, g2: &SparseGraph) -> Result<SparseGraph> {
    if g1.n_points() != g2.n_points() {
        return Err(DescentError::GraphShapeMismatch {
            context: format!(
                "cannot merge graphs over {} and {} points",
                g1.n_points(),
                g2.n_points()
            ),
        });
    }
    let rows = (0..g1.n_points())
        .map(|i| {
            let mut entries: SmallVec<[(usize, f32); 16]> = SmallVec::new();
            for g in [g1, g2] {
                entries.extend(
                    g.row_indices(i)
                        .iter()
                        .copied()
                        .zip(g.row_distances(i).iter().copied()),
                );
            }
            // Group duplicates, keep the smaller distance per target.
            entries.sort_unstable_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)));
            entries.dedup_by_key(|e| e.0);
            entries.sort_unstable_by(|a, b| a.1.total_cmp(&b.1));
            let mut cols = SmallVec::with_capacity(entries.len());
            let mut dists = SmallVec::with_capacity(entries.len());
            for (j, d) in entries {
                cols.push(j);
                dists.push(d);
            }
            (cols, dists)
        })
        .collect();
    Ok(SparseGraph::from_rows(rows))
}

fn check_probability(p: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&p) {
        return Err(DescentError::InvalidParameter(format!(
            "prune_probability must be in [0, 1], got {}",
            p
        )));
    }
    Ok(())
}
