//! 1-indexed host boundary.
//!
//! The core is 0-indexed with [`NPOS`](crate::heap::NPOS) sentinels; hosts
//! exchange flat row-major matrices with 1-indexed point ids, where 0 marks
//! an empty slot. Everything here validates, converts, delegates to the core
//! entry points and renders the result back.
//!
//! Metric tags accepted: `euclidean`, `l2` (squared Euclidean), `cosine`,
//! `manhattan`, `hamming`.

use crate::distance::{Metric, PairDistance};
use crate::error::Result;
use crate::graph::NNGraph;
use crate::heap::NPOS;
use crate::nnd::{self, BuildParams};
use crate::prune;
use crate::sparse::SparseGraph;

/// Build an approximate k-NN graph; see [`nnd::build()`].
///
/// `nn_idx` / `nn_dist` are `n_points x n_nbrs` row-major, 1-indexed.
/// Returns `(idx, dist)` in the same layout, rows sorted ascending.
pub fn build(
    data: &[f32],
    dim: usize,
    metric: &str,
    nn_idx: &[u32],
    nn_dist: &[f32],
    n_points: usize,
    n_nbrs: usize,
    params: &BuildParams,
) -> Result<(Vec<u32>, Vec<f32>)> {
    let metric: Metric = metric.parse()?;
    let init = NNGraph::from_host(nn_idx, nn_dist, n_points, n_nbrs)?;
    let out = nnd::build(data, dim, metric, &init, params)?;
    Ok(out.to_host())
}

/// Query a reference set; see [`nnd::query()`].
///
/// `reference_idx` is the reference's own k-NN, `n_ref x n_nbrs`, 1-indexed
/// with 0 for empty slots.
#[allow(clippy::too_many_arguments)]
pub fn query(
    reference: &[f32],
    query_data: &[f32],
    dim: usize,
    metric: &str,
    reference_idx: &[u32],
    nn_idx: &[u32],
    nn_dist: &[f32],
    n_queries: usize,
    n_nbrs: usize,
    params: &BuildParams,
) -> Result<(Vec<u32>, Vec<f32>)> {
    let metric: Metric = metric.parse()?;
    let init = NNGraph::from_host(nn_idx, nn_dist, n_queries, n_nbrs)?;
    let reference_idx: Vec<usize> = reference_idx
        .iter()
        .map(|&r| if r == 0 { NPOS } else { r as usize - 1 })
        .collect();
    let out = nnd::query(reference, query_data, dim, metric, &reference_idx, &init, params)?;
    Ok(out.to_host())
}

/// Merge two k-NN graphs; see [`nnd::merge_nn`].
#[allow(clippy::too_many_arguments)]
pub fn merge(
    nn_idx1: &[u32],
    nn_dist1: &[f32],
    nn_idx2: &[u32],
    nn_dist2: &[f32],
    n_points: usize,
    n_nbrs: usize,
    is_query: bool,
) -> Result<(Vec<u32>, Vec<f32>)> {
    let g1 = NNGraph::from_host(nn_idx1, nn_dist1, n_points, n_nbrs)?;
    let g2 = NNGraph::from_host(nn_idx2, nn_dist2, n_points, n_nbrs)?;
    let merged = nnd::merge_nn(&g1, &g2, !is_query)?;
    Ok(merged.to_host())
}

/// Remove dominated long edges; see [`prune::diversify`].
///
/// Returns CSR parts `(row_ptr, col, dist)` with 1-indexed columns.
pub fn diversify(
    data: &[f32],
    dim: usize,
    metric: &str,
    nn_idx: &[u32],
    nn_dist: &[f32],
    n_points: usize,
    n_nbrs: usize,
    prune_probability: f32,
    seed: u64,
) -> Result<(Vec<usize>, Vec<u32>, Vec<f32>)> {
    let metric: Metric = metric.parse()?;
    let graph = NNGraph::from_host(nn_idx, nn_dist, n_points, n_nbrs)?;
    graph.validate(n_points)?;
    let distance = PairDistance::self_join(data, dim, metric)?;
    let pruned = prune::diversify(&distance, &graph, prune_probability, seed)?;
    Ok(pruned.to_host())
}

/// Truncate rows to `max_degree`; see [`prune::degree_prune`].
///
/// Takes and returns 1-indexed CSR parts.
pub fn degree_prune(
    row_ptr: &[usize],
    col: &[u32],
    dist: &[f32],
    max_degree: usize,
) -> Result<(Vec<usize>, Vec<u32>, Vec<f32>)> {
    let graph = sparse_from_host(row_ptr, col, dist)?;
    Ok(prune::degree_prune(&graph, max_degree).to_host())
}

/// Per-source union of two sparse graphs; see [`prune::merge_graphs`].
pub fn merge_sparse(
    row_ptr1: &[usize],
    col1: &[u32],
    dist1: &[f32],
    row_ptr2: &[usize],
    col2: &[u32],
    dist2: &[f32],
) -> Result<(Vec<usize>, Vec<u32>, Vec<f32>)> {
    let g1 = sparse_from_host(row_ptr1, col1, dist1)?;
    let g2 = sparse_from_host(row_ptr2, col2, dist2)?;
    Ok(prune::merge_graphs(&g1, &g2)?.to_host())
}

fn sparse_from_host(row_ptr: &[usize], col: &[u32], dist: &[f32]) -> Result<SparseGraph> {
    use crate::error::DescentError;
    use smallvec::SmallVec;

    if row_ptr.is_empty() || *row_ptr.last().unwrap() != col.len() || col.len() != dist.len() {
        return Err(DescentError::GraphShapeMismatch {
            context: "malformed CSR parts".to_string(),
        });
    }
    let mut rows = Vec::with_capacity(row_ptr.len() - 1);
    for w in row_ptr.windows(2) {
        let (begin, end) = (w[0], w[1]);
        if begin > end || end > col.len() {
            return Err(DescentError::GraphShapeMismatch {
                context: "row pointers are not monotone".to_string(),
            });
        }
        let mut cols: SmallVec<[usize; 16]> = SmallVec::new();
        let mut dists: SmallVec<[f32; 16]> = SmallVec::new();
        for (&j, &d) in col[begin..end].iter().zip(dist[begin..end].iter()) {
            if j == 0 {
                return Err(DescentError::IndexOutOfRange {
                    index: 0,
                    row: rows.len(),
                    n_points: row_ptr.len() - 1,
                });
            }
            cols.push(j as usize - 1);
            dists.push(d);
        }
        rows.push((cols, dists));
    }
    Ok(SparseGraph::from_rows(rows))
}
