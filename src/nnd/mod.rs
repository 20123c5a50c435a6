//! Nearest Neighbor Descent entry points.
//!
//! [`build()`] refines an initial k-NN graph over one dataset by iterated
//! local joins; [`query()`] refines an initial query k-NN against a fixed
//! reference set by neighbor-of-neighbor traversal. Both take a
//! [`BuildParams`] and return the refined graph sorted ascending by distance
//! per row.
//!
//! Callers that need progress reporting or cooperative cancellation use the
//! `_with_progress` variants with any [`Progress`] implementation (for
//! example [`CancelToken`](crate::parallel::CancelToken)); an interrupted run
//! returns the current partial graph, which is valid, just not fully refined.
//!
//! ```
//! use descent::nnd::{build, BuildParams};
//! use descent::{Metric, NNGraph, PriorityKind};
//!
//! let data = [0.0_f32, 1.0, 2.0];
//! // Any valid k-NN graph works as init.
//! let init = NNGraph::from_parts(vec![2, 1, 2, 0, 0, 1], vec![2.0, 1.0, 1.0, 1.0, 2.0, 1.0], 3, 2).unwrap();
//! let params = BuildParams {
//!     priority: PriorityKind::RankedByDistance,
//!     delta: 0.0,
//!     ..BuildParams::default()
//! };
//! let graph = build(&data, 1, Metric::Euclidean, &init, &params).unwrap();
//! assert_eq!(graph.row_indices(0), &[1, 2]);
//! ```

pub(crate) mod build;
pub(crate) mod query;

use crate::candidates::PriorityKind;
use crate::distance::{Metric, PairDistance};
use crate::error::{DescentError, Result};
use crate::graph::{graph_to_heap_query, graph_to_heap_symmetric, heap_to_graph, NNGraph};
use crate::heap::{NeighborHeap, NPOS};
use crate::parallel::{ConsoleProgress, NullProgress, Progress};

/// Tuning knobs for [`build()`] and [`query()`].
#[derive(Debug, Clone)]
pub struct BuildParams {
    /// Cap on candidate-list width per point per iteration.
    pub max_candidates: usize,
    /// Maximum number of refinement iterations.
    pub n_iters: usize,
    /// Convergence tolerance as a fraction of `K * N` updates: an iteration
    /// accepting no more than `delta * K * N` updates ends the run.
    pub delta: f64,
    /// Candidate sampling policy.
    pub priority: PriorityKind,
    /// Run the join phases on rayon workers.
    pub parallel: bool,
    /// Points per driver block; interruption is polled between blocks.
    pub block_size: usize,
    /// Points per rayon work unit inside a block.
    pub grain_size: usize,
    /// Report iteration summaries to stderr.
    pub verbose: bool,
    /// Host seed; worker streams are derived from it.
    pub seed: u64,
}

impl Default for BuildParams {
    fn default() -> Self {
        BuildParams {
            max_candidates: 20,
            n_iters: 10,
            delta: 0.001,
            priority: PriorityKind::RandomSample,
            parallel: false,
            block_size: 16384,
            grain_size: 1,
            verbose: false,
            seed: 42,
        }
    }
}

fn check_params(params: &BuildParams) -> Result<()> {
    if params.max_candidates == 0 {
        return Err(DescentError::InvalidParameter(
            "max_candidates must be at least 1".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&params.delta) {
        return Err(DescentError::InvalidParameter(format!(
            "delta must be in [0, 1], got {}",
            params.delta
        )));
    }
    Ok(())
}

/// Refine `nn_init` into an approximate k-NN graph of `data`.
///
/// `data` is row-major `N x dim`; `nn_init` is any valid k-NN graph over the
/// same points (typically random). Requires `1 <= K <= N - 1`.
pub fn build(
    data: &[f32],
    dim: usize,
    metric: Metric,
    nn_init: &NNGraph,
    params: &BuildParams,
) -> Result<NNGraph> {
    if params.verbose {
        build_with_progress(data, dim, metric, nn_init, params, &ConsoleProgress::new(params.n_iters))
    } else {
        build_with_progress(data, dim, metric, nn_init, params, &NullProgress)
    }
}

/// [`build()`] with an explicit progress/cancellation sink.
pub fn build_with_progress<P: Progress>(
    data: &[f32],
    dim: usize,
    metric: Metric,
    nn_init: &NNGraph,
    params: &BuildParams,
    progress: &P,
) -> Result<NNGraph> {
    check_params(params)?;
    let distance = PairDistance::self_join(data, dim, metric)?;
    let n_points = distance.n_x();
    if nn_init.n_points() != n_points {
        return Err(DescentError::GraphShapeMismatch {
            context: format!(
                "init graph covers {} points, data has {}",
                nn_init.n_points(),
                n_points
            ),
        });
    }
    let k = nn_init.n_nbrs();
    if k == 0 || k > n_points.saturating_sub(1) {
        return Err(DescentError::InvalidParameter(format!(
            "k must be in [1, {}], got {}",
            n_points.saturating_sub(1),
            k
        )));
    }
    nn_init.validate(n_points)?;
    Ok(build::nnd_build(distance, nn_init, params, progress))
}

/// Refine `nn_init` into an approximate k-NN graph of `query_data` against
/// `reference`.
///
/// `reference_idx` is the reference set's own k-NN index lists, row-major
/// `N_ref x K` with [`NPOS`] marking empty slots; it is read once to build
/// the general-neighbor lists and never modified.
pub fn query(
    reference: &[f32],
    query_data: &[f32],
    dim: usize,
    metric: Metric,
    reference_idx: &[usize],
    nn_init: &NNGraph,
    params: &BuildParams,
) -> Result<NNGraph> {
    if params.verbose {
        query_with_progress(
            reference,
            query_data,
            dim,
            metric,
            reference_idx,
            nn_init,
            params,
            &ConsoleProgress::new(params.n_iters),
        )
    } else {
        query_with_progress(
            reference,
            query_data,
            dim,
            metric,
            reference_idx,
            nn_init,
            params,
            &NullProgress,
        )
    }
}

/// [`query()`] with an explicit progress/cancellation sink.
#[allow(clippy::too_many_arguments)]
pub fn query_with_progress<P: Progress>(
    reference: &[f32],
    query_data: &[f32],
    dim: usize,
    metric: Metric,
    reference_idx: &[usize],
    nn_init: &NNGraph,
    params: &BuildParams,
    progress: &P,
) -> Result<NNGraph> {
    check_params(params)?;
    let distance = PairDistance::between(reference, query_data, dim, metric)?;
    let n_ref = distance.n_x();
    let n_queries = distance.n_y();
    if nn_init.n_points() != n_queries {
        return Err(DescentError::GraphShapeMismatch {
            context: format!(
                "init graph covers {} queries, query data has {}",
                nn_init.n_points(),
                n_queries
            ),
        });
    }
    let k = nn_init.n_nbrs();
    if k == 0 || k > n_ref {
        return Err(DescentError::InvalidParameter(format!(
            "k must be in [1, {}], got {}",
            n_ref, k
        )));
    }
    nn_init.validate(n_ref)?;
    if reference_idx.len() != n_ref * k {
        return Err(DescentError::GraphShapeMismatch {
            context: format!(
                "reference_idx must be {} x {} row-major",
                n_ref, k
            ),
        });
    }
    for (pos, &r) in reference_idx.iter().enumerate() {
        if r != NPOS && r >= n_ref {
            return Err(DescentError::IndexOutOfRange {
                index: r,
                row: pos / k,
                n_points: n_ref,
            });
        }
    }
    Ok(query::nnd_query(distance, reference_idx, nn_init, params, progress))
}

/// Merge two dense k-NN graphs over the same point set by heap fusion.
///
/// Every edge of both graphs is offered to a fresh K-wide heap; with
/// `symmetric` the reverse edge is offered too (self-join graphs), without
/// it only the forward edge is (query graphs). The result keeps each row's
/// K best distinct neighbors, sorted ascending.
pub fn merge_nn(g1: &NNGraph, g2: &NNGraph, symmetric: bool) -> Result<NNGraph> {
    if g1.n_points() != g2.n_points() || g1.n_nbrs() != g2.n_nbrs() {
        return Err(DescentError::GraphShapeMismatch {
            context: format!(
                "cannot merge {} x {} with {} x {}",
                g1.n_points(),
                g1.n_nbrs(),
                g2.n_points(),
                g2.n_nbrs()
            ),
        });
    }
    let mut heap = NeighborHeap::new(g1.n_points(), g1.n_nbrs());
    if symmetric {
        graph_to_heap_symmetric(&mut heap, g1);
        graph_to_heap_symmetric(&mut heap, g2);
    } else {
        graph_to_heap_query(&mut heap, g1);
        graph_to_heap_query(&mut heap, g2);
    }
    heap.deheap_sort();
    Ok(heap_to_graph(&heap))
}
