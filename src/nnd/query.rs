//! NND query loop: neighbor-of-neighbor traversal against a static
//! reference graph.
//!
//! There is no symmetry to exploit when querying, so no local join: the
//! reference k-NN never changes, query points have no reverse neighbors, and
//! the reference general-neighbor lists can be built once up front. Each
//! iteration expands every query's *new* neighbors through the general
//! neighbors of those references; consumed neighbors are unflagged so they
//! are not expanded twice.
//!
//! Query rows are owner-partitioned: a worker only ever pushes into the rows
//! of its own chunk, so the parallel path needs no row locks.

use crate::candidates::{
    build_query_candidates, build_query_candidates_row, flag_retained_new_candidates,
    CandidateSampler,
};
use crate::distance::PairDistance;
use crate::graph::{graph_to_heap_query, heap_to_graph, NNGraph};
use crate::heap::{HeapRow, NeighborHeap, NPOS};
use crate::nnd::build::is_converged;
use crate::nnd::BuildParams;
use crate::parallel::{batched_for_serial, Progress};
use crate::rng::{chunk_stream, stream_rng};
use crate::update::QueryUpdater;
use rayon::prelude::*;
use std::collections::HashSet;

/// Stream id reserved for the one-time general-neighbor build.
const GN_STREAM: u64 = u64::MAX;

pub(crate) fn nnd_query<P: Progress>(
    distance: PairDistance<'_>,
    reference_idx: &[usize],
    nn_init: &NNGraph,
    params: &BuildParams,
    progress: &P,
) -> NNGraph {
    // With enough candidate width every sampled edge is retained, so its
    // flag can be cleared at push time; otherwise clearing is deferred to
    // the retained-candidate post-pass.
    let flag_on_add = params.max_candidates >= nn_init.n_nbrs();
    nnd_query_with_flag_policy(distance, reference_idx, nn_init, params, flag_on_add, progress)
}

pub(crate) fn nnd_query_with_flag_policy<P: Progress>(
    distance: PairDistance<'_>,
    reference_idx: &[usize],
    nn_init: &NNGraph,
    params: &BuildParams,
    flag_on_add: bool,
    progress: &P,
) -> NNGraph {
    let n_queries = nn_init.n_points();
    let n_nbrs = nn_init.n_nbrs();
    let n_ref = distance.n_x();
    let tol = params.delta * n_nbrs as f64 * n_queries as f64;

    let mut current = NeighborHeap::new(n_queries, n_nbrs);
    graph_to_heap_query(&mut current, nn_init);

    let mut gn_graph = NeighborHeap::new(n_ref, params.max_candidates);
    let mut gn_sampler =
        CandidateSampler::new(params.priority, stream_rng(params.seed, GN_STREAM));
    crate::candidates::build_general_nbrs(reference_idx, n_nbrs, &mut gn_graph, &mut gn_sampler);

    for iter in 0..params.n_iters {
        let (c, interrupted) = if params.parallel {
            run_iteration_parallel(
                &mut current,
                distance,
                &gn_graph,
                flag_on_add,
                params,
                iter,
                progress,
            )
        } else {
            run_iteration_serial(
                &mut current,
                distance,
                &gn_graph,
                flag_on_add,
                params,
                iter,
                progress,
            )
        };
        progress.iter_finished(iter, c);
        if interrupted || progress.interrupted() {
            break;
        }
        if is_converged(c, tol) {
            progress.converged(c, tol);
            break;
        }
    }

    current.deheap_sort();
    heap_to_graph(&current)
}

fn run_iteration_serial<P: Progress>(
    current: &mut NeighborHeap,
    distance: PairDistance<'_>,
    gn_graph: &NeighborHeap,
    flag_on_add: bool,
    params: &BuildParams,
    iter: usize,
    progress: &P,
) -> (usize, bool) {
    let n_queries = current.n_points();
    let mut new_cands = NeighborHeap::new(n_queries, params.max_candidates);
    let mut sampler = CandidateSampler::new(
        params.priority,
        stream_rng(params.seed, chunk_stream(iter, 0)),
    );
    build_query_candidates(current, &mut sampler, &mut new_cands, flag_on_add);
    if !flag_on_add {
        flag_retained_new_candidates(current, &new_cands);
    }
    if sampler.should_sort() {
        new_cands.deheap_sort();
    }

    let updater = QueryUpdater::new(distance);
    let mut seen = HashSet::new();
    batched_for_serial(n_queries, params.block_size, progress, |range| {
        let mut c = 0;
        for q in range {
            c += sweep_query(
                current.row_mut(q),
                q,
                &updater,
                new_cands.row(q),
                gn_graph,
                &mut seen,
            );
        }
        c
    })
}

fn run_iteration_parallel<P: Progress>(
    current: &mut NeighborHeap,
    distance: PairDistance<'_>,
    gn_graph: &NeighborHeap,
    flag_on_add: bool,
    params: &BuildParams,
    iter: usize,
    progress: &P,
) -> (usize, bool) {
    let n_queries = current.n_points();
    let block_size = params.block_size.max(1);
    let grain_size = params.grain_size.max(1);
    let mut new_cands = NeighborHeap::new(n_queries, params.max_candidates);

    // Candidate build, owner-partitioned over query rows.
    let mut begin = 0;
    while begin < n_queries {
        let end = (begin + block_size).min(n_queries);
        current.rows_mut()[begin..end]
            .par_chunks_mut(grain_size)
            .zip(new_cands.rows_mut()[begin..end].par_chunks_mut(grain_size))
            .enumerate()
            .for_each(|(chunk_idx, (cur_chunk, new_chunk))| {
                let offset = begin + chunk_idx * grain_size;
                let mut sampler = CandidateSampler::new(
                    params.priority,
                    stream_rng(params.seed, chunk_stream(iter, offset)),
                );
                for (local, (cur_row, new_row)) in
                    cur_chunk.iter_mut().zip(new_chunk.iter_mut()).enumerate()
                {
                    build_query_candidates_row(
                        cur_row,
                        offset + local,
                        &mut sampler,
                        new_row,
                        flag_on_add,
                    );
                }
            });
        progress.block_finished(end);
        if progress.interrupted() {
            return (0, true);
        }
        begin = end;
    }

    if !flag_on_add {
        current
            .rows_mut()
            .par_iter_mut()
            .zip(new_cands.rows().par_iter())
            .for_each(|(row, new_row)| row.clear_retained_flags(new_row));
    }
    if params.priority.should_sort() {
        new_cands.rows_mut().par_iter_mut().for_each(|r| r.deheap_sort());
    }

    // Neighbor-of-neighbor sweep, same partitioning.
    let updater = QueryUpdater::new(distance);
    let mut total = 0;
    let mut begin = 0;
    while begin < n_queries {
        let end = (begin + block_size).min(n_queries);
        let block_updates: usize = current.rows_mut()[begin..end]
            .par_chunks_mut(grain_size)
            .enumerate()
            .map(|(chunk_idx, chunk)| {
                let offset = begin + chunk_idx * grain_size;
                let mut seen = HashSet::new();
                let mut c = 0;
                for (local, row) in chunk.iter_mut().enumerate() {
                    let q = offset + local;
                    c += sweep_query(row, q, &updater, new_cands.row(q), gn_graph, &mut seen);
                }
                c
            })
            .sum();
        total += block_updates;
        progress.block_finished(end);
        if progress.interrupted() {
            return (total, true);
        }
        begin = end;
    }
    (total, false)
}

/// Expand query `q` through the general neighbors of its new candidates.
///
/// `seen` holds reference indices already evaluated in this query's pass; it
/// is cleared at entry (query boundary).
fn sweep_query(
    row: &mut HeapRow,
    q: usize,
    updater: &QueryUpdater<'_>,
    new_row: &HeapRow,
    gn_graph: &NeighborHeap,
    seen: &mut HashSet<usize>,
) -> usize {
    seen.clear();
    let mut c = 0;
    for j in 0..new_row.len() {
        let r = new_row.index(j);
        if r == NPOS {
            continue;
        }
        for k in 0..gn_graph.n_nbrs() {
            let r2 = gn_graph.index(r, k);
            if r2 == NPOS || !seen.insert(r2) {
                continue;
            }
            c += updater.generate_and_apply(row, q, r2);
        }
    }
    c
}
