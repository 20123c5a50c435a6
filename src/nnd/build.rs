//! NND self-join build loop.
//!
//! Each iteration splits the current graph into new/old candidates, then runs
//! the local join: within every point's candidate set, new-new pairs and
//! new-old pairs are evaluated as candidate edges for *each other* (two old
//! points were already compared in an earlier iteration, so old-old pairs are
//! skipped). The loop stops when an iteration accepts no more than
//! `delta * K * N` updates.

use crate::candidates::{
    build_candidates, build_candidates_range, flag_retained_new_candidates, CandidateSampler,
};
use crate::distance::PairDistance;
use crate::graph::{graph_to_heap_symmetric, heap_to_graph, NNGraph};
use crate::heap::{LockedNeighborHeap, NeighborHeap, NPOS};
use crate::nnd::BuildParams;
use crate::parallel::{batched_for, batched_for_serial, Progress};
use crate::rng::{chunk_stream, stream_rng};
use crate::update::GraphUpdater;
use rayon::prelude::*;

pub(crate) fn is_converged(n_updates: usize, tol: f64) -> bool {
    n_updates as f64 <= tol
}

pub(crate) fn nnd_build<P: Progress>(
    distance: PairDistance<'_>,
    nn_init: &NNGraph,
    params: &BuildParams,
    progress: &P,
) -> NNGraph {
    let n_points = nn_init.n_points();
    let n_nbrs = nn_init.n_nbrs();
    let tol = params.delta * n_nbrs as f64 * n_points as f64;

    let mut current = NeighborHeap::new(n_points, n_nbrs);
    graph_to_heap_symmetric(&mut current, nn_init);

    for iter in 0..params.n_iters {
        let (c, interrupted) = if params.parallel {
            run_iteration_parallel(&mut current, distance, params, iter, progress)
        } else {
            run_iteration_serial(&mut current, distance, params, iter, progress)
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
    params: &BuildParams,
    iter: usize,
    progress: &P,
) -> (usize, bool) {
    let n_points = current.n_points();
    let mut new_cands = NeighborHeap::new(n_points, params.max_candidates);
    let mut old_cands = NeighborHeap::new(n_points, params.max_candidates);

    let mut sampler = CandidateSampler::new(
        params.priority,
        stream_rng(params.seed, chunk_stream(iter, 0)),
    );
    build_candidates(current, &mut sampler, &mut new_cands, &mut old_cands);
    flag_retained_new_candidates(current, &new_cands);

    if sampler.should_sort() {
        new_cands.deheap_sort();
        old_cands.deheap_sort();
    }

    let mut updater = GraphUpdater::new(distance);
    batched_for_serial(n_points, params.block_size, progress, |range| {
        updater.clear_seen();
        let mut c = 0;
        for i in range {
            c += local_join_point(&new_cands, &old_cands, i, |p, q| {
                updater.generate_and_apply(current, p, q)
            });
        }
        c
    })
}

fn run_iteration_parallel<P: Progress>(
    current: &mut NeighborHeap,
    distance: PairDistance<'_>,
    params: &BuildParams,
    iter: usize,
    progress: &P,
) -> (usize, bool) {
    let n_points = current.n_points();
    let new_locked = LockedNeighborHeap::new(n_points, params.max_candidates);
    let old_locked = LockedNeighborHeap::new(n_points, params.max_candidates);

    let current_ref = &*current;
    let (_, interrupted) = batched_for(
        n_points,
        params.block_size,
        params.grain_size,
        progress,
        &|range| {
            let mut sampler = CandidateSampler::new(
                params.priority,
                stream_rng(params.seed, chunk_stream(iter, range.start)),
            );
            build_candidates_range(current_ref, range, &mut sampler, &new_locked, &old_locked);
            0
        },
    );
    let mut new_cands = new_locked.into_unlocked();
    let mut old_cands = old_locked.into_unlocked();
    if interrupted {
        return (0, true);
    }

    current
        .rows_mut()
        .par_iter_mut()
        .zip(new_cands.rows().par_iter())
        .for_each(|(row, new_row)| row.clear_retained_flags(new_row));

    if params.priority.should_sort() {
        new_cands.rows_mut().par_iter_mut().for_each(|r| r.deheap_sort());
        old_cands.rows_mut().par_iter_mut().for_each(|r| r.deheap_sort());
    }

    let locked = std::mem::replace(current, NeighborHeap::new(0, 0)).into_locked();
    let (c, interrupted) = batched_for(
        n_points,
        params.block_size,
        params.grain_size,
        progress,
        &|range| {
            let mut updater = GraphUpdater::new(distance);
            let mut c = 0;
            for i in range {
                c += local_join_point(&new_cands, &old_cands, i, |p, q| {
                    updater.generate_and_apply_locked(&locked, p, q)
                });
            }
            c
        },
    );
    *current = locked.into_unlocked();
    (c, interrupted)
}

/// Evaluate the local-join pairs of point `i`'s candidate sets.
///
/// `apply` is called for every new-new pair (upper triangle, diagonal
/// included) and every new-old pair, and returns the accept count.
fn local_join_point<F>(new_cands: &NeighborHeap, old_cands: &NeighborHeap, i: usize, mut apply: F) -> usize
where
    F: FnMut(usize, usize) -> usize,
{
    let max_candidates = new_cands.n_nbrs();
    let mut c = 0;
    for j in 0..max_candidates {
        let p = new_cands.index(i, j);
        if p == NPOS {
            continue;
        }
        for k in j..max_candidates {
            let q = new_cands.index(i, k);
            if q == NPOS {
                continue;
            }
            c += apply(p, q);
        }
        for k in 0..max_candidates {
            let q = old_cands.index(i, k);
            if q == NPOS {
                continue;
            }
            c += apply(p, q);
        }
    }
    c
}
