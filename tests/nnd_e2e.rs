//! End-to-end scenarios for the descent engine.

use descent::nnd::{build, build_with_progress, query, BuildParams};
use descent::{Metric, NNGraph, PriorityKind, Progress};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

fn ranked(delta: f64) -> BuildParams {
    BuildParams {
        priority: PriorityKind::RankedByDistance,
        delta,
        ..BuildParams::default()
    }
}

/// Worst-plausible init: the first half of the points neighbor the tail of
/// the dataset, the second half the head. Distances are real.
fn far_init(data: &[f32], dim: usize, k: usize, metric: Metric) -> NNGraph {
    let n = data.len() / dim;
    assert!(n >= 2 * k, "init pattern needs n >= 2k");
    let mut idx = Vec::with_capacity(n * k);
    let mut dist = Vec::with_capacity(n * k);
    for i in 0..n {
        for slot in 0..k {
            let j = if i < n / 2 { n - 1 - slot } else { slot };
            idx.push(j);
            dist.push(metric.distance(
                &data[i * dim..(i + 1) * dim],
                &data[j * dim..(j + 1) * dim],
            ));
        }
    }
    NNGraph::from_parts(idx, dist, n, k).unwrap()
}

// =============================================================================
// Build scenarios
// =============================================================================

#[test]
fn trivial_identity_build() {
    // 3 unit-spaced collinear points, K=2, through the 1-indexed boundary.
    let data = [0.0_f32, 1.0, 2.0];
    let nn_idx = [3u32, 2, 3, 1, 1, 2];
    let nn_dist = [2.0f32, 1.0, 1.0, 1.0, 2.0, 1.0];
    let params = BuildParams {
        delta: 0.0,
        ..BuildParams::default()
    };
    let (idx, dist) =
        descent::host::build(&data, 1, "euclidean", &nn_idx, &nn_dist, 3, 2, &params).unwrap();
    assert_eq!(&idx[0..2], &[2, 3]);
    assert_eq!(&dist[0..2], &[1.0, 2.0]);
    // Point 2 ties at distance 1 to both ends; indices are a set.
    let mut mid: Vec<u32> = idx[2..4].to_vec();
    mid.sort_unstable();
    assert_eq!(mid, vec![1, 3]);
    assert_eq!(&dist[2..4], &[1.0, 1.0]);
    assert_eq!(&idx[4..6], &[2, 1]);
    assert_eq!(&dist[4..6], &[1.0, 2.0]);
}

#[test]
fn hamming_build_counts_bits() {
    let data = [
        0.0_f32, 0.0, 0.0, 0.0, // v0
        0.0, 0.0, 0.0, 1.0, // v1: 1 bit from v0
        1.0, 1.0, 0.0, 0.0, // v2: 2 bits from v0
        1.0, 1.0, 1.0, 1.0, // v3
    ];
    let init = far_init(&data, 4, 2, Metric::Hamming);
    let graph = build(&data, 4, Metric::Hamming, &init, &ranked(0.0)).unwrap();
    assert_eq!(graph.row_indices(0), &[1, 2]);
    assert_eq!(graph.row_distances(0), &[1.0, 2.0]);
    assert_eq!(graph.row_indices(1), &[0, 3]);
    assert_eq!(graph.row_distances(1), &[1.0, 2.0]);
    assert_eq!(graph.row_distances(2), &[2.0, 2.0]);
    assert_eq!(graph.row_distances(3), &[2.0, 2.0]);
}

#[test]
fn random_priority_build_reaches_the_same_answer() {
    // On a tiny instance every candidate fits, so the sampling policy cannot
    // change the fixed point.
    let data = [0.0_f32, 1.0, 2.0, 3.0];
    let init = far_init(&data, 1, 2, Metric::Euclidean);
    let mut params = ranked(0.0);
    params.priority = PriorityKind::RandomSample;
    let random = build(&data, 1, Metric::Euclidean, &init, &params).unwrap();
    let ranked_out = build(&data, 1, Metric::Euclidean, &init, &ranked(0.0)).unwrap();
    for i in 0..4 {
        assert_eq!(random.row_distances(i), ranked_out.row_distances(i));
    }
}

#[test]
fn build_is_reproducible_for_a_fixed_seed() {
    let data: Vec<f32> = (0..24).map(|i| ((i * 13) % 24) as f32).collect();
    let init = far_init(&data, 1, 3, Metric::Euclidean);
    let mut params = ranked(0.0);
    params.priority = PriorityKind::RandomSample;
    params.max_candidates = 3;
    let a = build(&data, 1, Metric::Euclidean, &init, &params).unwrap();
    let b = build(&data, 1, Metric::Euclidean, &init, &params).unwrap();
    assert_eq!(a, b);
}

// =============================================================================
// Convergence
// =============================================================================

struct IterLog {
    updates: Mutex<Vec<usize>>,
}

impl IterLog {
    fn new() -> Self {
        IterLog {
            updates: Mutex::new(Vec::new()),
        }
    }
}

impl Progress for IterLog {
    fn iter_finished(&self, _iter: usize, n_updates: usize) {
        self.updates.lock().unwrap().push(n_updates);
    }
}

#[test]
fn delta_one_stops_after_one_iteration() {
    let data: Vec<f32> = (0..4).map(|i| i as f32).collect();
    let init = far_init(&data, 1, 2, Metric::Euclidean);
    let log = IterLog::new();
    let params = ranked(1.0);
    build_with_progress(&data, 1, Metric::Euclidean, &init, &params, &log).unwrap();
    assert_eq!(log.updates.lock().unwrap().len(), 1);
}

#[test]
fn delta_zero_runs_until_no_update_is_accepted() {
    let data: Vec<f32> = (0..8).map(|i| i as f32).collect();
    let init = far_init(&data, 1, 2, Metric::Euclidean);
    let log = IterLog::new();
    let mut params = ranked(0.0);
    params.n_iters = 50;
    build_with_progress(&data, 1, Metric::Euclidean, &init, &params, &log).unwrap();
    let updates = log.updates.lock().unwrap();
    assert_eq!(*updates.last().unwrap(), 0, "final iteration accepts nothing");
    assert!(updates[..updates.len() - 1].iter().all(|&c| c > 0));
}

#[test]
fn quality_is_monotone_across_iterations() {
    let data: Vec<f32> = (0..12).map(|i| ((i * 7) % 12) as f32).collect();
    let init = far_init(&data, 1, 2, Metric::Euclidean);
    let mut prev = f32::INFINITY;
    for n_iters in 1..=5 {
        let mut params = ranked(0.0);
        params.n_iters = n_iters;
        let graph = build(&data, 1, Metric::Euclidean, &init, &params).unwrap();
        let sum: f32 = (0..12).map(|i| graph.row_distances(i).iter().sum::<f32>()).sum();
        assert!(sum <= prev, "iteration {} worsened: {} > {}", n_iters, sum, prev);
        prev = sum;
    }
}

// =============================================================================
// Cancellation
// =============================================================================

struct CancelAfterIters {
    seen: AtomicUsize,
    limit: usize,
}

impl Progress for CancelAfterIters {
    fn iter_finished(&self, _iter: usize, _n_updates: usize) {
        self.seen.fetch_add(1, Ordering::Relaxed);
    }
    fn interrupted(&self) -> bool {
        self.seen.load(Ordering::Relaxed) >= self.limit
    }
}

#[test]
fn cancellation_returns_the_iteration_snapshot() {
    let data: Vec<f32> = (0..32).map(|i| ((i * 19) % 32) as f32).collect();
    let init = far_init(&data, 1, 3, Metric::Euclidean);
    let mut snapshot_params = ranked(0.0);
    snapshot_params.priority = PriorityKind::RandomSample;
    snapshot_params.n_iters = 3;
    let snapshot =
        build(&data, 1, Metric::Euclidean, &init, &snapshot_params).unwrap();

    let mut cancelled_params = snapshot_params.clone();
    cancelled_params.n_iters = 1000;
    let cancel = CancelAfterIters {
        seen: AtomicUsize::new(0),
        limit: 3,
    };
    let cancelled = build_with_progress(
        &data,
        1,
        Metric::Euclidean,
        &init,
        &cancelled_params,
        &cancel,
    )
    .unwrap();
    assert_eq!(cancelled, snapshot);
    // Still a valid sorted graph.
    for i in 0..32 {
        let d = cancelled.row_distances(i);
        assert!(d.windows(2).all(|w| w[0] <= w[1]));
    }
}

// =============================================================================
// Query scenarios
// =============================================================================

#[test]
fn query_against_self_matches_build_result() {
    // 4 collinear unit-spaced points, reference = query.
    let line: Vec<f32> = (0..4).map(|i| i as f32).collect();
    // Reference's own exact knn, K=2.
    let reference_idx: Vec<usize> = vec![1, 2, 0, 2, 1, 3, 2, 1];
    let init = far_init(&line, 1, 2, Metric::Euclidean);
    let out = query(
        &line,
        &line,
        1,
        Metric::Euclidean,
        &reference_idx,
        &init,
        &ranked(0.0),
    )
    .unwrap();
    assert_eq!(out.row_indices(0), &[1, 2]);
    assert_eq!(out.row_distances(0), &[1.0, 2.0]);
    assert_eq!(out.row_distances(1), &[1.0, 1.0]);
    assert_eq!(out.row_distances(2), &[1.0, 1.0]);
    assert_eq!(out.row_indices(3), &[2, 1]);
    assert_eq!(out.row_distances(3), &[1.0, 2.0]);
}

#[test]
fn query_finds_nearest_references_for_fresh_points() {
    let reference: Vec<f32> = (0..8).map(|i| i as f32).collect();
    let queries = [0.4_f32, 6.6];
    // Exact reference knn, K=2.
    let mut reference_idx = Vec::new();
    for i in 0..8usize {
        let (a, b) = match i {
            0 => (1, 2),
            7 => (6, 5),
            _ => (i - 1, i + 1),
        };
        reference_idx.extend([a, b]);
    }
    // Deliberately bad init: both queries start at the wrong end.
    let init = NNGraph::from_parts(
        vec![7, 6, 0, 1],
        vec![6.6, 5.6, 6.6, 5.6],
        2,
        2,
    )
    .unwrap();
    let out = query(
        &reference,
        &queries,
        1,
        Metric::Euclidean,
        &reference_idx,
        &init,
        &ranked(0.0),
    )
    .unwrap();
    assert_eq!(out.row_indices(0), &[0, 1]);
    assert!((out.row_distances(0)[0] - 0.4).abs() < 1e-6);
    assert_eq!(out.row_indices(1), &[7, 6]);
    assert!((out.row_distances(1)[0] - 0.4).abs() < 1e-6);
}
