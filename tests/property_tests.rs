//! Property-based tests for the descent core.
//!
//! These verify invariants that should hold regardless of input:
//! - Neighbor heaps keep the heap property, reject duplicates and self-loops
//! - Deheap-sorting produces ascending rows and round-trips sorted graphs
//! - Graph merges are identity against empty and idempotent against self
//! - Edit passes never grow rows
//! - Built graphs are valid k-NN graphs

use descent::nnd::{build, BuildParams};
use descent::prune::{degree_prune, diversify, merge_graphs};
use descent::{Metric, NNGraph, NeighborHeap, PairDistance, SparseGraph, NPOS};
use proptest::prelude::*;
use smallvec::SmallVec;

fn assert_row_invariants(heap: &NeighborHeap, i: usize) {
    let row = heap.row(i);
    // Heap property.
    for child in 1..row.len() {
        let parent = (child - 1) / 2;
        assert!(row.distance(parent) >= row.distance(child));
    }
    // No self-loops, no duplicates among filled slots.
    let mut seen = Vec::new();
    for slot in 0..row.len() {
        let j = row.index(slot);
        if j == NPOS {
            continue;
        }
        assert_ne!(j, i);
        assert!(!seen.contains(&j));
        seen.push(j);
    }
}

prop_compose! {
    fn arb_pushes(n_points: usize)(
        pushes in prop::collection::vec(
            (0..n_points, 0..n_points, 0.0f32..100.0),
            0..200,
        )
    ) -> Vec<(usize, usize, f32)> {
        pushes
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn heap_invariants_survive_arbitrary_pushes(
        pushes in arb_pushes(12),
        n_nbrs in 1usize..6,
    ) {
        let mut heap = NeighborHeap::new(12, n_nbrs);
        for &(i, j, d) in &pushes {
            heap.checked_push_pair(i, d, j, 1);
        }
        for i in 0..12 {
            assert_row_invariants(&heap, i);
        }
    }

    #[test]
    fn pushes_are_idempotent(
        pushes in arb_pushes(8),
        n_nbrs in 1usize..5,
    ) {
        let mut once = NeighborHeap::new(8, n_nbrs);
        for &(i, j, d) in &pushes {
            once.checked_push_pair(i, d, j, 1);
        }
        let mut twice = NeighborHeap::new(8, n_nbrs);
        for &(i, j, d) in &pushes {
            twice.checked_push_pair(i, d, j, 1);
            let repeat = twice.checked_push_pair(i, d, j, 1);
            prop_assert_eq!(repeat, 0, "immediate repeat must be a no-op");
        }
        once.deheap_sort();
        twice.deheap_sort();
        for i in 0..8 {
            for slot in 0..n_nbrs {
                prop_assert_eq!(once.index(i, slot), twice.index(i, slot));
                prop_assert_eq!(once.distance(i, slot), twice.distance(i, slot));
            }
        }
    }

    #[test]
    fn deheap_sort_orders_every_row(
        pushes in arb_pushes(10),
        n_nbrs in 1usize..6,
    ) {
        let mut heap = NeighborHeap::new(10, n_nbrs);
        for &(i, j, d) in &pushes {
            heap.checked_push_pair(i, d, j, 1);
        }
        heap.deheap_sort();
        for i in 0..10 {
            for slot in 1..n_nbrs {
                assert!(heap.distance(i, slot - 1) <= heap.distance(i, slot));
            }
        }
    }
}

// Sorted k-NN graphs over n points with distinct finite distances per row.
fn arb_sorted_graph(n_points: usize, n_nbrs: usize) -> impl Strategy<Value = NNGraph> {
    prop::collection::vec(
        (prop::collection::vec(0.5f32..50.0, n_nbrs), 0..1000u32),
        n_points,
    )
    .prop_map(move |rows| {
        let mut idx = Vec::with_capacity(n_points * n_nbrs);
        let mut dist = Vec::with_capacity(n_points * n_nbrs);
        for (i, (mut gaps, pick)) in rows.into_iter().enumerate() {
            // Strictly increasing distances from cumulative positive gaps.
            let mut acc = 0.0;
            for g in &mut gaps {
                acc += *g;
                *g = acc;
            }
            // Distinct neighbor indices, none equal to the owner.
            let mut js: Vec<usize> = (0..n_points).filter(|&j| j != i).collect();
            let rot = pick as usize % js.len();
            js.rotate_left(rot);
            for (slot, g) in gaps.iter().enumerate() {
                idx.push(js[slot]);
                dist.push(*g);
            }
        }
        NNGraph::from_parts(idx, dist, n_points, n_nbrs).unwrap()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn loading_a_sorted_graph_round_trips(graph in arb_sorted_graph(8, 3)) {
        let mut heap = NeighborHeap::new(8, 3);
        descent::graph::graph_to_heap_query(&mut heap, &graph);
        heap.deheap_sort();
        let out = descent::graph::heap_to_graph(&heap);
        prop_assert_eq!(out, graph);
    }

    #[test]
    fn merge_identities_hold(graph in arb_sorted_graph(6, 3)) {
        let g = SparseGraph::from_dense(&graph);
        let empty_rows = (0..6)
            .map(|_| (SmallVec::new(), SmallVec::new()))
            .collect();
        let empty = SparseGraph::from_rows(empty_rows);
        prop_assert_eq!(merge_graphs(&g, &empty).unwrap(), g.clone());
        prop_assert_eq!(merge_graphs(&g, &g).unwrap(), g);
    }

    #[test]
    fn edit_passes_never_grow_rows(
        graph in arb_sorted_graph(6, 4),
        data in prop::collection::vec(-10.0f32..10.0, 6),
        prune_probability in 0.0f32..=1.0,
        max_degree in 0usize..5,
    ) {
        let distance = PairDistance::self_join(&data, 1, Metric::Euclidean).unwrap();
        let pruned = diversify(&distance, &graph, prune_probability, 7).unwrap();
        for i in 0..6 {
            prop_assert!(pruned.degree(i) <= 4);
            prop_assert!(pruned.degree(i) >= 1, "first neighbor is always kept");
            // Kept distances are a subsequence of the input row.
            for d in pruned.row_distances(i) {
                prop_assert!(graph.row_distances(i).contains(d));
            }
        }
        let sparse = SparseGraph::from_dense(&graph);
        let truncated = degree_prune(&sparse, max_degree);
        for i in 0..6 {
            prop_assert!(truncated.degree(i) <= max_degree);
        }
    }

    #[test]
    fn built_graphs_are_valid(
        data in prop::collection::vec(-100.0f32..100.0, 10),
        seed in 0u64..1000,
    ) {
        let init = exact_shifted_init(&data, 3);
        let params = BuildParams {
            max_candidates: 4,
            delta: 0.0,
            seed,
            ..BuildParams::default()
        };
        let graph = build(&data, 1, Metric::Euclidean, &init, &params).unwrap();
        for i in 0..10 {
            let d = graph.row_distances(i);
            let js = graph.row_indices(i);
            for slot in 0..3 {
                prop_assert_ne!(js[slot], i, "self-loop in output");
                prop_assert!(d[slot].is_finite(), "underfilled output row");
                if slot > 0 {
                    prop_assert!(d[slot - 1] <= d[slot], "row not sorted");
                }
            }
            let mut dedup = js.to_vec();
            dedup.sort_unstable();
            dedup.dedup();
            prop_assert_eq!(dedup.len(), 3, "duplicate neighbor in output");
        }
    }
}

/// A valid (shifted-ring) init graph with true distances.
fn exact_shifted_init(data: &[f32], k: usize) -> NNGraph {
    let n = data.len();
    let mut idx = Vec::with_capacity(n * k);
    let mut dist = Vec::with_capacity(n * k);
    for i in 0..n {
        for slot in 0..k {
            let j = (i + slot + 1) % n;
            idx.push(j);
            dist.push((data[i] - data[j]).abs());
        }
    }
    NNGraph::from_parts(idx, dist, n, k).unwrap()
}
