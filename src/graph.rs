//! Dense k-NN graphs and heap conversions.
//!
//! [`NNGraph`] is the exported adjacency form: row-major `idx` / `dist`
//! matrices with each row sorted ascending by distance and [`NPOS`] marking
//! unused slots. The build and query loops bracket their work with
//! [`graph_to_heap_symmetric`] / [`graph_to_heap_query`] on the way in and
//! [`heap_to_graph`] on the way out.
//!
//! The crate is 0-indexed internally; [`NNGraph::from_host`] /
//! [`NNGraph::to_host`] translate the 1-indexed flat matrices the host
//! exchanges, with 0 standing for an empty slot on the host side.

use crate::error::{DescentError, Result};
use crate::heap::{NeighborHeap, NPOS};

/// Dense k-NN adjacency, sorted ascending by distance per row.
#[derive(Debug, Clone, PartialEq)]
pub struct NNGraph {
    n_points: usize,
    n_nbrs: usize,
    idx: Vec<usize>,
    dist: Vec<f32>,
}

impl NNGraph {
    /// An all-empty graph (every slot `(NPOS, +INF)`).
    #[must_use]
    pub fn empty(n_points: usize, n_nbrs: usize) -> Self {
        NNGraph {
            n_points,
            n_nbrs,
            idx: vec![NPOS; n_points * n_nbrs],
            dist: vec![f32::INFINITY; n_points * n_nbrs],
        }
    }

    /// Assemble from row-major parts.
    pub fn from_parts(idx: Vec<usize>, dist: Vec<f32>, n_points: usize, n_nbrs: usize) -> Result<Self> {
        if idx.len() != n_points * n_nbrs || dist.len() != n_points * n_nbrs {
            return Err(DescentError::GraphShapeMismatch {
                context: format!(
                    "expected {} entries for {} x {}, got idx {} / dist {}",
                    n_points * n_nbrs,
                    n_points,
                    n_nbrs,
                    idx.len(),
                    dist.len()
                ),
            });
        }
        Ok(NNGraph {
            n_points,
            n_nbrs,
            idx,
            dist,
        })
    }

    #[inline]
    #[must_use]
    pub fn n_points(&self) -> usize {
        self.n_points
    }

    #[inline]
    #[must_use]
    pub fn n_nbrs(&self) -> usize {
        self.n_nbrs
    }

    #[inline]
    #[must_use]
    pub fn index(&self, i: usize, slot: usize) -> usize {
        self.idx[i * self.n_nbrs + slot]
    }

    #[inline]
    #[must_use]
    pub fn distance(&self, i: usize, slot: usize) -> f32 {
        self.dist[i * self.n_nbrs + slot]
    }

    /// Neighbor indices of row `i` (including any `NPOS` tail).
    #[inline]
    #[must_use]
    pub fn row_indices(&self, i: usize) -> &[usize] {
        &self.idx[i * self.n_nbrs..(i + 1) * self.n_nbrs]
    }

    /// Neighbor distances of row `i`.
    #[inline]
    #[must_use]
    pub fn row_distances(&self, i: usize) -> &[f32] {
        &self.dist[i * self.n_nbrs..(i + 1) * self.n_nbrs]
    }

    /// Flat neighbor index matrix, row-major.
    #[inline]
    #[must_use]
    pub fn indices(&self) -> &[usize] {
        &self.idx
    }

    /// Validate as an initialization graph over `n_targets` target points:
    /// every non-sentinel index in range, every occupied distance finite.
    pub fn validate(&self, n_targets: usize) -> Result<()> {
        for i in 0..self.n_points {
            for slot in 0..self.n_nbrs {
                let j = self.index(i, slot);
                if j == NPOS {
                    continue;
                }
                if j >= n_targets {
                    return Err(DescentError::IndexOutOfRange {
                        index: j,
                        row: i,
                        n_points: n_targets,
                    });
                }
                if !self.distance(i, slot).is_finite() {
                    return Err(DescentError::NonFiniteDistance { row: i, slot });
                }
            }
        }
        Ok(())
    }

    /// Convert a 1-indexed host graph (0 = empty slot) to the internal form.
    pub fn from_host(idx: &[u32], dist: &[f32], n_points: usize, n_nbrs: usize) -> Result<Self> {
        if idx.len() != n_points * n_nbrs || dist.len() != n_points * n_nbrs {
            return Err(DescentError::GraphShapeMismatch {
                context: format!(
                    "host matrices must be {} x {} row-major",
                    n_points, n_nbrs
                ),
            });
        }
        let mut out_idx = Vec::with_capacity(idx.len());
        let mut out_dist = Vec::with_capacity(dist.len());
        for (&j, &d) in idx.iter().zip(dist.iter()) {
            if j == 0 {
                out_idx.push(NPOS);
                out_dist.push(f32::INFINITY);
            } else {
                out_idx.push(j as usize - 1);
                out_dist.push(d);
            }
        }
        NNGraph::from_parts(out_idx, out_dist, n_points, n_nbrs)
    }

    /// Render 1-indexed host matrices; `NPOS` becomes 0.
    #[must_use]
    pub fn to_host(&self) -> (Vec<u32>, Vec<f32>) {
        let idx = self
            .idx
            .iter()
            .map(|&j| if j == NPOS { 0 } else { j as u32 + 1 })
            .collect();
        (idx, self.dist.clone())
    }
}

/// Load an initial graph into a heap with symmetric pushes, flag=1.
///
/// Used by the self-join build, where every edge also seeds its reverse.
pub fn graph_to_heap_symmetric(heap: &mut NeighborHeap, graph: &NNGraph) {
    for i in 0..graph.n_points() {
        for slot in 0..graph.n_nbrs() {
            let j = graph.index(i, slot);
            if j == NPOS {
                continue;
            }
            heap.checked_push_pair(i, graph.distance(i, slot), j, 1);
        }
    }
}

/// Load an initial graph into a heap with asymmetric pushes, flag=1.
///
/// Used by the query loop, where the reference graph is read-only and must
/// not receive reverse edges.
pub fn graph_to_heap_query(heap: &mut NeighborHeap, graph: &NNGraph) {
    for i in 0..graph.n_points() {
        for slot in 0..graph.n_nbrs() {
            let j = graph.index(i, slot);
            if j == NPOS {
                continue;
            }
            heap.checked_push(i, graph.distance(i, slot), j, 1);
        }
    }
}

/// Export a deheap-sorted heap as a dense graph.
#[must_use]
pub fn heap_to_graph(heap: &NeighborHeap) -> NNGraph {
    let n_points = heap.n_points();
    let n_nbrs = heap.n_nbrs();
    let mut idx = Vec::with_capacity(n_points * n_nbrs);
    let mut dist = Vec::with_capacity(n_points * n_nbrs);
    for i in 0..n_points {
        for slot in 0..n_nbrs {
            idx.push(heap.index(i, slot));
            dist.push(heap.distance(i, slot));
        }
    }
    NNGraph {
        n_points,
        n_nbrs,
        idx,
        dist,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted_triangle() -> NNGraph {
        // 3 collinear points at 0, 1, 2.
        NNGraph::from_parts(
            vec![1, 2, 0, 2, 1, 0],
            vec![1.0, 2.0, 1.0, 1.0, 1.0, 2.0],
            3,
            2,
        )
        .unwrap()
    }

    #[test]
    fn load_then_sort_round_trips() {
        let graph = sorted_triangle();
        let mut heap = NeighborHeap::new(3, 2);
        graph_to_heap_symmetric(&mut heap, &graph);
        heap.deheap_sort();
        let out = heap_to_graph(&heap);
        for i in 0..3 {
            assert_eq!(out.row_distances(i), graph.row_distances(i));
            let mut got: Vec<_> = out.row_indices(i).to_vec();
            let mut want: Vec<_> = graph.row_indices(i).to_vec();
            got.sort_unstable();
            want.sort_unstable();
            assert_eq!(got, want);
        }
    }

    #[test]
    fn validate_flags_bad_indices_and_distances() {
        let g = NNGraph::from_parts(vec![1, 5], vec![1.0, 1.0], 1, 2).unwrap();
        assert!(matches!(
            g.validate(3),
            Err(DescentError::IndexOutOfRange { index: 5, .. })
        ));
        let g = NNGraph::from_parts(vec![1, 2], vec![1.0, f32::NAN], 1, 2).unwrap();
        assert!(matches!(
            g.validate(3),
            Err(DescentError::NonFiniteDistance { row: 0, slot: 1 })
        ));
    }

    #[test]
    fn host_round_trip_is_identity_modulo_sentinels() {
        let host_idx = vec![2u32, 3, 1, 0];
        let host_dist = vec![1.0f32, 2.0, 1.0, 0.0];
        let g = NNGraph::from_host(&host_idx, &host_dist, 2, 2).unwrap();
        assert_eq!(g.index(0, 0), 1);
        assert_eq!(g.index(1, 1), NPOS);
        let (idx, dist) = g.to_host();
        assert_eq!(idx, host_idx);
        assert_eq!(dist[0], 1.0);
        assert!(dist[3].is_infinite());
    }

    #[test]
    fn query_load_adds_no_reverse_edges() {
        let g = NNGraph::from_parts(vec![1, 2], vec![1.0, 2.0], 1, 2).unwrap();
        let mut heap = NeighborHeap::new(3, 2);
        graph_to_heap_query(&mut heap, &g);
        assert!(heap.contains(0, 1));
        assert!(!heap.contains(1, 0));
    }
}
