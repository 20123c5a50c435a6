//! CSR sparse graphs for the edit passes.
//!
//! The diversify / prune / merge passes work on a compressed sparse row
//! layout because, unlike the fixed-width [`NNGraph`](crate::graph::NNGraph),
//! their rows shrink and grow per point.

use crate::error::{DescentError, Result};
use crate::graph::NNGraph;
use crate::heap::NPOS;
use smallvec::SmallVec;

/// One assembled row: parallel neighbor indices and distances.
pub type SparseRow = (SmallVec<[usize; 16]>, SmallVec<[f32; 16]>);

/// CSR adjacency: `row_ptr[i]..row_ptr[i + 1]` brackets row `i` inside the
/// parallel `col` / `dist` arrays.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseGraph {
    row_ptr: Vec<usize>,
    col: Vec<usize>,
    dist: Vec<f32>,
}

impl SparseGraph {
    /// Assemble from per-row index/distance pairs.
    #[must_use]
    pub fn from_rows(rows: Vec<SparseRow>) -> Self {
        let mut row_ptr = Vec::with_capacity(rows.len() + 1);
        row_ptr.push(0);
        let n_edges: usize = rows.iter().map(|(cols, _)| cols.len()).sum();
        let mut col = Vec::with_capacity(n_edges);
        let mut dist = Vec::with_capacity(n_edges);
        for (cols, dists) in rows {
            debug_assert_eq!(cols.len(), dists.len());
            col.extend(cols);
            dist.extend(dists);
            row_ptr.push(col.len());
        }
        SparseGraph { row_ptr, col, dist }
    }

    /// Densify a k-NN graph, dropping sentinel slots.
    #[must_use]
    pub fn from_dense(graph: &NNGraph) -> Self {
        let rows = (0..graph.n_points())
            .map(|i| {
                let mut cols = SmallVec::new();
                let mut dists = SmallVec::new();
                for slot in 0..graph.n_nbrs() {
                    let j = graph.index(i, slot);
                    if j == NPOS {
                        continue;
                    }
                    cols.push(j);
                    dists.push(graph.distance(i, slot));
                }
                (cols, dists)
            })
            .collect();
        SparseGraph::from_rows(rows)
    }

    #[inline]
    #[must_use]
    pub fn n_points(&self) -> usize {
        self.row_ptr.len() - 1
    }

    #[inline]
    #[must_use]
    pub fn n_edges(&self) -> usize {
        self.col.len()
    }

    #[inline]
    #[must_use]
    pub fn degree(&self, i: usize) -> usize {
        self.row_ptr[i + 1] - self.row_ptr[i]
    }

    /// Neighbor indices of row `i`.
    #[inline]
    #[must_use]
    pub fn row_indices(&self, i: usize) -> &[usize] {
        &self.col[self.row_ptr[i]..self.row_ptr[i + 1]]
    }

    /// Neighbor distances of row `i`.
    #[inline]
    #[must_use]
    pub fn row_distances(&self, i: usize) -> &[f32] {
        &self.dist[self.row_ptr[i]..self.row_ptr[i + 1]]
    }

    /// Copy out row `i` sorted ascending by distance.
    #[must_use]
    pub fn sorted_row(&self, i: usize) -> SparseRow {
        let mut entries: SmallVec<[(usize, f32); 16]> = self
            .row_indices(i)
            .iter()
            .copied()
            .zip(self.row_distances(i).iter().copied())
            .collect();
        entries.sort_unstable_by(|a, b| a.1.total_cmp(&b.1));
        let mut cols = SmallVec::with_capacity(entries.len());
        let mut dists = SmallVec::with_capacity(entries.len());
        for (j, d) in entries {
            cols.push(j);
            dists.push(d);
        }
        (cols, dists)
    }

    /// Render 1-indexed host parts `(row_ptr, col, dist)`.
    #[must_use]
    pub fn to_host(&self) -> (Vec<usize>, Vec<u32>, Vec<f32>) {
        let col = self.col.iter().map(|&j| j as u32 + 1).collect();
        (self.row_ptr.clone(), col, self.dist.clone())
    }

    /// Validate that all column indices address `n_points` points.
    pub fn validate(&self, n_points: usize) -> Result<()> {
        for i in 0..self.n_points() {
            for &j in self.row_indices(i) {
                if j >= n_points {
                    return Err(DescentError::IndexOutOfRange {
                        index: j,
                        row: i,
                        n_points,
                    });
                }
            }
        }
        Ok(())
    }
}
