//! descent: approximate k-NN graph construction by Nearest Neighbor Descent.
//!
//! Given N vectors in a metric space and any initial k-NN graph (typically
//! random), the engine iteratively refines each point's K best neighbors by
//! exploiting "friends of friends are likely friends": per iteration it
//! samples candidate neighbors, evaluates candidate pairs against each other
//! (the local join) and keeps whatever improves the per-point neighbor
//! heaps, until an iteration changes less than a `delta` fraction of edges.
//!
//! - **Build** ([`nnd::build()`]): self-join refinement of one dataset.
//! - **Query** ([`nnd::query()`]): refine a query k-NN against a fixed
//!   reference set by neighbor-of-neighbor traversal.
//! - **Edit passes** ([`prune`]): long-edge removal (diversify), degree
//!   pruning and sparse-graph merging for post-processing a built graph.
//!
//! Parallel runs fan the join phases out to rayon workers over per-row
//! locked heaps; cancellation is cooperative through the [`Progress`] trait.
//!
//! # Quick Start
//!
//! ```
//! use descent::nnd::{build, BuildParams};
//! use descent::{Metric, NNGraph, PriorityKind};
//!
//! let data: Vec<f32> = (0..64).map(|i| i as f32).collect();
//! // Start from a shifted ring instead of the true neighbors.
//! let idx: Vec<usize> = (0..64).flat_map(|i| [(i + 7) % 64, (i + 23) % 64]).collect();
//! let dist: Vec<f32> = idx
//!     .chunks(2)
//!     .enumerate()
//!     .flat_map(|(i, js)| js.iter().map(move |&j| (i as f32 - j as f32).abs()).collect::<Vec<_>>())
//!     .collect();
//! let init = NNGraph::from_parts(idx, dist, 64, 2).unwrap();
//!
//! let params = BuildParams {
//!     priority: PriorityKind::RankedByDistance,
//!     delta: 0.0,
//!     n_iters: 20,
//!     ..BuildParams::default()
//! };
//! let graph = build(&data, 1, Metric::Euclidean, &init, &params).unwrap();
//! // Rows come back sorted and never worse than the init they started from.
//! for i in 0..64 {
//!     let d = graph.row_distances(i);
//!     assert!(d[0] <= d[1]);
//!     assert!(d[1] <= init.row_distances(i).iter().cloned().fold(0.0, f32::max));
//! }
//! ```

pub mod candidates;
pub mod distance;
pub mod error;
pub mod graph;
pub mod heap;
pub mod host;
pub mod nnd;
pub mod parallel;
pub mod prune;
pub mod rng;
pub mod sparse;
pub mod update;

pub use candidates::PriorityKind;
pub use distance::{Metric, PairDistance};
pub use error::{DescentError, Result};
pub use graph::NNGraph;
pub use heap::{NeighborHeap, NPOS};
pub use nnd::{merge_nn, BuildParams};
pub use parallel::{CancelToken, ConsoleProgress, NullProgress, Progress};
pub use sparse::SparseGraph;
