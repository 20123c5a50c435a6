//! Candidate sampling for the descent loops.
//!
//! Each outer iteration splits the current graph into "new" and "old"
//! candidate heaps per point, at most `max_candidates` wide, using a pluggable
//! sampling priority. Pushing candidates with [`checked_push_pair`] fuses the
//! forward and reverse candidate lists in one pass: if `j` is a new candidate
//! of `i`, then `i` is a reverse new candidate of `j`.
//!
//! [`checked_push_pair`]: crate::heap::NeighborHeap::checked_push_pair

use crate::error::DescentError;
use crate::heap::{HeapRow, LockedNeighborHeap, NeighborHeap, NPOS};
use rand::rngs::SmallRng;
use rand::Rng;
use std::ops::Range;
use std::str::FromStr;

/// Sampling priority for candidate selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityKind {
    /// Priority is the current edge distance; candidate heaps end up holding
    /// the closest edges and are sorted before the join.
    RankedByDistance,
    /// Priority is a uniform draw in [0, 1); candidate heaps become a
    /// reservoir-like random sample of width `max_candidates`.
    RandomSample,
}

impl PriorityKind {
    /// Whether candidate heaps should be deheap-sorted before the join.
    #[inline]
    #[must_use]
    pub fn should_sort(self) -> bool {
        matches!(self, PriorityKind::RankedByDistance)
    }
}

impl FromStr for PriorityKind {
    type Err = DescentError;

    fn from_str(s: &str) -> Result<Self, DescentError> {
        match s {
            "ranked" => Ok(PriorityKind::RankedByDistance),
            "random" => Ok(PriorityKind::RandomSample),
            other => Err(DescentError::InvalidParameter(format!(
                "unknown candidate priority: {}",
                other
            ))),
        }
    }
}

/// A priority policy bound to its generator.
pub struct CandidateSampler {
    kind: PriorityKind,
    rng: SmallRng,
}

impl CandidateSampler {
    #[must_use]
    pub fn new(kind: PriorityKind, rng: SmallRng) -> Self {
        CandidateSampler { kind, rng }
    }

    /// Priority of an existing edge with distance `d`.
    #[inline]
    pub fn edge_priority(&mut self, d: f32) -> f32 {
        match self.kind {
            PriorityKind::RankedByDistance => d,
            PriorityKind::RandomSample => self.rng.gen::<f32>(),
        }
    }

    /// Priority of the entry at `rank` in an already distance-sorted list.
    ///
    /// Used where no distance is available (the general-neighbor build, which
    /// receives index lists only); the rank stands in for the distance so the
    /// ranked policy keeps the closest entries.
    #[inline]
    pub fn rank_priority(&mut self, rank: usize) -> f32 {
        match self.kind {
            PriorityKind::RankedByDistance => rank as f32,
            PriorityKind::RandomSample => self.rng.gen::<f32>(),
        }
    }

    #[inline]
    #[must_use]
    pub fn should_sort(&self) -> bool {
        self.kind.should_sort()
    }
}

/// Split the current graph into new/old candidates (self-join), serial.
///
/// Flagged edges go to `new_candidates`, unflagged to `old_candidates`, both
/// via the pair push so reverse candidates are sampled in the same pass.
/// Callers follow up with [`flag_retained_new_candidates`].
pub fn build_candidates(
    current: &NeighborHeap,
    sampler: &mut CandidateSampler,
    new_candidates: &mut NeighborHeap,
    old_candidates: &mut NeighborHeap,
) {
    for i in 0..current.n_points() {
        for slot in 0..current.n_nbrs() {
            let idx = current.index(i, slot);
            if idx == NPOS {
                continue;
            }
            let d = sampler.edge_priority(current.distance(i, slot));
            let flag = current.flag(i, slot);
            if flag == 1 {
                new_candidates.checked_push_pair(i, d, idx, flag);
            } else {
                old_candidates.checked_push_pair(i, d, idx, flag);
            }
        }
    }
}

/// Worker-range variant of [`build_candidates`] pushing through row locks.
pub fn build_candidates_range(
    current: &NeighborHeap,
    range: Range<usize>,
    sampler: &mut CandidateSampler,
    new_candidates: &LockedNeighborHeap,
    old_candidates: &LockedNeighborHeap,
) {
    for i in range {
        for slot in 0..current.n_nbrs() {
            let idx = current.index(i, slot);
            if idx == NPOS {
                continue;
            }
            let d = sampler.edge_priority(current.distance(i, slot));
            let flag = current.flag(i, slot);
            if flag == 1 {
                new_candidates.checked_push_pair(i, d, idx, flag);
            } else {
                old_candidates.checked_push_pair(i, d, idx, flag);
            }
        }
    }
}

/// Mark as consumed every current-graph edge retained in that row's new
/// candidates, so it will not be resampled next iteration unless replaced.
pub fn flag_retained_new_candidates(current: &mut NeighborHeap, new_candidates: &NeighborHeap) {
    for i in 0..current.n_points() {
        let new_row = new_candidates.row(i);
        current.row_mut(i).clear_retained_flags(new_row);
    }
}

/// Build new candidates for one query row.
///
/// Only flagged (unconsumed) edges are sampled; the reference graph is static
/// so there are no reverse candidates and no old list. With `flag_on_add`,
/// every push is known to be retained (the candidate row is at least as wide
/// as the source row) and the source flag is cleared immediately; otherwise
/// the caller runs [`flag_retained_new_candidates`] afterwards.
pub fn build_query_candidates_row(
    current_row: &mut HeapRow,
    owner: usize,
    sampler: &mut CandidateSampler,
    new_row: &mut HeapRow,
    flag_on_add: bool,
) {
    for slot in 0..current_row.len() {
        if current_row.flag(slot) != 1 {
            continue;
        }
        let idx = current_row.index(slot);
        if idx == NPOS {
            continue;
        }
        let d = sampler.edge_priority(current_row.distance(slot));
        new_row.checked_push(owner, d, idx, 1);
        if flag_on_add {
            current_row.set_flag(slot, 0);
        }
    }
}

/// Serial sweep of [`build_query_candidates_row`] over all queries.
pub fn build_query_candidates(
    current: &mut NeighborHeap,
    sampler: &mut CandidateSampler,
    new_candidates: &mut NeighborHeap,
    flag_on_add: bool,
) {
    for i in 0..current.n_points() {
        build_query_candidates_row(
            current.row_mut(i),
            i,
            sampler,
            new_candidates.row_mut(i),
            flag_on_add,
        );
    }
}

/// Build the reference general-neighbor graph once from the reference k-NN
/// index lists (`n_ref` x `n_nbrs`, row-major, `NPOS` for empty slots).
///
/// The pair push also records reverse membership: if `r` is a reference
/// neighbor of `i`, then `i` is a general neighbor of `r`.
pub fn build_general_nbrs(
    reference_idx: &[usize],
    n_nbrs: usize,
    gn_graph: &mut NeighborHeap,
    sampler: &mut CandidateSampler,
) {
    for i in 0..gn_graph.n_points() {
        for slot in 0..n_nbrs {
            let r = reference_idx[i * n_nbrs + slot];
            if r == NPOS {
                continue;
            }
            let d = sampler.rank_priority(slot);
            gn_graph.checked_push_pair(i, d, r, 0);
        }
    }
}
