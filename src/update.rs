//! Pair evaluation and heap application.
//!
//! The updater is the only place a distance is actually computed during the
//! join phases. The build-mode updater performs a symmetric push with flag=1
//! and dedups repeat pair evaluations through a seen set keyed on the
//! normalized pair; the set is worker-local and cleared between source-point
//! blocks. The query-mode updater performs the asymmetric push only (the
//! reference graph is read-only).

use crate::distance::PairDistance;
use crate::heap::{HeapRow, LockedNeighborHeap, NeighborHeap};
use std::collections::HashSet;

/// Build-mode updater: symmetric pushes with batch dedup.
pub struct GraphUpdater<'a> {
    distance: PairDistance<'a>,
    seen: HashSet<(usize, usize)>,
}

impl<'a> GraphUpdater<'a> {
    #[must_use]
    pub fn new(distance: PairDistance<'a>) -> Self {
        GraphUpdater {
            distance,
            seen: HashSet::new(),
        }
    }

    /// Evaluate `(p, q)` and push into both endpoints' heaps.
    ///
    /// Returns the number of row-level accepts (0, 1 or 2); a pair already
    /// evaluated since the last [`GraphUpdater::clear_seen`] costs nothing.
    pub fn generate_and_apply(&mut self, heap: &mut NeighborHeap, p: usize, q: usize) -> usize {
        if !self.seen.insert(normalize(p, q)) {
            return 0;
        }
        let d = self.distance.compute(p, q);
        heap.checked_push_pair(p, d, q, 1) as usize
    }

    /// Locked-heap variant for parallel workers; each worker owns its own
    /// updater, so the seen set needs no synchronization.
    pub fn generate_and_apply_locked(
        &mut self,
        heap: &LockedNeighborHeap,
        p: usize,
        q: usize,
    ) -> usize {
        if !self.seen.insert(normalize(p, q)) {
            return 0;
        }
        let d = self.distance.compute(p, q);
        heap.checked_push_pair(p, d, q, 1) as usize
    }

    /// Forget evaluated pairs; called between source-point blocks.
    pub fn clear_seen(&mut self) {
        self.seen.clear();
    }
}

#[inline]
fn normalize(p: usize, q: usize) -> (usize, usize) {
    if p <= q {
        (p, q)
    } else {
        (q, p)
    }
}

/// Query-mode updater: `d(reference, query)` pushed into the query row only.
pub struct QueryUpdater<'a> {
    distance: PairDistance<'a>,
}

impl<'a> QueryUpdater<'a> {
    #[must_use]
    pub fn new(distance: PairDistance<'a>) -> Self {
        QueryUpdater { distance }
    }

    /// Evaluate reference `r` for `query` and push into the query's row.
    pub fn generate_and_apply(&self, row: &mut HeapRow, query: usize, r: usize) -> usize {
        let d = self.distance.compute(r, query);
        row.checked_push(query, d, r, 1) as usize
    }
}
