//! Batched work splitting with cooperative cancellation.
//!
//! The point range [0, N) is processed in blocks of `block_size`. Inside a
//! block, work fans out to rayon in `grain_size` sub-ranges; between blocks
//! the driver reports progress and polls for interruption. Within-block work
//! is not interruptible. Worker results (update counts) are summed.
//!
//! An interrupted pass returns whatever was accumulated so far; the heaps it
//! was refining remain valid, just not fully refined.

use rayon::prelude::*;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};

/// Progress reporting and cooperative cancellation.
///
/// The driver calls `block_finished` between blocks and the descent loops
/// call `iter_finished` / `converged` at iteration granularity. Returning
/// `true` from `interrupted` stops the run at the next block or iteration
/// boundary; the partial result is returned as-is.
pub trait Progress: Sync {
    fn block_finished(&self, _done: usize) {}
    fn iter_finished(&self, _iter: usize, _n_updates: usize) {}
    fn converged(&self, _n_updates: usize, _tol: f64) {}
    fn interrupted(&self) -> bool {
        false
    }
}

/// No reporting, never interrupts.
pub struct NullProgress;

impl Progress for NullProgress {}

/// Writes iteration summaries to stderr; used when `verbose` is set.
pub struct ConsoleProgress {
    n_iters: usize,
}

impl ConsoleProgress {
    #[must_use]
    pub fn new(n_iters: usize) -> Self {
        ConsoleProgress { n_iters }
    }
}

impl Progress for ConsoleProgress {
    fn iter_finished(&self, iter: usize, n_updates: usize) {
        eprintln!("iter {}/{}: {} updates", iter + 1, self.n_iters, n_updates);
    }

    fn converged(&self, n_updates: usize, tol: f64) {
        eprintln!("converged: {} updates <= tolerance {:.2}", n_updates, tol);
    }
}

/// External cancellation handle; share it with another thread and call
/// [`CancelToken::cancel`] to stop a running build at the next boundary.
#[derive(Default)]
pub struct CancelToken {
    cancelled: AtomicBool,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

impl Progress for CancelToken {
    fn interrupted(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Parallel batched driver.
///
/// Returns `(sum of worker results, interrupted)`. A range no larger than one
/// block runs as a single uninterruptible fan-out.
pub fn batched_for<P, F>(
    n: usize,
    block_size: usize,
    grain_size: usize,
    progress: &P,
    worker: &F,
) -> (usize, bool)
where
    P: Progress + ?Sized,
    F: Fn(Range<usize>) -> usize + Sync,
{
    let block_size = block_size.max(1);
    let grain_size = grain_size.max(1);
    if n == 0 {
        return (0, false);
    }
    if n <= block_size {
        return (run_block(0..n, grain_size, worker), false);
    }
    let mut total = 0;
    let mut begin = 0;
    while begin < n {
        let end = (begin + block_size).min(n);
        total += run_block(begin..end, grain_size, worker);
        progress.block_finished(end);
        if progress.interrupted() {
            return (total, true);
        }
        begin = end;
    }
    (total, false)
}

fn run_block<F>(range: Range<usize>, grain_size: usize, worker: &F) -> usize
where
    F: Fn(Range<usize>) -> usize + Sync,
{
    grain_ranges(range, grain_size)
        .into_par_iter()
        .map(worker)
        .sum()
}

/// Split `range` into consecutive sub-ranges of at most `grain_size`.
pub fn grain_ranges(range: Range<usize>, grain_size: usize) -> Vec<Range<usize>> {
    let grain_size = grain_size.max(1);
    let mut out = Vec::with_capacity(range.len().div_ceil(grain_size));
    let mut begin = range.start;
    while begin < range.end {
        let end = (begin + grain_size).min(range.end);
        out.push(begin..end);
        begin = end;
    }
    out
}

/// Serial twin of [`batched_for`]: one worker call per block, interruption
/// polled between blocks.
pub fn batched_for_serial<P, F>(
    n: usize,
    block_size: usize,
    progress: &P,
    mut worker: F,
) -> (usize, bool)
where
    P: Progress + ?Sized,
    F: FnMut(Range<usize>) -> usize,
{
    let block_size = block_size.max(1);
    let mut total = 0;
    let mut begin = 0;
    while begin < n {
        let end = (begin + block_size).min(n);
        total += worker(begin..end);
        progress.block_finished(end);
        if progress.interrupted() {
            return (total, true);
        }
        begin = end;
    }
    (total, false)
}
