//! Seed-stream derivation for worker RNGs.
//!
//! Every randomized pass derives its generators from one host seed. Workers
//! and iterations get disjoint streams by mixing `(seed, stream)` through a
//! SplitMix64 finalizer before seeding a [`SmallRng`], so no mutable global
//! state is shared and parallel workers never pull from the same sequence.

use rand::rngs::SmallRng;
use rand::SeedableRng;

/// Derive an independent generator for `stream` from the host `seed`.
#[must_use]
pub fn stream_rng(seed: u64, stream: u64) -> SmallRng {
    SmallRng::seed_from_u64(splitmix64(
        seed ^ stream.wrapping_mul(0x9E37_79B9_7F4A_7C15),
    ))
}

/// Stream id for a worker chunk within one iteration.
///
/// Iteration and chunk start are packed into disjoint bit ranges so that
/// every (iteration, chunk) pair maps to a distinct stream.
#[inline]
#[must_use]
pub fn chunk_stream(iter: usize, chunk_start: usize) -> u64 {
    ((iter as u64) << 40) ^ chunk_start as u64
}

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
