//! Distance metrics for dense vectors.
//!
//! The graph engine never sees raw vectors; it asks a [`PairDistance`] for
//! `d(i, j)` by point index. For a self-join both sides index the same
//! dataset and the distance is symmetric. For a query join the left side
//! indexes the reference set and the right side the query set.
//!
//! No metric here is assumed to satisfy the triangle inequality; the engine
//! only relies on non-negativity and (for the build path) symmetry.

use crate::error::{DescentError, Result};
use std::str::FromStr;

/// Distance metric for dense vectors.
///
/// `SquaredEuclidean` is the metric the host calls `l2`; it orders neighbors
/// identically to `Euclidean` but skips the square root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    /// Euclidean distance.
    Euclidean,
    /// Squared Euclidean distance (host tag `l2`).
    SquaredEuclidean,
    /// Cosine distance $1 - \cos(a,b)$, computing norms as needed.
    Cosine,
    /// Manhattan (L1) distance.
    Manhattan,
    /// Hamming distance over 0/1-valued vectors: the number of mismatched
    /// coordinates.
    Hamming,
}

impl Metric {
    /// Compute distance between two vectors.
    ///
    /// If dimensions mismatch, this returns `f32::INFINITY` so the pair is
    /// never admitted as a neighbor.
    #[inline]
    #[must_use]
    pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() {
            return f32::INFINITY;
        }
        match self {
            Metric::Euclidean => kernels::squared_euclidean(a, b).sqrt(),
            Metric::SquaredEuclidean => kernels::squared_euclidean(a, b),
            Metric::Cosine => kernels::cosine_distance(a, b),
            Metric::Manhattan => kernels::manhattan(a, b),
            Metric::Hamming => kernels::hamming(a, b),
        }
    }
}

impl FromStr for Metric {
    type Err = DescentError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "euclidean" => Ok(Metric::Euclidean),
            "l2" => Ok(Metric::SquaredEuclidean),
            "cosine" => Ok(Metric::Cosine),
            "manhattan" => Ok(Metric::Manhattan),
            "hamming" => Ok(Metric::Hamming),
            other => Err(DescentError::UnknownMetric(other.to_string())),
        }
    }
}

/// Indexed distance over one or two flat row-major datasets.
///
/// The build path uses [`PairDistance::self_join`]; the query path uses
/// [`PairDistance::between`], where `compute(i, j)` is the distance between
/// reference point `i` and query point `j`.
#[derive(Debug, Clone, Copy)]
pub struct PairDistance<'a> {
    x: &'a [f32],
    y: &'a [f32],
    dim: usize,
    metric: Metric,
}

impl<'a> PairDistance<'a> {
    /// Distance within a single dataset (symmetric).
    pub fn self_join(data: &'a [f32], dim: usize, metric: Metric) -> Result<Self> {
        check_matrix(data, dim, "data")?;
        Ok(PairDistance {
            x: data,
            y: data,
            dim,
            metric,
        })
    }

    /// Distance from a reference dataset to a query dataset.
    pub fn between(reference: &'a [f32], query: &'a [f32], dim: usize, metric: Metric) -> Result<Self> {
        check_matrix(reference, dim, "reference")?;
        check_matrix(query, dim, "query")?;
        Ok(PairDistance {
            x: reference,
            y: query,
            dim,
            metric,
        })
    }

    /// Number of points on the left (reference) side.
    #[inline]
    #[must_use]
    pub fn n_x(&self) -> usize {
        self.x.len() / self.dim
    }

    /// Number of points on the right (query) side.
    #[inline]
    #[must_use]
    pub fn n_y(&self) -> usize {
        self.y.len() / self.dim
    }

    /// `d(x_i, y_j)`.
    #[inline]
    #[must_use]
    pub fn compute(&self, i: usize, j: usize) -> f32 {
        debug_assert!(i < self.n_x() && j < self.n_y());
        let a = &self.x[i * self.dim..(i + 1) * self.dim];
        let b = &self.y[j * self.dim..(j + 1) * self.dim];
        self.metric.distance(a, b)
    }
}

fn check_matrix(data: &[f32], dim: usize, name: &str) -> Result<()> {
    if dim == 0 {
        return Err(DescentError::InvalidParameter("dim must be positive".to_string()));
    }
    if data.is_empty() {
        return Err(DescentError::EmptyData);
    }
    if data.len() % dim != 0 {
        return Err(DescentError::DimensionMismatch {
            context: format!("{} has {} elements, not a multiple of dim {}", name, data.len(), dim),
        });
    }
    Ok(())
}

mod kernels {
    //! Portable scalar kernels.

    const NORM_EPSILON: f32 = 1e-9;

    #[inline]
    #[must_use]
    pub fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| {
                let d = x - y;
                d * d
            })
            .sum()
    }

    #[inline]
    #[must_use]
    pub fn manhattan(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum()
    }

    #[inline]
    #[must_use]
    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
    }

    /// Cosine distance $1 - \cos(a, b)$; degenerate (near-zero norm) vectors
    /// are treated as maximally distant from everything.
    #[inline]
    #[must_use]
    pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
        let na = dot(a, a).sqrt();
        let nb = dot(b, b).sqrt();
        if na > NORM_EPSILON && nb > NORM_EPSILON {
            1.0 - (dot(a, b) / (na * nb)).clamp(-1.0, 1.0)
        } else {
            1.0
        }
    }

    /// Mismatch count over 0/1-valued coordinates.
    #[inline]
    #[must_use]
    pub fn hamming(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b.iter()).filter(|(x, y)| x != y).count() as f32
    }
}
