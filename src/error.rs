//! Error types for descent.

use thiserror::Error;

/// Errors that can occur while building, querying or editing a k-NN graph.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DescentError {
    /// Empty dataset (no points to index).
    #[error("dataset is empty")]
    EmptyData,

    /// Invalid parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Dimension mismatch between datasets or between data and its dimension.
    #[error("dimension mismatch: {context}")]
    DimensionMismatch { context: String },

    /// A neighbor index in an input graph is out of range.
    #[error("neighbor index {index} out of range for {n_points} points at row {row}")]
    IndexOutOfRange {
        index: usize,
        row: usize,
        n_points: usize,
    },

    /// A distance in an input graph is NaN or infinite.
    #[error("non-finite distance at row {row}, slot {slot}")]
    NonFiniteDistance { row: usize, slot: usize },

    /// Metric tag not recognized at the host boundary.
    #[error("unknown metric: {0}")]
    UnknownMetric(String),

    /// Graphs passed to a merge do not describe the same point set.
    #[error("graph shape mismatch: {context}")]
    GraphShapeMismatch { context: String },
}

/// Result type alias for descent operations.
pub type Result<T> = std::result::Result<T, DescentError>;
