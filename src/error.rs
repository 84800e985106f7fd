//! Error types for pqspace.

use thiserror::Error;

/// Errors that can occur while configuring, loading, or querying a space.
///
/// Every failure mode is a recoverable result; it is the caller's decision
/// whether a given error is fatal for its run.
#[derive(Debug, Error)]
pub enum MetricError {
    /// Invalid configuration (e.g., dimension not divisible by the
    /// subspace count, or a zero parameter). Prevents construction.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// I/O error (file missing, truncated, unreadable).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An on-disk artifact declares a dimension inconsistent with the
    /// configured one, or a buffer has the wrong length.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A query-to-code distance was requested against a query table that
    /// has not been prepared.
    #[error("query table has not been prepared")]
    QueryTableMissing,

    /// Operation not legal in the current state (e.g., distance before
    /// the codebook or construction table is loaded).
    #[error("invalid state: {0}")]
    InvalidState(String),
}

/// Result type for metric operations.
pub type Result<T> = std::result::Result<T, MetricError>;
