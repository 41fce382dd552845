//! Error types for the spatext crate.

use thiserror::Error;

/// Errors surfaced by index construction and the insertion/search entry points.
///
/// Absent cells or keywords are never errors; those are normal no-ops on the
/// search path. Invariant violations inside the index signal bugs and are
/// handled with debug assertions rather than recoverable errors.
#[derive(Debug, Error)]
pub enum SpatextError {
    /// Configuration rejected by [`Config::validate`](crate::Config::validate).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Degenerate or non-finite global bounds.
    #[error("invalid bounds: {0}")]
    InvalidBounds(String),

    /// A query or data object was submitted with an empty keyword set.
    #[error("keyword set must not be empty")]
    EmptyKeywords,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SpatextError>;
