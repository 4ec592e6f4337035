//! Error types for the Shelf engine.

use thiserror::Error;

/// All possible errors from the Shelf engine.
///
/// Store implementations report their failures with these kinds so the merge
/// applicator can decide which ones to tolerate by matching on the variant.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Input errors
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    // Store errors
    #[error("duplicate entity: {0}")]
    DuplicateEntity(String),

    #[error("referential constraint violated: {0}")]
    ReferentialConstraint(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unexpected store error: {0}")]
    Unexpected(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
