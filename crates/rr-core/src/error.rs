//! # AppError
//!
//! Centralized error handling for the Rusty-Ratings ecosystem.
//! Maps rating, cache and store failures to actionable error types.

use thiserror::Error;

/// The primary error type for all rr-core operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    /// Score outside the accepted `0..=5` range. Rejected before any write.
    #[error("invalid score {0}: must be between 0 and 5")]
    InvalidScore(i64),

    /// Resource not found (e.g., Content)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Missing or unverifiable caller identity
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated caller lacking the required privilege
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Unique (user, content) constraint hit by a concurrent insert.
    /// The service recovers by retrying the submission as an update.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// The authoritative rating store failed; nothing was committed.
    #[error("rating store unavailable: {0}")]
    StoreUnavailable(String),

    /// The expiring key-value store behind the window counter failed.
    /// Callers fail open on this variant.
    #[error("window counter unavailable: {0}")]
    TransientStoreUnavailable(String),

    /// Anything else (corrupt rows, encoding failures)
    #[error("internal service error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn content_not_found(id: impl ToString) -> Self {
        AppError::NotFound("content".to_string(), id.to_string())
    }
}

/// A specialized Result type for Rusty-Ratings logic.
pub type Result<T> = std::result::Result<T, AppError>;
