//! Error types for scan-collision.

use scan_types::ContextId;
use thiserror::Error;

/// Result type for collision detection.
pub type CollisionResult<T> = Result<T, CollisionError>;

/// Errors returned by the collision detector.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CollisionError {
    /// The collision context is unknown or has ended.
    #[error("collision context not found: {id}")]
    ContextNotFound {
        /// The id that failed to resolve.
        id: ContextId,
    },
}

impl CollisionError {
    /// Creates a context not found error.
    #[must_use]
    pub const fn not_found(id: ContextId) -> Self {
        Self::ContextNotFound { id }
    }
}
