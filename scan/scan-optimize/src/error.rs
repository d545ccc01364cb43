//! Error types for scan-optimize.

use thiserror::Error;

/// Result type for optimization operations.
pub type OptimizeResult<T> = Result<T, OptimizeError>;

/// Errors from optimizing a fragment.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OptimizeError {
    /// The geometry backend is not ready. Retry after reinitializing it.
    #[error("geometry pipeline not available: {backend}")]
    PipelineUnavailable {
        /// Backend name.
        backend: &'static str,
    },
}
