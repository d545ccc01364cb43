//! Error types for scan-calibration.

use scan_types::{CollaboratorError, ContextId};
use thiserror::Error;

/// Result type for environment analysis and calibration.
pub type CalibrationResult<T> = Result<T, CalibrationError>;

/// Errors returned by the environment analyzer and calibration manager.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CalibrationError {
    /// The analysis or calibration context is unknown or has ended.
    #[error("calibration context not found: {id}")]
    ContextNotFound {
        /// The id that failed to resolve.
        id: ContextId,
    },

    /// The capture/processing collaborator refused the parameters.
    #[error("calibration target failed: {0}")]
    Target(#[from] CollaboratorError),
}

impl CalibrationError {
    /// Creates a context not found error.
    #[must_use]
    pub const fn not_found(id: ContextId) -> Self {
        Self::ContextNotFound { id }
    }
}
