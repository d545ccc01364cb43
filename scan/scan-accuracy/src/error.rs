//! Error types for scan-accuracy.

use scan_types::{CollaboratorError, ContextId};
use thiserror::Error;

/// Result type for accuracy operations.
pub type AccuracyResult<T> = Result<T, AccuracyError>;

/// Errors returned by the accuracy verifier.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AccuracyError {
    /// The verification context is unknown or has ended.
    #[error("verification context not found: {id}")]
    ContextNotFound {
        /// The id that failed to resolve.
        id: ContextId,
    },

    /// A session hook refused to start.
    #[error("session hook '{hook}' failed to start: {source}")]
    HookFailed {
        /// Hook name.
        hook: &'static str,
        /// Underlying failure.
        #[source]
        source: CollaboratorError,
    },
}

impl AccuracyError {
    /// Creates a context not found error.
    #[must_use]
    pub const fn not_found(id: ContextId) -> Self {
        Self::ContextNotFound { id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = AccuracyError::not_found(ContextId::from_parts(3, 1));
        assert_eq!(err.to_string(), "verification context not found: ctx-3.1");

        let err = AccuracyError::HookFailed {
            hook: "collision",
            source: CollaboratorError::unavailable("offline"),
        };
        assert!(err.to_string().contains("collision"));
    }
}
