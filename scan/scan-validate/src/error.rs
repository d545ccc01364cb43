//! Error types for scan-validate.

use scan_types::FragmentId;
use thiserror::Error;

/// Result type for validation operations.
pub type ValidateResult<T> = Result<T, ValidateError>;

/// Errors that abort a validation call.
///
/// Poor geometry is never an error; it is reported as issues on the result.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidateError {
    /// The fragment's arrays cannot be interpreted.
    #[error("fragment {fragment:?} is malformed: {reason}")]
    MalformedFragment {
        /// Offending fragment.
        fragment: FragmentId,
        /// What is wrong.
        reason: String,
    },
}

impl ValidateError {
    /// Creates a malformed fragment error.
    #[must_use]
    pub fn malformed(fragment: FragmentId, reason: impl Into<String>) -> Self {
        Self::MalformedFragment {
            fragment,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ValidateError::malformed(FragmentId(4), "vertex 2 is not finite");
        assert!(err.to_string().contains("vertex 2 is not finite"));
    }
}
