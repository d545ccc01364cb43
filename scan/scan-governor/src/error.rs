//! Error types for scan-governor.

use thiserror::Error;

use crate::ResourceKind;

/// Result type for governor operations.
pub type GovernorResult<T> = Result<T, GovernorError>;

/// Errors returned by the resource governor.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GovernorError {
    /// A request would push a counter over its quota.
    #[error("{kind} exhausted: requested {requested}, available {available}")]
    ResourceExhausted {
        /// The first counter that would overflow.
        kind: ResourceKind,
        /// Amount requested.
        requested: u64,
        /// Amount still available.
        available: u64,
    },
}

impl GovernorError {
    /// Creates a resource exhausted error.
    #[must_use]
    pub const fn exhausted(kind: ResourceKind, requested: u64, available: u64) -> Self {
        Self::ResourceExhausted {
            kind,
            requested,
            available,
        }
    }

    /// The exhausted resource kind.
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        match self {
            Self::ResourceExhausted { kind, .. } => *kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = GovernorError::exhausted(ResourceKind::Memory, 10, 4);
        assert_eq!(
            err.to_string(),
            "memory exhausted: requested 10, available 4"
        );
        assert_eq!(err.kind(), ResourceKind::Memory);
    }
}
