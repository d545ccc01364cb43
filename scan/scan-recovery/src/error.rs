//! Error types for scan-recovery.

use scan_types::ScanId;
use thiserror::Error;

use crate::InterruptionType;

/// Result type for recovery operations.
pub type RecoveryResult<T> = Result<T, RecoveryError>;

/// Errors from interruption handling and recovery points.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecoveryError {
    /// The scan has no active monitor.
    #[error("scan is not monitored: {scan}")]
    NotMonitored {
        /// Scan the event was for.
        scan: ScanId,
    },

    /// No strategy is bound to the interruption. The monitor stays active.
    #[error("no recovery strategy for {interruption}")]
    NoStrategy {
        /// Unhandled interruption.
        interruption: InterruptionType,
    },

    /// A strategy ran but did not restore a consistent state.
    #[error("recovery from {interruption} failed: {cause}")]
    RecoveryFailed {
        /// Interruption being recovered.
        interruption: InterruptionType,
        /// Step and collaborator error that failed.
        cause: String,
    },

    /// No recovery point matches.
    #[error("no recovery point {name:?} for {scan}")]
    RecoveryPointNotFound {
        /// Scan searched.
        scan: ScanId,
        /// Requested name, or `None` for the latest.
        name: Option<String>,
    },
}
