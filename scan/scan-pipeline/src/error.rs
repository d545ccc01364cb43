//! Error types for scan-pipeline.

use scan_accuracy::AccuracyError;
use scan_calibration::CalibrationError;
use scan_collision::CollisionError;
use scan_governor::GovernorError;
use scan_optimize::OptimizeError;
use scan_recovery::RecoveryError;
use scan_types::ScanId;
use scan_validate::ValidateError;
use thiserror::Error;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors surfaced by [`ScanPipeline`](crate::ScanPipeline).
#[derive(Debug, Error)]
pub enum PipelineError {
    /// No scan with this id is active.
    #[error("scan is not active: {scan}")]
    ScanNotFound {
        /// Requested scan.
        scan: ScanId,
    },

    /// The scan was already begun and not ended.
    #[error("scan is already active: {scan}")]
    ScanActive {
        /// Requested scan.
        scan: ScanId,
    },

    /// Admission refused by the resource governor.
    #[error(transparent)]
    Governor(#[from] GovernorError),

    /// A fragment could not be validated.
    #[error(transparent)]
    Validate(#[from] ValidateError),

    /// Accuracy verification failed.
    #[error(transparent)]
    Accuracy(#[from] AccuracyError),

    /// Collision detection failed.
    #[error(transparent)]
    Collision(#[from] CollisionError),

    /// Environment analysis or calibration failed.
    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    /// Mesh optimization failed.
    #[error(transparent)]
    Optimize(#[from] OptimizeError),

    /// Recovery failed.
    #[error(transparent)]
    Recovery(#[from] RecoveryError),

    /// Configuration could not be read or written.
    #[error("invalid pipeline configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl PipelineError {
    /// True when retrying later may succeed: quota exhaustion or a geometry
    /// backend that is still initializing.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Governor(GovernorError::ResourceExhausted { .. })
                | Self::Optimize(OptimizeError::PipelineUnavailable { .. })
        )
    }
}
