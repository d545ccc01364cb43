//! External collaborators the pipeline calls into.

use std::sync::Arc;

use scan_calibration::CalibrationTarget;
use scan_optimize::GeometryBackend;
use scan_recovery::{NoopTarget, RecoveryTarget};
use scan_types::{AnalyticsSink, AuditSink, NoopAnalytics, SecureStorage};

/// Implementations supplied by the embedding application.
///
/// The default drops analytics, persists nothing, measures no calibration
/// accuracy, recovers against a no-op capture stack and optimizes on the CPU.
#[derive(Clone)]
pub struct Collaborators {
    pub(crate) analytics: Arc<dyn AnalyticsSink>,
    pub(crate) persistence: Option<(Arc<dyn SecureStorage>, Arc<dyn AuditSink>)>,
    pub(crate) calibration_target: Option<Arc<dyn CalibrationTarget>>,
    pub(crate) recovery_target: Arc<dyn RecoveryTarget>,
    pub(crate) backend: Option<Arc<dyn GeometryBackend>>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            analytics: Arc::new(NoopAnalytics),
            persistence: None,
            calibration_target: None,
            recovery_target: Arc::new(NoopTarget),
            backend: None,
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("persistence", &self.persistence.is_some())
            .field("calibration_target", &self.calibration_target.is_some())
            .field("backend", &self.backend.as_ref().map(|b| b.name()))
            .finish_non_exhaustive()
    }
}

impl Collaborators {
    /// Sends analytics events to `sink`.
    #[must_use]
    pub fn with_analytics(mut self, sink: Arc<dyn AnalyticsSink>) -> Self {
        self.analytics = sink;
        self
    }

    /// Backs calibration profiles and recovery points up to `storage`;
    /// storage failures are written to `audit`.
    #[must_use]
    pub fn with_storage(mut self, storage: Arc<dyn SecureStorage>, audit: Arc<dyn AuditSink>) -> Self {
        self.persistence = Some((storage, audit));
        self
    }

    /// Applies calibration parameters through `target` and measures the result.
    #[must_use]
    pub fn with_calibration_target(mut self, target: Arc<dyn CalibrationTarget>) -> Self {
        self.calibration_target = Some(target);
        self
    }

    /// Drives recovery strategies through `target`.
    #[must_use]
    pub fn with_recovery_target(mut self, target: Arc<dyn RecoveryTarget>) -> Self {
        self.recovery_target = target;
        self
    }

    /// Runs decimation and smoothing on `backend` instead of the CPU backend.
    #[must_use]
    pub fn with_backend(mut self, backend: Arc<dyn GeometryBackend>) -> Self {
        self.backend = Some(backend);
        self
    }
}
