//! The accuracy verifier service.

use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;
use scan_history::{BoundedHistory, ContextRegistry};
use scan_types::{
    ContextId, EnvironmentConditions, EnvironmentSnapshot, ScanFrame, ScanId, ScanSessionHook,
};
use tracing::{debug, info, warn};

use crate::{
    measure_frame, AccuracyAnalysis, AccuracyConfig, AccuracyError, AccuracyMeasurement,
    AccuracyRequirements, AccuracyResult,
};

/// State for one active verification session.
#[derive(Debug)]
struct VerificationContext {
    scan: ScanId,
    started: SystemTime,
    requirements: AccuracyRequirements,
    conditions: EnvironmentConditions,
    history: BoundedHistory<AccuracyMeasurement>,
    hook_contexts: Vec<(usize, ContextId)>,
}

/// Read-only view of an active verification context.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerificationInfo {
    /// Scan the context belongs to.
    pub scan: ScanId,
    /// Wall-clock start.
    pub started: SystemTime,
    /// Requirements the session is measured against.
    pub requirements: AccuracyRequirements,
    /// Measurements recorded so far.
    pub samples: usize,
}

/// Measures per-frame accuracy for any number of concurrent sessions.
///
/// Session hooks (collision detection, environment analysis) are opened when
/// a session begins and closed when it ends.
///
/// # Example
///
/// ```
/// use scan_accuracy::{AccuracyRequirements, AccuracyVerifier};
/// use scan_types::{CameraState, EnvironmentSnapshot, ScanFrame, ScanId, Timestamp};
///
/// let verifier = AccuracyVerifier::default();
/// let ctx = verifier
///     .begin_verification(ScanId(1), AccuracyRequirements::default(), &EnvironmentSnapshot::default())
///     .unwrap();
///
/// let frame = ScanFrame::new(Timestamp::from_secs(0.0), CameraState::default());
/// let m = verifier.verify_frame(ctx, &frame).unwrap();
/// assert!(m.overall >= 0.0 && m.overall <= 1.0);
///
/// let analysis = verifier.end_verification(ctx).unwrap();
/// assert_eq!(analysis.samples, 1);
/// assert!(verifier.verify_frame(ctx, &frame).is_err());
/// ```
pub struct AccuracyVerifier {
    config: AccuracyConfig,
    hooks: Vec<Arc<dyn ScanSessionHook>>,
    contexts: Mutex<ContextRegistry<VerificationContext>>,
}

impl Default for AccuracyVerifier {
    fn default() -> Self {
        Self::new(AccuracyConfig::default())
    }
}

impl std::fmt::Debug for AccuracyVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccuracyVerifier")
            .field("config", &self.config)
            .field("hooks", &self.hooks.iter().map(|h| h.name()).collect::<Vec<_>>())
            .field("active", &self.contexts.lock().len())
            .finish()
    }
}

impl AccuracyVerifier {
    /// Creates a verifier without session hooks.
    #[must_use]
    pub fn new(config: AccuracyConfig) -> Self {
        Self {
            config,
            hooks: Vec::new(),
            contexts: Mutex::new(ContextRegistry::new()),
        }
    }

    /// Adds a hook opened with every session.
    #[must_use]
    pub fn with_hook(mut self, hook: Arc<dyn ScanSessionHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &AccuracyConfig {
        &self.config
    }

    /// Number of active sessions.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.contexts.lock().len()
    }

    /// Starts a verification session.
    ///
    /// Beginning twice for the same scan yields two independent contexts.
    ///
    /// # Errors
    ///
    /// Returns [`AccuracyError::HookFailed`] if a session hook refuses to
    /// start. Hooks opened before the failure are closed again.
    pub fn begin_verification(
        &self,
        scan: ScanId,
        requirements: AccuracyRequirements,
        snapshot: &EnvironmentSnapshot,
    ) -> AccuracyResult<ContextId> {
        let mut hook_contexts = Vec::with_capacity(self.hooks.len());
        for (idx, hook) in self.hooks.iter().enumerate() {
            match hook.open(scan, requirements.level, snapshot) {
                Ok(ctx) => hook_contexts.push((idx, ctx)),
                Err(source) => {
                    warn!(%scan, hook = hook.name(), error = %source, "session hook failed");
                    self.close_hooks(&hook_contexts);
                    return Err(AccuracyError::HookFailed {
                        hook: hook.name(),
                        source,
                    });
                }
            }
        }

        let id = self.contexts.lock().insert(VerificationContext {
            scan,
            started: SystemTime::now(),
            requirements,
            conditions: snapshot.conditions,
            history: BoundedHistory::new(self.config.history_capacity),
            hook_contexts,
        });
        info!(%scan, context = %id, level = %requirements.level, "verification started");
        Ok(id)
    }

    /// Measures one frame and appends it to the session history.
    ///
    /// # Errors
    ///
    /// Returns [`AccuracyError::ContextNotFound`] for an unknown or ended context.
    pub fn verify_frame(&self, context: ContextId, frame: &ScanFrame) -> AccuracyResult<AccuracyMeasurement> {
        let measurement = self.measure(context, frame)?;
        self.record_measurement(context, measurement)?;
        Ok(measurement)
    }

    /// Measures one frame against the session's requirements without
    /// recording it.
    ///
    /// # Errors
    ///
    /// Returns [`AccuracyError::ContextNotFound`] for an unknown or ended context.
    pub fn measure(&self, context: ContextId, frame: &ScanFrame) -> AccuracyResult<AccuracyMeasurement> {
        let (requirements, conditions) = {
            let contexts = self.contexts.lock();
            let ctx = contexts.get(context).ok_or(AccuracyError::not_found(context))?;
            (ctx.requirements, ctx.conditions)
        };
        Ok(measure_frame(frame, &requirements, conditions))
    }

    /// Appends a measurement from [`measure`](Self::measure) to the session history.
    ///
    /// # Errors
    ///
    /// Returns [`AccuracyError::ContextNotFound`] for an unknown or ended context.
    pub fn record_measurement(
        &self,
        context: ContextId,
        measurement: AccuracyMeasurement,
    ) -> AccuracyResult<()> {
        let mut contexts = self.contexts.lock();
        let ctx = contexts
            .get_mut(context)
            .ok_or(AccuracyError::not_found(context))?;
        ctx.history.push(measurement);
        debug!(
            context = %context,
            overall = measurement.overall,
            mesh = measurement.mesh_quality,
            feature = measurement.feature_accuracy,
            scale = measurement.scale_accuracy,
            "frame verified"
        );
        Ok(())
    }

    /// Updates the conditions attached to subsequent measurements.
    ///
    /// # Errors
    ///
    /// Returns [`AccuracyError::ContextNotFound`] for an unknown or ended context.
    pub fn record_conditions(
        &self,
        context: ContextId,
        conditions: EnvironmentConditions,
    ) -> AccuracyResult<()> {
        let mut contexts = self.contexts.lock();
        let ctx = contexts
            .get_mut(context)
            .ok_or(AccuracyError::not_found(context))?;
        ctx.conditions = conditions;
        Ok(())
    }

    /// Snapshot of the session's measurements, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`AccuracyError::ContextNotFound`] for an unknown or ended context.
    pub fn measurements(&self, context: ContextId) -> AccuracyResult<Vec<AccuracyMeasurement>> {
        let contexts = self.contexts.lock();
        contexts
            .get(context)
            .map(|ctx| ctx.history.snapshot())
            .ok_or(AccuracyError::not_found(context))
    }

    /// Summary of an active session.
    ///
    /// # Errors
    ///
    /// Returns [`AccuracyError::ContextNotFound`] for an unknown or ended context.
    pub fn context_info(&self, context: ContextId) -> AccuracyResult<VerificationInfo> {
        let contexts = self.contexts.lock();
        contexts
            .get(context)
            .map(|ctx| VerificationInfo {
                scan: ctx.scan,
                started: ctx.started,
                requirements: ctx.requirements,
                samples: ctx.history.len(),
            })
            .ok_or(AccuracyError::not_found(context))
    }

    /// Context the named hook opened for this session, if that hook is attached.
    ///
    /// # Errors
    ///
    /// Returns [`AccuracyError::ContextNotFound`] for an unknown or ended context.
    pub fn hook_context(&self, context: ContextId, hook: &str) -> AccuracyResult<Option<ContextId>> {
        let contexts = self.contexts.lock();
        let ctx = contexts
            .get(context)
            .ok_or(AccuracyError::not_found(context))?;
        Ok(ctx
            .hook_contexts
            .iter()
            .find(|(idx, _)| self.hooks.get(*idx).is_some_and(|h| h.name() == hook))
            .map(|&(_, id)| id))
    }

    /// Analyzes the session so far without ending it.
    ///
    /// # Errors
    ///
    /// Returns [`AccuracyError::ContextNotFound`] for an unknown or ended context.
    pub fn analyze_accuracy(&self, context: ContextId) -> AccuracyResult<AccuracyAnalysis> {
        let (scan, requirements, history) = {
            let contexts = self.contexts.lock();
            let ctx = contexts.get(context).ok_or(AccuracyError::not_found(context))?;
            (ctx.scan, ctx.requirements, ctx.history.snapshot())
        };
        Ok(AccuracyAnalysis::from_measurements(scan, &history, &requirements))
    }

    /// Ends a session, returning its final analysis.
    ///
    /// The context id never resolves again afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`AccuracyError::ContextNotFound`] if the context is unknown
    /// or already ended.
    pub fn end_verification(&self, context: ContextId) -> AccuracyResult<AccuracyAnalysis> {
        let ctx = self
            .contexts
            .lock()
            .remove(context)
            .ok_or(AccuracyError::not_found(context))?;

        let history = ctx.history.snapshot();
        let analysis = AccuracyAnalysis::from_measurements(ctx.scan, &history, &ctx.requirements);
        self.close_hooks(&ctx.hook_contexts);

        info!(
            scan = %ctx.scan,
            context = %context,
            samples = analysis.samples,
            overall = analysis.mean_overall,
            meets_requirements = analysis.meets_requirements,
            "verification ended"
        );
        Ok(analysis)
    }

    fn close_hooks(&self, opened: &[(usize, ContextId)]) {
        for &(idx, ctx) in opened.iter().rev() {
            if let Some(hook) = self.hooks.get(idx) {
                hook.close(ctx);
            }
        }
    }
}
