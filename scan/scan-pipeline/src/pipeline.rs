//! The scan pipeline service.

use std::sync::Arc;
use std::time::SystemTime;

use hashbrown::HashMap;
use parking_lot::Mutex;
use rayon::prelude::*;
use scan_accuracy::{AccuracyAnalysis, AccuracyMeasurement, AccuracyRequirements, AccuracyVerifier};
use scan_calibration::{
    CalibrationManager, CalibrationRecord, EnvironmentAnalyzer, EnvironmentAssessment,
    EnvironmentProfile, EnvironmentType,
};
use scan_collision::{CollisionDetector, CollisionUpdate};
use scan_governor::{ReclaimerHandle, ResourceGovernor, ResourceRequest};
use scan_optimize::{MeshOptimizer, OptimizeResult, OptimizedMesh};
use scan_recovery::{MonitorEvent, MonitorHandle, RecoveryManager, RecoveryPoint, RecoveryReport, RecoveryResult};
use scan_types::{
    AnalyticsSink, ContextId, EnvironmentSnapshot, FragmentId, QualityFeedback, RequirementLevel,
    ScanFrame, ScanId, ScanSessionHook, Timestamp,
};
use scan_validate::{MeshValidator, ValidateResult, ValidationContext, ValidationResult};
use tracing::{debug, info, warn};

use crate::{frame_metrics, Collaborators, PipelineConfig, PipelineError, PipelineResult};

/// Everything one [`ScanPipeline::process_frame`] call produced.
#[derive(Debug)]
pub struct FrameReport {
    /// Scan the frame belongs to.
    pub scan: ScanId,
    /// Frame timestamp.
    pub timestamp: Timestamp,
    /// One result per fragment, in frame order.
    pub validations: Vec<ValidationResult>,
    /// Accuracy of the whole frame.
    pub accuracy: AccuracyMeasurement,
    /// Obstacles and guidance, when collision detection is attached.
    pub collision: Option<CollisionUpdate>,
    /// Environment assessment, when analysis is attached.
    pub environment: Option<EnvironmentAssessment>,
    /// Calibration step, absent if the capture stack rejected the parameters.
    pub calibration: Option<CalibrationRecord>,
    /// Optimization of every accepted fragment. Rejected fragments are skipped.
    pub optimized: Vec<(FragmentId, OptimizeResult<OptimizedMesh>)>,
}

impl FrameReport {
    /// Fragments that passed validation.
    #[must_use]
    pub fn accepted(&self) -> usize {
        self.validations.iter().filter(|v| v.is_valid).count()
    }

    /// Fragments that failed validation.
    #[must_use]
    pub fn rejected(&self) -> usize {
        self.validations.len() - self.accepted()
    }

    /// True unless the device is inside an obstacle threshold or violates a zone.
    #[must_use]
    pub fn is_clear(&self) -> bool {
        self.collision.as_ref().map_or(true, CollisionUpdate::is_clear)
    }
}

/// Result of [`ScanPipeline::end_scan`].
#[derive(Debug, Clone)]
pub struct ScanSummary {
    /// Finished scan.
    pub scan: ScanId,
    /// Environment the scan was calibrated for.
    pub environment: EnvironmentType,
    /// Frames processed.
    pub frames: u64,
    /// Fragments accepted across all frames.
    pub accepted_fragments: u64,
    /// Fragments rejected across all frames.
    pub rejected_fragments: u64,
    /// Accuracy over the whole session.
    pub analysis: AccuracyAnalysis,
    /// The environment profile after folding in this session.
    pub profile: EnvironmentProfile,
}

#[derive(Debug, Clone, Copy)]
struct SessionContexts {
    verification: ContextId,
    collision: Option<ContextId>,
    analysis: Option<ContextId>,
    calibration: ContextId,
}

#[derive(Debug)]
struct ScanSession {
    environment: EnvironmentType,
    level: RequirementLevel,
    started: SystemTime,
    contexts: SessionContexts,
    monitor: MonitorHandle,
    frames: u64,
    accepted: u64,
    rejected: u64,
}

/// Runs every quality service against live scans.
///
/// Services are built once and shared across scans; each scan holds one
/// context per service. Collision detection and environment analysis are
/// opened as hooks of the verification session, so they start and stop with
/// it.
///
/// # Example
///
/// ```
/// use scan_calibration::EnvironmentType;
/// use scan_pipeline::{Collaborators, PipelineConfig, ScanPipeline};
/// use scan_types::{CameraState, EnvironmentSnapshot, ScanFrame, ScanId, Timestamp};
///
/// let pipeline = ScanPipeline::new(PipelineConfig::headless(), Collaborators::default());
/// pipeline
///     .begin_scan(ScanId(1), EnvironmentType::Research, &EnvironmentSnapshot::default())
///     .unwrap();
///
/// let frame = ScanFrame::new(Timestamp::from_secs(0.0), CameraState::default());
/// let report = pipeline.process_frame(ScanId(1), &frame).unwrap();
/// assert!(report.validations.is_empty());
///
/// let summary = pipeline.end_scan(ScanId(1)).unwrap();
/// assert_eq!(summary.frames, 1);
/// ```
pub struct ScanPipeline {
    config: PipelineConfig,
    governor: ResourceGovernor,
    validator: Arc<MeshValidator>,
    verifier: Arc<AccuracyVerifier>,
    collision: Arc<CollisionDetector>,
    environment: Arc<EnvironmentAnalyzer>,
    calibration: Arc<CalibrationManager>,
    optimizer: Arc<MeshOptimizer>,
    recovery: Arc<RecoveryManager>,
    analytics: Arc<dyn AnalyticsSink>,
    sessions: Mutex<HashMap<ScanId, ScanSession>>,
    reclaimer: Option<ReclaimerHandle>,
}

impl std::fmt::Debug for ScanPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanPipeline")
            .field("tier", &self.config.tier)
            .field("active", &self.sessions.lock().len())
            .field("reclaimer", &self.reclaimer.is_some())
            .finish_non_exhaustive()
    }
}

impl ScanPipeline {
    /// Builds every service from `config` and wires the feedback loops.
    ///
    /// Calibration profiles saved by a previous run are restored when
    /// `collaborators` has storage.
    #[must_use]
    pub fn new(config: PipelineConfig, collaborators: Collaborators) -> Self {
        let validator = Arc::new(MeshValidator::new(config.validation));
        let feedback: Arc<dyn QualityFeedback> = validator.clone();

        let collision = Arc::new(CollisionDetector::new(config.collision));
        let environment = Arc::new(EnvironmentAnalyzer::with_feedback(
            config.environment,
            vec![Arc::clone(&feedback)],
        ));
        let verifier = Arc::new(
            AccuracyVerifier::new(config.accuracy)
                .with_hook(collision.clone())
                .with_hook(environment.clone()),
        );

        let mut calibration = CalibrationManager::new(config.calibration).with_feedback(feedback);
        if let Some(target) = &collaborators.calibration_target {
            calibration = calibration.with_target(Arc::clone(target));
        }
        let recovery = match &collaborators.persistence {
            Some((storage, audit)) => {
                calibration = calibration.with_storage(Arc::clone(storage), Arc::clone(audit));
                RecoveryManager::with_storage(
                    config.recovery,
                    Arc::clone(&collaborators.recovery_target),
                    Arc::clone(storage),
                    Arc::clone(audit),
                )
            }
            None => RecoveryManager::new(config.recovery, Arc::clone(&collaborators.recovery_target)),
        };
        let restored = calibration.restore_profiles();

        let optimizer = match &collaborators.backend {
            Some(backend) => MeshOptimizer::with_backend(config.optimizer, Arc::clone(backend)),
            None => MeshOptimizer::new(config.optimizer),
        };

        let governor = ResourceGovernor::new(config.governor.clone());
        let reclaimer = config
            .spawn_reclaimer
            .then(|| governor.spawn_reclaimer(config.governor.reclaim_interval()));

        info!(
            tier = %config.tier,
            backend = optimizer.backend().name(),
            restored_profiles = restored,
            reclaimer = reclaimer.is_some(),
            "scan pipeline ready"
        );

        Self {
            config,
            governor,
            validator,
            verifier,
            collision,
            environment,
            calibration: Arc::new(calibration),
            optimizer: Arc::new(optimizer),
            recovery: Arc::new(recovery),
            analytics: collaborators.analytics,
            sessions: Mutex::new(HashMap::new()),
            reclaimer,
        }
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Shared resource governor.
    #[must_use]
    pub const fn governor(&self) -> &ResourceGovernor {
        &self.governor
    }

    /// Mesh validator.
    #[must_use]
    pub const fn validator(&self) -> &Arc<MeshValidator> {
        &self.validator
    }

    /// Accuracy verifier.
    #[must_use]
    pub const fn verifier(&self) -> &Arc<AccuracyVerifier> {
        &self.verifier
    }

    /// Collision detector.
    #[must_use]
    pub const fn collision(&self) -> &Arc<CollisionDetector> {
        &self.collision
    }

    /// Environment analyzer.
    #[must_use]
    pub const fn environment(&self) -> &Arc<EnvironmentAnalyzer> {
        &self.environment
    }

    /// Calibration manager.
    #[must_use]
    pub const fn calibration(&self) -> &Arc<CalibrationManager> {
        &self.calibration
    }

    /// Mesh optimizer.
    #[must_use]
    pub const fn optimizer(&self) -> &Arc<MeshOptimizer> {
        &self.optimizer
    }

    /// Recovery manager.
    #[must_use]
    pub const fn recovery(&self) -> &Arc<RecoveryManager> {
        &self.recovery
    }

    /// Whether `scan` has begun and not ended.
    #[must_use]
    pub fn is_active(&self, scan: ScanId) -> bool {
        self.sessions.lock().contains_key(&scan)
    }

    /// Active scans, sorted.
    #[must_use]
    pub fn active_scans(&self) -> Vec<ScanId> {
        let mut scans: Vec<_> = self.sessions.lock().keys().copied().collect();
        scans.sort_unstable();
        scans
    }

    /// Opens verification (with collision and environment hooks), calibration
    /// and interruption monitoring for `scan`.
    ///
    /// The validator starts from the environment profile's quality thresholds.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ScanActive`] if the scan is already running and
    /// [`PipelineError::Accuracy`] if a session hook refuses to start.
    pub fn begin_scan(
        &self,
        scan: ScanId,
        environment: EnvironmentType,
        snapshot: &EnvironmentSnapshot,
    ) -> PipelineResult<()> {
        let mut sessions = self.sessions.lock();
        if sessions.contains_key(&scan) {
            return Err(PipelineError::ScanActive { scan });
        }

        let level = environment.requirement_level();
        let verification = self.verifier.begin_verification(
            scan,
            AccuracyRequirements::for_level(level),
            snapshot,
        )?;
        let collision = self.verifier.hook_context(verification, self.collision.name())?;
        let analysis = self.verifier.hook_context(verification, self.environment.name())?;
        let calibration = self.calibration.begin_calibration(scan, environment);
        self.validator
            .apply_quality_parameters(scan, &self.calibration.parameters_for(environment).quality);
        let monitor = self.recovery.start_monitoring(scan);

        sessions.insert(
            scan,
            ScanSession {
                environment,
                level,
                started: SystemTime::now(),
                contexts: SessionContexts {
                    verification,
                    collision,
                    analysis,
                    calibration,
                },
                monitor,
                frames: 0,
                accepted: 0,
                rejected: 0,
            },
        );
        drop(sessions);

        info!(%scan, %environment, %level, "scan started");
        self.analytics.track(
            "scan.started",
            &[
                ("scan", scan.to_string()),
                ("environment", environment.to_string()),
                ("level", level.to_string()),
            ],
        );
        Ok(())
    }

    /// Runs one frame through the pipeline.
    ///
    /// The frame is admitted through the governor (charged per vertex plus
    /// one task slot, retried per the governor's policy). Fragment
    /// validation, accuracy measurement, obstacle clustering and environment
    /// sampling run concurrently. Their results are stored only once all of
    /// them succeed, so a failed frame leaves no history behind. The
    /// environment sample is attached to the verification session and its
    /// measurement. The frame's metrics drive one calibration step, and
    /// fragments that passed validation are optimized in parallel.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::ScanNotFound`] if the scan is not active
    /// - [`PipelineError::Governor`] if admission retries are exhausted
    /// - [`PipelineError::Validate`] if any fragment is malformed; nothing
    ///   from the frame is recorded
    ///
    /// A calibration step the capture stack rejects is logged and reported as
    /// `None`. Per-fragment optimization failures are reported in
    /// [`FrameReport::optimized`].
    pub fn process_frame(&self, scan: ScanId, frame: &ScanFrame) -> PipelineResult<FrameReport> {
        let contexts = self.contexts(scan)?;

        let request = ResourceRequest::new()
            .memory((frame.vertex_count() as u64).saturating_mul(self.config.bytes_per_vertex))
            .tasks(1);
        let lease = match self.governor.acquire_with_retry(request, &self.config.governor.retry) {
            Ok(lease) => lease,
            Err(err) => {
                warn!(%scan, error = %err, "frame refused");
                self.analytics.track(
                    "scan.frame_refused",
                    &[("scan", scan.to_string()), ("resource", err.kind().to_string())],
                );
                return Err(err.into());
            }
        };

        // Every branch only computes; state is written once all have succeeded.
        let validation = ValidationContext::new(scan);
        let ((validations, accuracy), (clusters, sample)) = rayon::join(
            || {
                rayon::join(
                    || {
                        frame
                            .fragments
                            .par_iter()
                            .map(|f| self.validator.evaluate(f, &validation))
                            .collect::<ValidateResult<Vec<_>>>()
                    },
                    || self.verifier.measure(contexts.verification, frame),
                )
            },
            || {
                rayon::join(
                    || contexts.collision.map(|_| self.collision.frame_clusters(frame)),
                    || {
                        contexts
                            .analysis
                            .map(|ctx| self.environment.sample_frame(ctx, frame))
                            .transpose()
                    },
                )
            },
        );
        let validations = validations?;
        let mut accuracy = accuracy?;
        let sample = sample?;

        let environment = sample
            .map(|sample| self.environment.commit_sample(sample))
            .transpose()?;
        if let Some(assessment) = &environment {
            self.verifier
                .record_conditions(contexts.verification, assessment.conditions)?;
            accuracy.conditions = assessment.conditions;
        }
        self.verifier
            .record_measurement(contexts.verification, accuracy)?;
        let collision = match (contexts.collision, clusters) {
            (Some(ctx), Some(clusters)) => Some(self.collision.apply_clusters(ctx, frame, &clusters)?),
            _ => None,
        };
        self.validator.record_results(scan, &validations);

        if let Some(update) = collision.as_ref().filter(|u| !u.is_clear()) {
            warn!(
                %scan,
                collisions = update.collisions.len(),
                violations = update.violations.len(),
                "collision risk"
            );
        }

        let metrics = frame_metrics(frame, &validations, &accuracy);
        let calibration = match self
            .calibration
            .calibrate(contexts.calibration, &accuracy.conditions, &metrics)
        {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(%scan, error = %err, "calibration step skipped");
                None
            }
        };

        let tier = self.config.tier;
        let optimized: Vec<_> = frame
            .fragments
            .par_iter()
            .zip(validations.par_iter())
            .filter(|(_, v)| v.is_valid)
            .map(|(f, _)| (f.id, self.optimizer.optimize(f, tier)))
            .collect();
        drop(lease);

        let report = FrameReport {
            scan,
            timestamp: frame.timestamp,
            validations,
            accuracy,
            collision,
            environment,
            calibration,
            optimized,
        };
        let (accepted, rejected) = (report.accepted(), report.rejected());
        if let Some(session) = self.sessions.lock().get_mut(&scan) {
            session.frames += 1;
            session.accepted += accepted as u64;
            session.rejected += rejected as u64;
        }

        debug!(
            %scan,
            timestamp = frame.timestamp.as_secs(),
            accepted,
            rejected,
            accuracy = report.accuracy.overall,
            clear = report.is_clear(),
            "frame processed"
        );
        self.analytics.track(
            "scan.frame_processed",
            &[
                ("scan", scan.to_string()),
                ("accepted", accepted.to_string()),
                ("rejected", rejected.to_string()),
                ("accuracy", format!("{:.3}", report.accuracy.overall)),
                ("clear", report.is_clear().to_string()),
            ],
        );
        Ok(report)
    }

    /// Queues an interruption signal for the scan's monitor thread.
    ///
    /// Returns `false` if the monitor has already stopped.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ScanNotFound`] if the scan is not active.
    pub fn report_event(&self, scan: ScanId, event: MonitorEvent) -> PipelineResult<bool> {
        let sessions = self.sessions.lock();
        let session = sessions.get(&scan).ok_or(PipelineError::ScanNotFound { scan })?;
        Ok(session.monitor.send(event))
    }

    /// Outcomes the scan's monitor produced since the last call.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ScanNotFound`] if the scan is not active.
    pub fn recovery_outcomes(&self, scan: ScanId) -> PipelineResult<Vec<RecoveryResult<RecoveryReport>>> {
        let sessions = self.sessions.lock();
        let session = sessions.get(&scan).ok_or(PipelineError::ScanNotFound { scan })?;
        Ok(session.monitor.outcomes().try_iter().collect())
    }

    /// Saves the frame as a named recovery point.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ScanNotFound`] if the scan is not active.
    pub fn checkpoint(
        &self,
        scan: ScanId,
        name: impl Into<String>,
        frame: &ScanFrame,
    ) -> PipelineResult<RecoveryPoint> {
        if !self.is_active(scan) {
            return Err(PipelineError::ScanNotFound { scan });
        }
        Ok(self.recovery.create_recovery_point(
            scan,
            name,
            frame.timestamp,
            frame.camera.pose,
            frame.fragments.clone(),
        ))
    }

    /// Closes every context the scan holds and folds its calibration history
    /// into the environment profile.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ScanNotFound`] if the scan is not active. The
    /// scan is removed even when closing a component fails.
    pub fn end_scan(&self, scan: ScanId) -> PipelineResult<ScanSummary> {
        let session = self
            .sessions
            .lock()
            .remove(&scan)
            .ok_or(PipelineError::ScanNotFound { scan })?;

        self.recovery.stop_monitoring(scan);
        session.monitor.stop();
        let analysis = self.verifier.end_verification(session.contexts.verification);
        let profile = self.calibration.end_calibration(session.contexts.calibration);
        self.validator.clear_scan(scan);
        let analysis = analysis?;
        let profile = profile?;

        let duration = session.started.elapsed().unwrap_or_default();
        info!(
            %scan,
            environment = %session.environment,
            level = %session.level,
            frames = session.frames,
            accuracy = analysis.mean_overall,
            meets_requirements = analysis.meets_requirements,
            duration_s = duration.as_secs_f64(),
            "scan completed"
        );
        self.analytics.track(
            "scan.completed",
            &[
                ("scan", scan.to_string()),
                ("frames", session.frames.to_string()),
                ("accuracy", format!("{:.3}", analysis.mean_overall)),
                ("meets_requirements", analysis.meets_requirements.to_string()),
            ],
        );

        Ok(ScanSummary {
            scan,
            environment: session.environment,
            frames: session.frames,
            accepted_fragments: session.accepted,
            rejected_fragments: session.rejected,
            analysis,
            profile,
        })
    }

    fn contexts(&self, scan: ScanId) -> PipelineResult<SessionContexts> {
        self.sessions
            .lock()
            .get(&scan)
            .map(|s| s.contexts)
            .ok_or(PipelineError::ScanNotFound { scan })
    }
}
