//! The calibration manager: per-session parameter derivation and profile learning.

use std::sync::Arc;
use std::time::SystemTime;

use hashbrown::HashMap;
use parking_lot::Mutex;
use scan_history::{BoundedHistory, ContextRegistry};
use scan_types::{
    AuditSink, CollaboratorResult, ContextId, EnvironmentConditions, QualityFeedback,
    QualityMetrics, ScanId, SecureStorage,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    CalibrationError, CalibrationParameters, CalibrationResult, EnvironmentProfile,
    EnvironmentType, ProcessingParameters, ScanningParameters,
};

/// Light level exposure bias aims for.
const TARGET_LUX: f64 = 1_000.0;

/// Applies parameters to the capture/processing stack and reports accuracy.
pub trait CalibrationTarget: Send + Sync {
    /// Applies a parameter set to the live capture.
    ///
    /// # Errors
    ///
    /// Returns an error if the capture or processing stack rejects the parameters.
    fn apply(&self, scan: ScanId, parameters: &CalibrationParameters) -> CollaboratorResult<()>;

    /// Accuracy in `[0, 1]` achieved with the applied parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if no measurement is available.
    fn measure_accuracy(&self, scan: ScanId) -> CollaboratorResult<f64>;
}

/// Calibration manager settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Records kept per calibration session.
    pub history_capacity: usize,
    /// Blend factor used when folding a session into its profile.
    pub learning_rate: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            history_capacity: 50,
            learning_rate: 0.3,
        }
    }
}

/// One calibration step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    /// Wall-clock time of the step.
    pub recorded_at: SystemTime,
    /// Conditions the parameters were derived from.
    pub conditions: EnvironmentConditions,
    /// Reconstruction metrics at that time.
    pub metrics: QualityMetrics,
    /// Parameters applied.
    pub parameters: CalibrationParameters,
    /// Resulting accuracy in `[0, 1]`.
    pub accuracy: f64,
}

/// Derives a parameter set from a profile baseline and live measurements.
///
/// - exposure bias compensates light outside 500..5000 lux, within ±2 EV
/// - blur above 0.02 rad lowers the speed limit by a quarter
/// - texture below 0.3 points per vertex shortens the capture interval
/// - noise widens the spatial sigma and, above the quality limit, raises the
///   confidence threshold
/// - roughness widens the range sigma
/// - poor feature preservation raises the feature weight
#[must_use]
pub fn derive_parameters(
    baseline: &CalibrationParameters,
    conditions: &EnvironmentConditions,
    metrics: &QualityMetrics,
) -> CalibrationParameters {
    let lux = conditions.lighting.ambient_intensity.max(1.0);
    let exposure_bias = if (500.0..=5_000.0).contains(&lux) {
        baseline.scanning.exposure_bias
    } else {
        (TARGET_LUX / lux).log2().clamp(-2.0, 2.0)
    };
    let speed_factor = if conditions.motion.blur > 0.02 { 0.75 } else { 1.0 };
    let interval_factor = if conditions.surface.texture < 0.3 { 0.75 } else { 1.0 };

    let noise = metrics.noise_level.clamp(0.0, 1.0);
    let confidence_threshold = if noise > baseline.quality.max_noise_level {
        (baseline.processing.confidence_threshold + 0.1).min(0.95)
    } else {
        baseline.processing.confidence_threshold
    };
    let feature_weight = if metrics.feature_preservation < 0.5 {
        baseline.processing.feature_weight * 1.25
    } else {
        baseline.processing.feature_weight
    };

    #[allow(clippy::cast_possible_truncation)]
    let min_confidence = confidence_threshold as f32;
    CalibrationParameters {
        scanning: ScanningParameters {
            target_vertex_density: baseline.scanning.target_vertex_density,
            max_linear_speed: baseline.scanning.max_linear_speed * speed_factor,
            capture_interval_ms: baseline.scanning.capture_interval_ms * interval_factor,
            exposure_bias,
        },
        processing: ProcessingParameters {
            spatial_sigma: baseline.processing.spatial_sigma * (1.0 + noise),
            range_sigma: baseline.processing.range_sigma
                * (1.0 + conditions.surface.roughness.clamp(0.0, 1.0)),
            confidence_threshold,
            feature_weight,
        },
        quality: scan_types::QualityParameters {
            min_confidence,
            ..baseline.quality
        },
    }
}

#[derive(Debug)]
struct CalibrationSession {
    scan: ScanId,
    environment: EnvironmentType,
    current: CalibrationParameters,
    records: BoundedHistory<CalibrationRecord>,
}

/// Derives, applies and learns calibration parameters.
///
/// Profiles for every [`EnvironmentType`] exist from construction with seeded
/// defaults; [`end_calibration`](Self::end_calibration) is the only place they
/// change.
///
/// # Example
///
/// ```
/// use scan_calibration::{CalibrationManager, CalibrationParameters, EnvironmentType};
/// use scan_types::{EnvironmentConditions, QualityMetrics, ScanId};
///
/// let manager = CalibrationManager::default();
/// assert_eq!(
///     manager.parameters_for(EnvironmentType::Dental),
///     CalibrationParameters::seeded(EnvironmentType::Dental),
/// );
///
/// let ctx = manager.begin_calibration(ScanId(1), EnvironmentType::Research);
/// let record = manager
///     .calibrate(ctx, &EnvironmentConditions::default(), &QualityMetrics::default())
///     .unwrap();
/// assert!(record.accuracy >= 0.0 && record.accuracy <= 1.0);
///
/// let profile = manager.end_calibration(ctx).unwrap();
/// assert_eq!(profile.sessions_completed, 1);
/// ```
pub struct CalibrationManager {
    config: CalibrationConfig,
    profiles: Mutex<HashMap<EnvironmentType, EnvironmentProfile>>,
    sessions: Mutex<ContextRegistry<CalibrationSession>>,
    target: Option<Arc<dyn CalibrationTarget>>,
    feedback: Vec<Arc<dyn QualityFeedback>>,
    storage: Option<Arc<dyn SecureStorage>>,
    audit: Option<Arc<dyn AuditSink>>,
}

impl Default for CalibrationManager {
    fn default() -> Self {
        Self::new(CalibrationConfig::default())
    }
}

impl std::fmt::Debug for CalibrationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalibrationManager")
            .field("config", &self.config)
            .field("sessions", &self.sessions.lock().len())
            .field("has_target", &self.target.is_some())
            .field("feedback", &self.feedback.len())
            .finish_non_exhaustive()
    }
}

impl CalibrationManager {
    /// Creates a manager with seeded profiles and no collaborators.
    #[must_use]
    pub fn new(config: CalibrationConfig) -> Self {
        let profiles = EnvironmentType::ALL
            .iter()
            .map(|&env| (env, EnvironmentProfile::seeded(env)))
            .collect();
        Self {
            config,
            profiles: Mutex::new(profiles),
            sessions: Mutex::new(ContextRegistry::new()),
            target: None,
            feedback: Vec::new(),
            storage: None,
            audit: None,
        }
    }

    /// Sets the capture/processing collaborator.
    #[must_use]
    pub fn with_target(mut self, target: Arc<dyn CalibrationTarget>) -> Self {
        self.target = Some(target);
        self
    }

    /// Adds a quality-control feedback target.
    #[must_use]
    pub fn with_feedback(mut self, feedback: Arc<dyn QualityFeedback>) -> Self {
        self.feedback.push(feedback);
        self
    }

    /// Persists profile snapshots to `storage`, auditing failures to `audit`.
    #[must_use]
    pub fn with_storage(mut self, storage: Arc<dyn SecureStorage>, audit: Arc<dyn AuditSink>) -> Self {
        self.storage = Some(storage);
        self.audit = Some(audit);
        self
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// Current profile for an environment.
    #[must_use]
    pub fn profile(&self, environment: EnvironmentType) -> EnvironmentProfile {
        self.profiles
            .lock()
            .get(&environment)
            .cloned()
            .unwrap_or_else(|| EnvironmentProfile::seeded(environment))
    }

    /// Baseline parameters for an environment, the seeded default until a
    /// session has been folded in.
    #[must_use]
    pub fn parameters_for(&self, environment: EnvironmentType) -> CalibrationParameters {
        self.profile(environment).baseline
    }

    /// Opens a calibration session starting from the environment's baseline.
    pub fn begin_calibration(&self, scan: ScanId, environment: EnvironmentType) -> ContextId {
        let current = self.parameters_for(environment);
        let id = self.sessions.lock().insert(CalibrationSession {
            scan,
            environment,
            current,
            records: BoundedHistory::new(self.config.history_capacity),
        });
        info!(%scan, context = %id, %environment, "calibration started");
        id
    }

    /// Derives parameters from live measurements, applies them, measures the
    /// result and records the step.
    ///
    /// The new quality parameters are pushed to every feedback target.
    ///
    /// # Errors
    ///
    /// Returns [`CalibrationError::ContextNotFound`] for an unknown or ended
    /// context and [`CalibrationError::Target`] if the target rejects the
    /// parameters or cannot measure.
    pub fn calibrate(
        &self,
        context: ContextId,
        conditions: &EnvironmentConditions,
        metrics: &QualityMetrics,
    ) -> CalibrationResult<CalibrationRecord> {
        let (scan, environment) = {
            let sessions = self.sessions.lock();
            let s = sessions.get(context).ok_or(CalibrationError::not_found(context))?;
            (s.scan, s.environment)
        };
        let baseline = self.parameters_for(environment);
        let parameters = derive_parameters(&baseline, conditions, metrics);

        let accuracy = match &self.target {
            Some(target) => {
                target.apply(scan, &parameters)?;
                target.measure_accuracy(scan)?
            }
            None => metrics.score(parameters.quality.min_vertex_density),
        }
        .clamp(0.0, 1.0);

        let record = CalibrationRecord {
            recorded_at: SystemTime::now(),
            conditions: *conditions,
            metrics: *metrics,
            parameters,
            accuracy,
        };
        {
            let mut sessions = self.sessions.lock();
            let s = sessions
                .get_mut(context)
                .ok_or(CalibrationError::not_found(context))?;
            s.current = parameters;
            s.records.push(record.clone());
        }

        for target in &self.feedback {
            target.apply_quality_parameters(scan, &parameters.quality);
        }
        debug!(%scan, context = %context, accuracy, "calibration step recorded");
        Ok(record)
    }

    /// Parameters most recently applied in a session.
    ///
    /// # Errors
    ///
    /// Returns [`CalibrationError::ContextNotFound`] for an unknown or ended context.
    pub fn current_parameters(&self, context: ContextId) -> CalibrationResult<CalibrationParameters> {
        self.sessions
            .lock()
            .get(context)
            .map(|s| s.current)
            .ok_or(CalibrationError::not_found(context))
    }

    /// Records of a session, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`CalibrationError::ContextNotFound`] for an unknown or ended context.
    pub fn calibration_history(&self, context: ContextId) -> CalibrationResult<Vec<CalibrationRecord>> {
        self.sessions
            .lock()
            .get(context)
            .map(|s| s.records.snapshot())
            .ok_or(CalibrationError::not_found(context))
    }

    /// Ends a session and folds its best record into the environment profile.
    ///
    /// The baseline moves `learning_rate` of the way toward the best record's
    /// parameters when that record beats the profile's best accuracy. The
    /// updated profile is snapshotted to secure storage when configured.
    ///
    /// # Errors
    ///
    /// Returns [`CalibrationError::ContextNotFound`] if the context is unknown
    /// or already ended.
    pub fn end_calibration(&self, context: ContextId) -> CalibrationResult<EnvironmentProfile> {
        let session = self
            .sessions
            .lock()
            .remove(context)
            .ok_or(CalibrationError::not_found(context))?;

        let best = session
            .records
            .iter()
            .max_by(|a, b| a.accuracy.total_cmp(&b.accuracy))
            .cloned();

        let profile = {
            let mut profiles = self.profiles.lock();
            let profile = profiles
                .entry(session.environment)
                .or_insert_with(|| EnvironmentProfile::seeded(session.environment));
            if let Some(best) = &best {
                if best.accuracy > profile.best_accuracy {
                    profile.baseline = profile.baseline.blend(&best.parameters, self.config.learning_rate);
                    profile.best_accuracy = best.accuracy;
                }
            }
            profile.sessions_completed += 1;
            profile.updated = Some(SystemTime::now());
            profile.clone()
        };

        info!(
            scan = %session.scan,
            context = %context,
            environment = %session.environment,
            steps = session.records.len(),
            best_accuracy = profile.best_accuracy,
            sessions = profile.sessions_completed,
            "calibration ended"
        );
        self.persist(&profile);
        Ok(profile)
    }

    /// Reloads profile snapshots from secure storage. Returns how many were restored.
    pub fn restore_profiles(&self) -> usize {
        let Some(storage) = &self.storage else {
            return 0;
        };
        let mut restored = 0;
        for env in EnvironmentType::ALL {
            let bytes = match storage.load(&storage_key(env)) {
                Ok(Some(bytes)) => bytes,
                Ok(None) => continue,
                Err(e) => {
                    warn!(environment = %env, error = %e, "profile snapshot unavailable");
                    continue;
                }
            };
            match serde_json::from_slice::<EnvironmentProfile>(&bytes) {
                Ok(profile) if profile.environment == env => {
                    self.profiles.lock().insert(env, profile);
                    restored += 1;
                }
                Ok(_) => warn!(environment = %env, "profile snapshot has wrong environment"),
                Err(e) => warn!(environment = %env, error = %e, "profile snapshot is corrupt"),
            }
        }
        restored
    }

    fn persist(&self, profile: &EnvironmentProfile) {
        let Some(storage) = &self.storage else {
            return;
        };
        let result = serde_json::to_vec(profile)
            .map_err(|e| e.to_string())
            .and_then(|bytes| {
                storage
                    .store(&storage_key(profile.environment), &bytes)
                    .map_err(|e| e.to_string())
            });
        if let Err(reason) = result {
            warn!(environment = %profile.environment, %reason, "profile snapshot failed");
            if let Some(audit) = &self.audit {
                let detail = format!("environment={} reason={reason}", profile.environment);
                if let Err(e) = audit.record("calibration.snapshot_failed", &detail) {
                    warn!(error = %e, "audit record failed");
                }
            }
        }
    }
}

fn storage_key(environment: EnvironmentType) -> String {
    format!("calibration/profile/{environment}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use scan_types::{CollaboratorError, MemoryAuditLog, MemoryStorage, RecordingFeedback};

    struct FixedTarget {
        accuracy: f64,
        applied: Mutex<Vec<CalibrationParameters>>,
        reject: bool,
    }

    impl FixedTarget {
        fn new(accuracy: f64) -> Arc<Self> {
            Arc::new(Self {
                accuracy,
                applied: Mutex::new(Vec::new()),
                reject: false,
            })
        }
    }

    impl CalibrationTarget for FixedTarget {
        fn apply(&self, _scan: ScanId, parameters: &CalibrationParameters) -> CollaboratorResult<()> {
            if self.reject {
                return Err(CollaboratorError::rejected("exposure locked"));
            }
            self.applied.lock().push(*parameters);
            Ok(())
        }

        fn measure_accuracy(&self, _scan: ScanId) -> CollaboratorResult<f64> {
            Ok(self.accuracy)
        }
    }

    fn good_metrics() -> QualityMetrics {
        QualityMetrics {
            point_density: 5_000.0,
            surface_completeness: 0.95,
            noise_level: 0.05,
            feature_preservation: 0.9,
        }
    }

    #[test]
    fn dark_noisy_scene_adjusts_parameters() {
        let baseline = CalibrationParameters::seeded(EnvironmentType::Medical);
        let mut conditions = EnvironmentConditions::default();
        conditions.lighting.ambient_intensity = 250.0;
        conditions.motion.blur = 0.05;
        let metrics = QualityMetrics {
            noise_level: 0.5,
            feature_preservation: 0.2,
            ..good_metrics()
        };
        let p = derive_parameters(&baseline, &conditions, &metrics);
        assert_relative_eq!(p.scanning.exposure_bias, 2.0);
        assert_relative_eq!(p.scanning.max_linear_speed, 0.075, epsilon = 1e-12);
        assert_relative_eq!(p.processing.confidence_threshold, 0.8, epsilon = 1e-12);
        assert_relative_eq!(p.processing.feature_weight, 1.875, epsilon = 1e-12);
        assert!(p.processing.spatial_sigma > baseline.processing.spatial_sigma);
        assert_relative_eq!(f64::from(p.quality.min_confidence), 0.8, epsilon = 1e-6);
    }

    #[test]
    fn calm_scene_keeps_baseline() {
        let baseline = CalibrationParameters::seeded(EnvironmentType::Research);
        let metrics = QualityMetrics {
            noise_level: 0.0,
            ..good_metrics()
        };
        let p = derive_parameters(&baseline, &EnvironmentConditions::default(), &metrics);
        assert_eq!(p, baseline);
    }

    #[test]
    fn dental_without_history_uses_seeded_profile() {
        let manager = CalibrationManager::default();
        let profile = manager.profile(EnvironmentType::Dental);
        assert_eq!(profile.sessions_completed, 0);
        assert_eq!(profile.baseline, CalibrationParameters::seeded(EnvironmentType::Dental));

        let ctx = manager.begin_calibration(ScanId(1), EnvironmentType::Dental);
        assert_eq!(
            manager.current_parameters(ctx).unwrap(),
            CalibrationParameters::seeded(EnvironmentType::Dental)
        );
    }

    #[test]
    fn calibrate_applies_and_pushes_quality() {
        let target = FixedTarget::new(0.8);
        let feedback = RecordingFeedback::new();
        let manager = CalibrationManager::default()
            .with_target(target.clone())
            .with_feedback(feedback.clone());
        let ctx = manager.begin_calibration(ScanId(3), EnvironmentType::Medical);

        let record = manager
            .calibrate(ctx, &EnvironmentConditions::default(), &good_metrics())
            .unwrap();
        assert_relative_eq!(record.accuracy, 0.8);
        assert_eq!(target.applied.lock().len(), 1);
        assert_eq!(feedback.parameters().len(), 1);
        assert_eq!(feedback.parameters()[0].0, ScanId(3));
    }

    #[test]
    fn rejected_parameters_are_not_recorded() {
        let target = Arc::new(FixedTarget {
            accuracy: 0.5,
            applied: Mutex::new(Vec::new()),
            reject: true,
        });
        let manager = CalibrationManager::default().with_target(target);
        let ctx = manager.begin_calibration(ScanId(1), EnvironmentType::Research);
        let err = manager
            .calibrate(ctx, &EnvironmentConditions::default(), &good_metrics())
            .unwrap_err();
        assert!(matches!(err, CalibrationError::Target(_)));
        assert!(manager.calibration_history(ctx).unwrap().is_empty());
    }

    #[test]
    fn history_is_capped() {
        let manager = CalibrationManager::new(CalibrationConfig {
            history_capacity: 3,
            ..CalibrationConfig::default()
        });
        let ctx = manager.begin_calibration(ScanId(1), EnvironmentType::Research);
        for _ in 0..10 {
            manager
                .calibrate(ctx, &EnvironmentConditions::default(), &good_metrics())
                .unwrap();
        }
        assert_eq!(manager.calibration_history(ctx).unwrap().len(), 3);
    }

    #[test]
    fn end_folds_best_record_into_profile() {
        let manager = CalibrationManager::new(CalibrationConfig {
            learning_rate: 1.0,
            ..CalibrationConfig::default()
        });
        let ctx = manager.begin_calibration(ScanId(1), EnvironmentType::Research);
        let mut dark = EnvironmentConditions::default();
        dark.lighting.ambient_intensity = 250.0;
        let record = manager.calibrate(ctx, &dark, &good_metrics()).unwrap();

        let profile = manager.end_calibration(ctx).unwrap();
        assert_eq!(profile.sessions_completed, 1);
        assert_relative_eq!(profile.best_accuracy, record.accuracy);
        assert_eq!(profile.baseline, record.parameters);
        assert_eq!(manager.parameters_for(EnvironmentType::Research), record.parameters);
        assert_eq!(
            manager.end_calibration(ctx),
            Err(CalibrationError::not_found(ctx))
        );
    }

    #[test]
    fn profiles_round_trip_through_storage() {
        let storage = Arc::new(MemoryStorage::new());
        let audit = Arc::new(MemoryAuditLog::new());
        let manager = CalibrationManager::default().with_storage(storage.clone(), audit.clone());
        let ctx = manager.begin_calibration(ScanId(1), EnvironmentType::Dental);
        manager.calibrate(ctx, &EnvironmentConditions::default(), &good_metrics()).unwrap();
        let saved = manager.end_calibration(ctx).unwrap();

        let fresh = CalibrationManager::default().with_storage(storage, audit.clone());
        assert_eq!(fresh.restore_profiles(), 1);
        assert_eq!(fresh.profile(EnvironmentType::Dental), saved);
        assert!(audit.records().is_empty());
    }

    #[test]
    fn failed_snapshot_is_audited() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set_available(false);
        let audit = Arc::new(MemoryAuditLog::new());
        let manager = CalibrationManager::default().with_storage(storage, audit.clone());
        let ctx = manager.begin_calibration(ScanId(1), EnvironmentType::Medical);
        manager.end_calibration(ctx).unwrap();

        let records = audit.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event, "calibration.snapshot_failed");
    }
}
