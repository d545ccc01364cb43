//! The environment analyzer service and its periodic sampler.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender};
use hashbrown::HashMap;
use parking_lot::Mutex;
use scan_history::{BoundedHistory, ContextRegistry};
use scan_types::{
    CollaboratorResult, ConditionDelta, ContextId, EnvironmentConditions, EnvironmentSnapshot,
    QualityFeedback, RequirementLevel, ScanFrame, ScanId, ScanSessionHook,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    assess, measure_conditions, CalibrationError, CalibrationResult, EnvironmentAssessment,
    EnvironmentThresholds, PreviousSample, Recommendation,
};

/// A measured but not yet stored environment sample.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentSample {
    /// Context the frame was measured for.
    pub context: ContextId,
    /// Pose and time of the frame, the motion reference for the next one.
    pub frame: PreviousSample,
    /// Measured conditions.
    pub conditions: EnvironmentConditions,
    /// Assessment of `conditions` against the context's thresholds.
    pub assessment: EnvironmentAssessment,
    /// Change against the context's current conditions.
    pub delta: ConditionDelta,
}

/// Environment analyzer settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Sampler cadence in milliseconds.
    pub sample_interval_ms: u64,
    /// Per-axis delta that is forwarded to quality control.
    pub significant_change: f64,
    /// Condition samples kept per context.
    pub history_capacity: usize,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 1_000,
            significant_change: 0.2,
            history_capacity: 60,
        }
    }
}

impl EnvironmentConfig {
    /// Sampler cadence.
    #[must_use]
    pub const fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }
}

/// Supplies the latest frame to the background sampler.
pub trait FrameSource: Send + Sync {
    /// Most recent frame for `scan`, or `None` if nothing new is available.
    fn latest_frame(&self, scan: ScanId) -> Option<ScanFrame>;
}

#[derive(Debug)]
struct AnalysisContext {
    scan: ScanId,
    level: RequirementLevel,
    thresholds: EnvironmentThresholds,
    previous: Option<PreviousSample>,
    current: EnvironmentConditions,
    assessment: Option<EnvironmentAssessment>,
    history: BoundedHistory<EnvironmentConditions>,
}

struct Shared {
    config: EnvironmentConfig,
    feedback: Vec<Arc<dyn QualityFeedback>>,
    contexts: Mutex<ContextRegistry<AnalysisContext>>,
}

struct Sampler {
    stop_tx: Option<Sender<()>>,
    thread_handle: Option<JoinHandle<()>>,
}

impl Sampler {
    fn stop(&mut self) {
        self.stop_tx = None;
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

/// Samples lighting, motion, surface and space conditions per scan.
///
/// Frames can be pushed synchronously with [`analyze_frame`](Self::analyze_frame)
/// or pulled from a [`FrameSource`] by a background sampler started with
/// [`start_analysis`](Self::start_analysis).
///
/// # Example
///
/// ```
/// use scan_calibration::EnvironmentAnalyzer;
/// use scan_types::{CameraState, EnvironmentSnapshot, RequirementLevel, ScanFrame, ScanId, Timestamp};
///
/// let analyzer = EnvironmentAnalyzer::default();
/// let ctx = analyzer.begin_analysis(ScanId(1), RequirementLevel::Standard, &EnvironmentSnapshot::default());
///
/// let frame = ScanFrame::new(Timestamp::from_secs(0.0), CameraState::default());
/// let assessment = analyzer.analyze_frame(ctx, &frame).unwrap();
/// assert!(assessment.conditions.motion.linear_speed == 0.0);
///
/// analyzer.stop_analysis(ctx);
/// assert!(analyzer.current_conditions(ctx).is_err());
/// ```
pub struct EnvironmentAnalyzer {
    shared: Arc<Shared>,
    samplers: Mutex<HashMap<ContextId, Sampler>>,
}

impl Default for EnvironmentAnalyzer {
    fn default() -> Self {
        Self::new(EnvironmentConfig::default())
    }
}

impl std::fmt::Debug for EnvironmentAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvironmentAnalyzer")
            .field("config", &self.shared.config)
            .field("active", &self.shared.contexts.lock().len())
            .field("samplers", &self.samplers.lock().len())
            .finish()
    }
}

impl EnvironmentAnalyzer {
    /// Creates an analyzer with no feedback targets.
    #[must_use]
    pub fn new(config: EnvironmentConfig) -> Self {
        Self::with_feedback(config, Vec::new())
    }

    /// Creates an analyzer that forwards significant changes to `feedback`.
    #[must_use]
    pub fn with_feedback(config: EnvironmentConfig, feedback: Vec<Arc<dyn QualityFeedback>>) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                feedback,
                contexts: Mutex::new(ContextRegistry::new()),
            }),
            samplers: Mutex::new(HashMap::new()),
        }
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &EnvironmentConfig {
        &self.shared.config
    }

    /// Number of active contexts.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.shared.contexts.lock().len()
    }

    /// Opens an analysis context seeded with the snapshot's conditions.
    pub fn begin_analysis(
        &self,
        scan: ScanId,
        level: RequirementLevel,
        snapshot: &EnvironmentSnapshot,
    ) -> ContextId {
        let mut history = BoundedHistory::new(self.shared.config.history_capacity);
        history.push(snapshot.conditions);
        let id = self.shared.contexts.lock().insert(AnalysisContext {
            scan,
            level,
            thresholds: EnvironmentThresholds::for_level(level),
            previous: None,
            current: snapshot.conditions,
            assessment: None,
            history,
        });
        info!(%scan, context = %id, %level, "environment analysis started");
        id
    }

    /// Opens a context and samples `source` every `sample_interval`.
    pub fn start_analysis(
        &self,
        scan: ScanId,
        level: RequirementLevel,
        snapshot: &EnvironmentSnapshot,
        source: Arc<dyn FrameSource>,
    ) -> ContextId {
        let id = self.begin_analysis(scan, level, snapshot);
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let shared = Arc::clone(&self.shared);
        let interval = shared.config.sample_interval();

        let handle = thread::spawn(move || {
            debug!(context = %id, interval_ms = interval.as_millis() as u64, "sampler started");
            loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        let Some(frame) = source.latest_frame(scan) else {
                            continue;
                        };
                        if shared.analyze(id, &frame).is_err() {
                            break;
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            debug!(context = %id, "sampler stopped");
        });

        self.samplers.lock().insert(
            id,
            Sampler {
                stop_tx: Some(stop_tx),
                thread_handle: Some(handle),
            },
        );
        id
    }

    /// Whether a background sampler is running for `context`.
    #[must_use]
    pub fn is_sampling(&self, context: ContextId) -> bool {
        self.samplers.lock().contains_key(&context)
    }

    /// Measures and assesses one frame.
    ///
    /// A change above `significant_change` on any axis since the previous
    /// sample is forwarded to every feedback target.
    ///
    /// # Errors
    ///
    /// Returns [`CalibrationError::ContextNotFound`] for an unknown or ended context.
    pub fn analyze_frame(&self, context: ContextId, frame: &ScanFrame) -> CalibrationResult<EnvironmentAssessment> {
        self.shared.analyze(context, frame)
    }

    /// Measures and assesses one frame without updating the context.
    ///
    /// Nothing is stored or forwarded until the sample is passed to
    /// [`commit_sample`](Self::commit_sample).
    ///
    /// # Errors
    ///
    /// Returns [`CalibrationError::ContextNotFound`] for an unknown or ended context.
    pub fn sample_frame(&self, context: ContextId, frame: &ScanFrame) -> CalibrationResult<EnvironmentSample> {
        self.shared.sample(context, frame)
    }

    /// Stores a sample from [`sample_frame`](Self::sample_frame) as the
    /// context's latest conditions, forwarding a significant change.
    ///
    /// # Errors
    ///
    /// Returns [`CalibrationError::ContextNotFound`] if the context ended in between.
    pub fn commit_sample(&self, sample: EnvironmentSample) -> CalibrationResult<EnvironmentAssessment> {
        self.shared.commit(sample)
    }

    /// Latest conditions for a context.
    ///
    /// # Errors
    ///
    /// Returns [`CalibrationError::ContextNotFound`] for an unknown or ended context.
    pub fn current_conditions(&self, context: ContextId) -> CalibrationResult<EnvironmentConditions> {
        self.shared
            .contexts
            .lock()
            .get(context)
            .map(|ctx| ctx.current)
            .ok_or(CalibrationError::not_found(context))
    }

    /// Recommendations from the latest assessment.
    ///
    /// # Errors
    ///
    /// Returns [`CalibrationError::ContextNotFound`] for an unknown or ended context.
    pub fn recommendations(&self, context: ContextId) -> CalibrationResult<Vec<Recommendation>> {
        self.shared
            .contexts
            .lock()
            .get(context)
            .map(|ctx| {
                ctx.assessment
                    .as_ref()
                    .map(|a| a.recommendations.clone())
                    .unwrap_or_default()
            })
            .ok_or(CalibrationError::not_found(context))
    }

    /// Condition samples for a context, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`CalibrationError::ContextNotFound`] for an unknown or ended context.
    pub fn condition_history(&self, context: ContextId) -> CalibrationResult<Vec<EnvironmentConditions>> {
        self.shared
            .contexts
            .lock()
            .get(context)
            .map(|ctx| ctx.history.snapshot())
            .ok_or(CalibrationError::not_found(context))
    }

    /// Requirement level of a context.
    ///
    /// # Errors
    ///
    /// Returns [`CalibrationError::ContextNotFound`] for an unknown or ended context.
    pub fn level(&self, context: ContextId) -> CalibrationResult<RequirementLevel> {
        self.shared
            .contexts
            .lock()
            .get(context)
            .map(|ctx| ctx.level)
            .ok_or(CalibrationError::not_found(context))
    }

    /// Ends a context and stops its sampler. Idempotent.
    ///
    /// Returns false if the context was already gone.
    pub fn stop_analysis(&self, context: ContextId) -> bool {
        let removed = self.shared.contexts.lock().remove(context);
        // Joined outside the context lock; the sampler may be waiting on it.
        let sampler = self.samplers.lock().remove(&context);
        if let Some(mut sampler) = sampler {
            sampler.stop();
        }
        match removed {
            Some(ctx) => {
                info!(scan = %ctx.scan, context = %context, samples = ctx.history.len(), "environment analysis stopped");
                true
            }
            None => false,
        }
    }
}

impl Drop for EnvironmentAnalyzer {
    fn drop(&mut self) {
        for (_, mut sampler) in self.samplers.get_mut().drain() {
            sampler.stop();
        }
    }
}

impl Shared {
    fn analyze(&self, context: ContextId, frame: &ScanFrame) -> CalibrationResult<EnvironmentAssessment> {
        let sample = self.sample(context, frame)?;
        self.commit(sample)
    }

    fn sample(&self, context: ContextId, frame: &ScanFrame) -> CalibrationResult<EnvironmentSample> {
        let (previous, fallback, thresholds) = {
            let contexts = self.contexts.lock();
            let ctx = contexts.get(context).ok_or(CalibrationError::not_found(context))?;
            (ctx.previous, ctx.current, ctx.thresholds)
        };

        let conditions = measure_conditions(frame, previous.as_ref(), &fallback);
        Ok(EnvironmentSample {
            context,
            frame: PreviousSample {
                timestamp: frame.timestamp,
                camera: frame.camera,
            },
            assessment: assess(&conditions, &thresholds),
            delta: conditions.delta(&fallback),
            conditions,
        })
    }

    fn commit(&self, sample: EnvironmentSample) -> CalibrationResult<EnvironmentAssessment> {
        let EnvironmentSample {
            context,
            frame,
            conditions,
            assessment,
            delta,
        } = sample;

        let scan = {
            let mut contexts = self.contexts.lock();
            let ctx = contexts
                .get_mut(context)
                .ok_or(CalibrationError::not_found(context))?;
            ctx.previous = Some(frame);
            ctx.current = conditions;
            ctx.history.push(conditions);
            ctx.assessment = Some(assessment.clone());
            ctx.scan
        };

        if delta.exceeds(self.config.significant_change) {
            self.forward(scan, &delta);
        }
        debug!(
            context = %context,
            suitable = assessment.suitable,
            recommendations = assessment.recommendations.len(),
            "environment sampled"
        );
        Ok(assessment)
    }

    fn forward(&self, scan: ScanId, delta: &ConditionDelta) {
        debug!(%scan, max_delta = delta.max(), "significant environment change");
        for target in &self.feedback {
            target.conditions_changed(scan, delta);
        }
    }
}

impl ScanSessionHook for EnvironmentAnalyzer {
    fn name(&self) -> &'static str {
        "environment"
    }

    fn open(
        &self,
        scan: ScanId,
        level: RequirementLevel,
        snapshot: &EnvironmentSnapshot,
    ) -> CollaboratorResult<ContextId> {
        Ok(self.begin_analysis(scan, level, snapshot))
    }

    fn close(&self, context: ContextId) {
        self.stop_analysis(context);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scan_types::{CameraState, LightEstimate, Point3, RecordingFeedback, Timestamp};
    use std::time::Instant;

    fn lit_frame(t: f64, lux: f64) -> ScanFrame {
        ScanFrame::new(Timestamp::from_secs(t), CameraState::default()).with_light(LightEstimate {
            ambient_intensity: lux,
            color_temperature: 5500.0,
        })
    }

    #[test]
    fn conditions_track_frames() {
        let analyzer = EnvironmentAnalyzer::default();
        let ctx = analyzer.begin_analysis(ScanId(1), RequirementLevel::Standard, &EnvironmentSnapshot::default());
        analyzer.analyze_frame(ctx, &lit_frame(0.0, 800.0)).unwrap();
        let c = analyzer.current_conditions(ctx).unwrap();
        assert!((c.lighting.ambient_intensity - 800.0).abs() < 1e-12);
        assert_eq!(analyzer.condition_history(ctx).unwrap().len(), 2);
    }

    #[test]
    fn sampling_waits_for_commit() {
        let feedback = RecordingFeedback::new();
        let analyzer = EnvironmentAnalyzer::with_feedback(
            EnvironmentConfig::default(),
            vec![feedback.clone() as Arc<dyn QualityFeedback>],
        );
        let ctx = analyzer.begin_analysis(ScanId(1), RequirementLevel::Standard, &EnvironmentSnapshot::default());
        let before = analyzer.current_conditions(ctx).unwrap();

        let sample = analyzer.sample_frame(ctx, &lit_frame(0.0, 5.0)).unwrap();
        assert_eq!(analyzer.current_conditions(ctx).unwrap(), before);
        assert_eq!(analyzer.condition_history(ctx).unwrap().len(), 1);
        assert!(feedback.deltas().is_empty());

        let assessment = analyzer.commit_sample(sample.clone()).unwrap();
        assert_eq!(assessment, sample.assessment);
        assert_eq!(analyzer.current_conditions(ctx).unwrap(), sample.conditions);
        assert_eq!(analyzer.condition_history(ctx).unwrap().len(), 2);

        analyzer.stop_analysis(ctx);
        assert!(analyzer.commit_sample(sample).is_err());
    }

    #[test]
    fn motion_uses_previous_frame() {
        let analyzer = EnvironmentAnalyzer::default();
        let ctx = analyzer.begin_analysis(ScanId(1), RequirementLevel::Standard, &EnvironmentSnapshot::default());
        analyzer.analyze_frame(ctx, &lit_frame(0.0, 800.0)).unwrap();
        let moved = ScanFrame::new(Timestamp::from_secs(1.0), CameraState::at(Point3::new(0.5, 0.0, 0.0)));
        let a = analyzer.analyze_frame(ctx, &moved).unwrap();
        assert!((a.conditions.motion.linear_speed - 0.5).abs() < 1e-9);
        assert!(!analyzer.recommendations(ctx).unwrap().is_empty());
    }

    #[test]
    fn significant_change_is_forwarded() {
        let feedback = RecordingFeedback::new();
        let analyzer = EnvironmentAnalyzer::with_feedback(
            EnvironmentConfig::default(),
            vec![feedback.clone() as Arc<dyn QualityFeedback>],
        );
        let ctx = analyzer.begin_analysis(ScanId(5), RequirementLevel::Standard, &EnvironmentSnapshot::default());

        // 1000 -> 950 lux is a 5% change.
        analyzer.analyze_frame(ctx, &lit_frame(0.0, 950.0)).unwrap();
        assert!(feedback.deltas().is_empty());

        // 950 -> 300 lux is well above 20%.
        analyzer.analyze_frame(ctx, &lit_frame(1.0, 300.0)).unwrap();
        let deltas = feedback.deltas();
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].0, ScanId(5));
    }

    #[test]
    fn stopped_context_is_gone() {
        let analyzer = EnvironmentAnalyzer::default();
        let ctx = analyzer.begin_analysis(ScanId(1), RequirementLevel::Basic, &EnvironmentSnapshot::default());
        assert!(analyzer.stop_analysis(ctx));
        assert!(!analyzer.stop_analysis(ctx));
        assert_eq!(
            analyzer.current_conditions(ctx),
            Err(CalibrationError::not_found(ctx))
        );
        assert!(analyzer.analyze_frame(ctx, &lit_frame(0.0, 500.0)).is_err());
    }

    struct ConstantSource;

    impl FrameSource for ConstantSource {
        fn latest_frame(&self, _scan: ScanId) -> Option<ScanFrame> {
            Some(lit_frame(0.0, 420.0))
        }
    }

    #[test]
    fn sampler_runs_until_stopped() {
        let analyzer = EnvironmentAnalyzer::new(EnvironmentConfig {
            sample_interval_ms: 5,
            ..EnvironmentConfig::default()
        });
        let ctx = analyzer.start_analysis(
            ScanId(1),
            RequirementLevel::Standard,
            &EnvironmentSnapshot::default(),
            Arc::new(ConstantSource),
        );
        assert!(analyzer.is_sampling(ctx));

        let deadline = Instant::now() + Duration::from_secs(2);
        while analyzer.condition_history(ctx).unwrap().len() < 3 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        let c = analyzer.current_conditions(ctx).unwrap();
        assert!((c.lighting.ambient_intensity - 420.0).abs() < 1e-12);

        let started = Instant::now();
        assert!(analyzer.stop_analysis(ctx));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(!analyzer.is_sampling(ctx));
    }
}
