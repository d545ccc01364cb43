//! Trend classification, problem areas and improvement strategies.

use scan_types::{ScanId, Severity};
use serde::{Deserialize, Serialize};

use crate::{AccuracyMeasurement, AccuracyRequirements};

/// Direction of the overall score across a session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Trend {
    /// Overall score rising by `rate` per sample.
    Improving {
        /// Mean change per sample.
        rate: f64,
    },
    /// Overall score falling by `rate` per sample (positive value).
    Declining {
        /// Mean change per sample, as a magnitude.
        rate: f64,
    },
    /// No meaningful direction.
    Stable {
        /// Variance of the overall score.
        variance: f64,
    },
}

impl Trend {
    /// Classifies a series of overall scores.
    ///
    /// Fewer than two samples is stable with zero variance.
    #[must_use]
    pub fn classify(scores: &[f64], threshold: f64) -> Self {
        let (Some(first), Some(last)) = (scores.first(), scores.last()) else {
            return Self::Stable { variance: 0.0 };
        };
        if scores.len() < 2 {
            return Self::Stable { variance: 0.0 };
        }
        #[allow(clippy::cast_precision_loss)]
        let rate = (last - first) / (scores.len() - 1) as f64;
        if rate > threshold {
            Self::Improving { rate }
        } else if rate < -threshold {
            Self::Declining { rate: -rate }
        } else {
            Self::Stable {
                variance: variance(scores),
            }
        }
    }
}

/// What kind of accuracy problem was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProblemKind {
    /// Mesh density or coverage below target.
    LowResolution,
    /// Too few or poorly spread feature points.
    PoorTracking,
    /// Fragment transforms drift from unit scale.
    ScaleInaccuracy,
    /// Mesh quality fluctuates between frames.
    InconsistentMesh,
}

impl ProblemKind {
    /// Suggested corrective action.
    #[must_use]
    pub const fn action(self) -> &'static str {
        match self {
            Self::LowResolution => "move closer and slow down to capture denser geometry",
            Self::PoorTracking => "add texture or light so the camera can track more features",
            Self::ScaleInaccuracy => "recalibrate the device and rescan a reference area",
            Self::InconsistentMesh => "keep a steady distance and speed around the subject",
        }
    }
}

/// A flagged problem area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProblemArea {
    /// Problem kind.
    pub kind: ProblemKind,
    /// How bad it is.
    pub severity: Severity,
    /// Measured value that triggered it.
    pub value: f64,
}

/// A prioritized corrective action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImprovementStrategy {
    /// Problem this addresses.
    pub problem: ProblemKind,
    /// Priority, highest first in [`AccuracyAnalysis::strategies`].
    pub priority: Severity,
    /// What to do.
    pub action: String,
}

/// Summary of a verification session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyAnalysis {
    /// Scan the session belongs to.
    pub scan: ScanId,
    /// Number of measurements analyzed.
    pub samples: usize,
    /// Mean mesh quality.
    pub mean_mesh_quality: f64,
    /// Mean feature accuracy.
    pub mean_feature_accuracy: f64,
    /// Mean scale accuracy.
    pub mean_scale_accuracy: f64,
    /// Mean overall score.
    pub mean_overall: f64,
    /// Trend of the overall score.
    pub trend: Trend,
    /// Problems found.
    pub problem_areas: Vec<ProblemArea>,
    /// Strategies, highest priority first.
    pub strategies: Vec<ImprovementStrategy>,
    /// True when no problem area was flagged.
    pub meets_requirements: bool,
}

impl AccuracyAnalysis {
    /// Analyzes a measurement history against requirements.
    #[must_use]
    pub fn from_measurements(
        scan: ScanId,
        measurements: &[AccuracyMeasurement],
        requirements: &AccuracyRequirements,
    ) -> Self {
        let mesh: Vec<f64> = measurements.iter().map(|m| m.mesh_quality).collect();
        let feature: Vec<f64> = measurements.iter().map(|m| m.feature_accuracy).collect();
        let scale: Vec<f64> = measurements.iter().map(|m| m.scale_accuracy).collect();
        let overall: Vec<f64> = measurements.iter().map(|m| m.overall).collect();

        let (mean_mesh_quality, mean_feature_accuracy, mean_scale_accuracy) =
            (mean(&mesh), mean(&feature), mean(&scale));

        let mut problem_areas = Vec::new();
        if !measurements.is_empty() {
            let floors = [
                (ProblemKind::LowResolution, mean_mesh_quality, requirements.min_mesh_quality),
                (ProblemKind::PoorTracking, mean_feature_accuracy, requirements.min_feature_accuracy),
                (ProblemKind::ScaleInaccuracy, mean_scale_accuracy, requirements.min_scale_accuracy),
            ];
            for (kind, value, min) in floors {
                if value < min {
                    let severity = if value < 0.5 * min {
                        Severity::High
                    } else {
                        Severity::Medium
                    };
                    problem_areas.push(ProblemArea { kind, severity, value });
                }
            }
            let spread = variance(&mesh);
            if spread > requirements.max_quality_variance {
                problem_areas.push(ProblemArea {
                    kind: ProblemKind::InconsistentMesh,
                    severity: Severity::Medium,
                    value: spread,
                });
            }
        }

        let mut strategies: Vec<ImprovementStrategy> = problem_areas
            .iter()
            .map(|p| ImprovementStrategy {
                problem: p.kind,
                priority: p.severity,
                action: p.kind.action().to_string(),
            })
            .collect();
        strategies.sort_by(|a, b| b.priority.cmp(&a.priority));

        Self {
            scan,
            samples: measurements.len(),
            mean_mesh_quality,
            mean_feature_accuracy,
            mean_scale_accuracy,
            mean_overall: mean(&overall),
            trend: Trend::classify(&overall, requirements.trend_threshold),
            meets_requirements: problem_areas.is_empty(),
            problem_areas,
            strategies,
        }
    }

    /// Whether a problem of `kind` was flagged.
    #[must_use]
    pub fn has_problem(&self, kind: ProblemKind) -> bool {
        self.problem_areas.iter().any(|p| p.kind == kind)
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = values.len() as f64;
    values.iter().sum::<f64>() / n
}

fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    #[allow(clippy::cast_precision_loss)]
    let n = values.len() as f64;
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use scan_types::{EnvironmentConditions, Timestamp};

    fn sample(mesh: f64, feature: f64, scale: f64) -> AccuracyMeasurement {
        AccuracyMeasurement {
            timestamp: Timestamp::default(),
            mesh_quality: mesh,
            feature_accuracy: feature,
            scale_accuracy: scale,
            overall: (mesh + feature + scale) / 3.0,
            conditions: EnvironmentConditions::default(),
        }
    }

    #[test]
    fn trend_needs_two_samples() {
        assert_eq!(Trend::classify(&[], 0.01), Trend::Stable { variance: 0.0 });
        assert_eq!(Trend::classify(&[0.7], 0.01), Trend::Stable { variance: 0.0 });
    }

    #[test]
    fn trend_direction() {
        match Trend::classify(&[0.2, 0.4, 0.6], 0.01) {
            Trend::Improving { rate } => assert_relative_eq!(rate, 0.2, epsilon = 1e-12),
            other => panic!("expected improving, got {other:?}"),
        }
        match Trend::classify(&[0.9, 0.5], 0.01) {
            Trend::Declining { rate } => assert_relative_eq!(rate, 0.4, epsilon = 1e-12),
            other => panic!("expected declining, got {other:?}"),
        }
        match Trend::classify(&[0.5, 0.6, 0.5], 0.01) {
            Trend::Stable { variance } => assert!(variance > 0.0),
            other => panic!("expected stable, got {other:?}"),
        }
    }

    #[test]
    fn healthy_session_meets_requirements() {
        let history = vec![sample(0.9, 0.8, 0.95); 5];
        let analysis =
            AccuracyAnalysis::from_measurements(ScanId(1), &history, &AccuracyRequirements::default());
        assert!(analysis.meets_requirements);
        assert!(analysis.strategies.is_empty());
        assert_eq!(analysis.samples, 5);
        assert_relative_eq!(analysis.mean_mesh_quality, 0.9, epsilon = 1e-12);
    }

    #[test]
    fn problems_are_graded_and_sorted() {
        // Standard: mesh >= 0.5, feature >= 0.4, scale >= 0.6.
        let history = vec![sample(0.45, 0.1, 0.9); 4];
        let analysis =
            AccuracyAnalysis::from_measurements(ScanId(1), &history, &AccuracyRequirements::default());
        assert!(!analysis.meets_requirements);
        assert!(analysis.has_problem(ProblemKind::LowResolution));
        assert!(analysis.has_problem(ProblemKind::PoorTracking));
        assert!(!analysis.has_problem(ProblemKind::ScaleInaccuracy));

        assert_eq!(analysis.strategies[0].problem, ProblemKind::PoorTracking);
        assert_eq!(analysis.strategies[0].priority, Severity::High);
        assert_eq!(analysis.strategies[1].priority, Severity::Medium);
    }

    #[test]
    fn fluctuating_mesh_is_inconsistent() {
        let history = vec![
            sample(1.0, 0.9, 0.9),
            sample(0.5, 0.9, 0.9),
            sample(1.0, 0.9, 0.9),
            sample(0.5, 0.9, 0.9),
        ];
        let analysis =
            AccuracyAnalysis::from_measurements(ScanId(2), &history, &AccuracyRequirements::default());
        // Variance 0.0625 > 0.04.
        assert!(analysis.has_problem(ProblemKind::InconsistentMesh));
    }

    #[test]
    fn empty_history_has_no_problems() {
        let analysis =
            AccuracyAnalysis::from_measurements(ScanId(3), &[], &AccuracyRequirements::default());
        assert_eq!(analysis.samples, 0);
        assert!(analysis.meets_requirements);
        assert_eq!(analysis.trend, Trend::Stable { variance: 0.0 });
    }
}
