//! Temporal and spatial coherence across consecutive fragments.

use std::fmt;

use scan_types::{MeshFragment, pose_rotation_angle, pose_translation};
use serde::{Deserialize, Serialize};

use crate::config::SequenceParams;
use crate::ValidationResult;

/// A coherence problem between fragment `index - 1` and fragment `index`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SequenceIssue {
    /// The timestamp went backwards.
    NonMonotonicTimestamp {
        /// Position of the later fragment.
        index: usize,
    },
    /// Too much time passed between fragments.
    TemporalGap {
        /// Position of the later fragment.
        index: usize,
        /// Gap in seconds.
        gap: f64,
    },
    /// The fragment transform jumped.
    PoseDiscontinuity {
        /// Position of the later fragment.
        index: usize,
        /// Translation between transforms, meters.
        translation: f64,
        /// Rotation between transforms, radians.
        rotation: f64,
    },
    /// World-space bounds drifted apart.
    RegistrationDrift {
        /// Position of the later fragment.
        index: usize,
        /// Gap between the bounds, meters.
        distance: f64,
    },
}

impl fmt::Display for SequenceIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonMonotonicTimestamp { index } => {
                write!(f, "fragment {index}: timestamp went backwards")
            }
            Self::TemporalGap { index, gap } => write!(f, "fragment {index}: {gap:.3}s gap"),
            Self::PoseDiscontinuity {
                index,
                translation,
                rotation,
            } => write!(
                f,
                "fragment {index}: pose jumped {translation:.3} m / {rotation:.3} rad"
            ),
            Self::RegistrationDrift { index, distance } => {
                write!(f, "fragment {index}: drifted {distance:.3} m")
            }
        }
    }
}

/// Outcome of validating a fragment sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceValidation {
    /// Per-fragment results, in input order.
    pub results: Vec<ValidationResult>,
    /// Sequence-level issues, in input order.
    pub issues: Vec<SequenceIssue>,
    /// False if any fragment is invalid or any sequence issue exists.
    pub is_valid: bool,
}

impl SequenceValidation {
    pub(crate) fn new(results: Vec<ValidationResult>, issues: Vec<SequenceIssue>) -> Self {
        let is_valid = issues.is_empty() && results.iter().all(|r| r.is_valid);
        Self {
            results,
            issues,
            is_valid,
        }
    }

    /// Mean confidence over all fragments (1.0 for an empty sequence).
    #[must_use]
    pub fn mean_confidence(&self) -> f64 {
        if self.results.is_empty() {
            return 1.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let n = self.results.len() as f64;
        self.results.iter().map(|r| r.confidence).sum::<f64>() / n
    }
}

/// Issues between two consecutive fragments.
pub(crate) fn check_pair(
    index: usize,
    prev: &MeshFragment,
    next: &MeshFragment,
    params: &SequenceParams,
) -> Vec<SequenceIssue> {
    let mut issues = Vec::new();

    let dt = next.timestamp.seconds_since(prev.timestamp);
    if dt < 0.0 {
        issues.push(SequenceIssue::NonMonotonicTimestamp { index });
    } else if dt > params.max_frame_gap {
        issues.push(SequenceIssue::TemporalGap { index, gap: dt });
    }

    let translation =
        (pose_translation(&next.transform) - pose_translation(&prev.transform)).norm();
    let rotation = pose_rotation_angle(&prev.transform, &next.transform);
    if translation > params.max_pose_translation || rotation > params.max_pose_rotation {
        issues.push(SequenceIssue::PoseDiscontinuity {
            index,
            translation,
            rotation,
        });
    }

    if let (Some(a), Some(b)) = (prev.world_bounds(), next.world_bounds()) {
        let distance = a.gap_to(&b);
        if distance > params.max_registration_drift {
            issues.push(SequenceIssue::RegistrationDrift { index, distance });
        }
    }

    issues
}
