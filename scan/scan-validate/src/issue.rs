//! Validation issues and results.

use std::fmt;

use scan_types::{FragmentId, Severity, Timestamp};
use serde::{Deserialize, Serialize};

/// Which sub-check produced an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Check {
    /// Manifoldness, holes and orientation.
    Topology,
    /// Degenerate faces, vertex density and self-intersection.
    Geometry,
    /// Unreferenced vertices and invalid face indices.
    Connectivity,
    /// Triangle shape and surface roughness.
    Quality,
}

/// A defect found in a mesh fragment.
///
/// Severity is fixed by the variant; callers cannot override it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ValidationIssue {
    /// Edges shared by more than two faces.
    NonManifoldEdges {
        /// Edge count.
        count: usize,
    },
    /// Boundary loops beyond each patch's outer rim.
    Holes {
        /// Hole count.
        count: usize,
    },
    /// Interior edges traversed in the same direction by both faces.
    InconsistentOrientation {
        /// Offending edge count.
        edges: usize,
    },
    /// Faces with (near) zero area.
    DegenerateTriangles {
        /// Face count.
        count: usize,
    },
    /// Too few vertices per square meter.
    LowVertexDensity {
        /// Measured density, vertices per m².
        value: f64,
    },
    /// Pairs of faces that cross each other.
    IntersectingTriangles {
        /// Pair count.
        count: usize,
    },
    /// Vertices referenced by no face.
    DisconnectedVertices {
        /// Vertex count.
        count: usize,
    },
    /// Faces with out-of-range or repeated indices.
    InvalidFaceConnectivity {
        /// Face count.
        faces: usize,
    },
    /// Too many badly shaped triangles.
    PoorTriangleQuality {
        /// Poor triangle count.
        count: usize,
    },
    /// Mean angle between adjacent face normals is too large.
    ExcessiveRoughness {
        /// Mean angle, radians.
        value: f64,
    },
}

impl ValidationIssue {
    /// Intrinsic severity of this issue kind.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::InvalidFaceConnectivity { .. } => Severity::Critical,
            Self::NonManifoldEdges { .. }
            | Self::DegenerateTriangles { .. }
            | Self::IntersectingTriangles { .. } => Severity::High,
            Self::Holes { .. }
            | Self::InconsistentOrientation { .. }
            | Self::LowVertexDensity { .. }
            | Self::DisconnectedVertices { .. } => Severity::Medium,
            Self::PoorTriangleQuality { .. } | Self::ExcessiveRoughness { .. } => Severity::Low,
        }
    }

    /// Sub-check that reports this issue.
    #[must_use]
    pub const fn check(&self) -> Check {
        match self {
            Self::NonManifoldEdges { .. }
            | Self::Holes { .. }
            | Self::InconsistentOrientation { .. } => Check::Topology,
            Self::DegenerateTriangles { .. }
            | Self::LowVertexDensity { .. }
            | Self::IntersectingTriangles { .. } => Check::Geometry,
            Self::DisconnectedVertices { .. } | Self::InvalidFaceConnectivity { .. } => {
                Check::Connectivity
            }
            Self::PoorTriangleQuality { .. } | Self::ExcessiveRoughness { .. } => Check::Quality,
        }
    }

    /// Suggested operator action.
    #[must_use]
    pub const fn recommendation(&self) -> &'static str {
        match self {
            Self::NonManifoldEdges { .. } => "Rescan the area; overlapping surfaces were merged",
            Self::Holes { .. } => "Cover the missing regions from another angle",
            Self::InconsistentOrientation { .. } => "Recompute face winding before export",
            Self::DegenerateTriangles { .. } => "Remove collapsed triangles",
            Self::LowVertexDensity { .. } => "Move closer or slow down to capture more detail",
            Self::IntersectingTriangles { .. } => "Rescan; the surface folds through itself",
            Self::DisconnectedVertices { .. } => "Discard unreferenced vertices",
            Self::InvalidFaceConnectivity { .. } => "Drop the fragment; its index buffer is corrupt",
            Self::PoorTriangleQuality { .. } => "Remesh to improve triangle shape",
            Self::ExcessiveRoughness { .. } => "Hold the device steady to reduce surface noise",
        }
    }

    /// Confidence penalty contributed by this issue.
    #[must_use]
    pub const fn penalty(&self) -> f64 {
        severity_penalty(self.severity())
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonManifoldEdges { count } => write!(f, "{count} non-manifold edges"),
            Self::Holes { count } => write!(f, "{count} holes"),
            Self::InconsistentOrientation { edges } => {
                write!(f, "inconsistent orientation on {edges} edges")
            }
            Self::DegenerateTriangles { count } => write!(f, "{count} degenerate triangles"),
            Self::LowVertexDensity { value } => write!(f, "low vertex density ({value:.1}/m²)"),
            Self::IntersectingTriangles { count } => write!(f, "{count} intersecting triangle pairs"),
            Self::DisconnectedVertices { count } => write!(f, "{count} disconnected vertices"),
            Self::InvalidFaceConnectivity { faces } => write!(f, "{faces} invalid faces"),
            Self::PoorTriangleQuality { count } => write!(f, "{count} poor quality triangles"),
            Self::ExcessiveRoughness { value } => write!(f, "excessive roughness ({value:.3} rad)"),
        }
    }
}

/// Confidence penalty per severity.
#[must_use]
pub const fn severity_penalty(severity: Severity) -> f64 {
    match severity {
        Severity::Low => 0.05,
        Severity::Medium => 0.15,
        Severity::High => 0.3,
        Severity::Critical => 0.5,
    }
}

/// Per-check confidences that were averaged into the result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CheckConfidence {
    /// Topology check.
    pub topology: f64,
    /// Geometry check.
    pub geometry: f64,
    /// Connectivity check.
    pub connectivity: f64,
    /// Quality check.
    pub quality: f64,
}

impl CheckConfidence {
    /// Unweighted mean of the four checks.
    #[must_use]
    pub fn mean(&self) -> f64 {
        (self.topology + self.geometry + self.connectivity + self.quality) / 4.0
    }
}

/// Outcome of validating one fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Validated fragment.
    pub fragment: FragmentId,
    /// Capture time of the fragment.
    pub timestamp: Timestamp,
    /// True iff no issue is high severity or worse.
    pub is_valid: bool,
    /// Issues in check order (topology, geometry, connectivity, quality).
    pub issues: Vec<ValidationIssue>,
    /// Aggregate confidence in `[0, 1]`.
    pub confidence: f64,
    /// Per-check confidences.
    pub checks: CheckConfidence,
    /// One recommendation per issue kind.
    pub recommendations: Vec<String>,
}

impl ValidationResult {
    pub(crate) fn combine(
        fragment: FragmentId,
        timestamp: Timestamp,
        outcomes: [CheckOutcome; 4],
    ) -> Self {
        let [topology, geometry, connectivity, quality] = outcomes;
        let checks = CheckConfidence {
            topology: topology.confidence,
            geometry: geometry.confidence,
            connectivity: connectivity.confidence,
            quality: quality.confidence,
        };
        let issues: Vec<ValidationIssue> = [topology, geometry, connectivity, quality]
            .into_iter()
            .flat_map(|o| o.issues)
            .collect();
        let is_valid = issues.iter().all(|i| !i.severity().is_blocking());
        let recommendations = issues
            .iter()
            .map(|i| i.recommendation().to_string())
            .collect();

        Self {
            fragment,
            timestamp,
            is_valid,
            issues,
            confidence: checks.mean().clamp(0.0, 1.0),
            checks,
            recommendations,
        }
    }

    /// Highest severity among the issues.
    #[must_use]
    pub fn max_severity(&self) -> Option<Severity> {
        self.issues.iter().map(ValidationIssue::severity).max()
    }

    /// Issues of a given severity or worse.
    pub fn issues_at_least(&self, severity: Severity) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(move |i| i.severity() >= severity)
    }
}

/// Issues and confidence from one sub-check.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct CheckOutcome {
    pub issues: Vec<ValidationIssue>,
    pub confidence: f64,
}

impl CheckOutcome {
    /// Confidence is `1 - Σ penalty`, clamped to `[0, 1]`.
    pub fn from_issues(issues: Vec<ValidationIssue>) -> Self {
        let penalty: f64 = issues.iter().map(ValidationIssue::penalty).sum();
        Self {
            issues,
            confidence: (1.0 - penalty).clamp(0.0, 1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn severity_is_fixed_by_kind() {
        assert_eq!(
            ValidationIssue::InvalidFaceConnectivity { faces: 1 }.severity(),
            Severity::Critical
        );
        assert_eq!(
            ValidationIssue::DegenerateTriangles { count: 1 }.severity(),
            Severity::High
        );
        assert_eq!(
            ValidationIssue::DisconnectedVertices { count: 3 }.severity(),
            Severity::Medium
        );
        assert_eq!(
            ValidationIssue::ExcessiveRoughness { value: 1.0 }.severity(),
            Severity::Low
        );
    }

    #[test]
    fn outcome_confidence_clamps() {
        let outcome = CheckOutcome::from_issues(vec![
            ValidationIssue::InvalidFaceConnectivity { faces: 1 },
            ValidationIssue::InvalidFaceConnectivity { faces: 2 },
            ValidationIssue::NonManifoldEdges { count: 1 },
        ]);
        assert_relative_eq!(outcome.confidence, 0.0);
        assert_relative_eq!(CheckOutcome::from_issues(vec![]).confidence, 1.0);
    }

    #[test]
    fn low_issues_keep_result_valid() {
        let result = ValidationResult::combine(
            FragmentId(1),
            Timestamp::default(),
            [
                CheckOutcome::from_issues(vec![]),
                CheckOutcome::from_issues(vec![]),
                CheckOutcome::from_issues(vec![]),
                CheckOutcome::from_issues(vec![ValidationIssue::PoorTriangleQuality { count: 4 }]),
            ],
        );
        assert!(result.is_valid);
        assert_eq!(result.max_severity(), Some(Severity::Low));
        assert_relative_eq!(result.confidence, (3.0 + 0.95) / 4.0);
        assert_eq!(result.recommendations.len(), 1);
    }

    #[test]
    fn display() {
        assert_eq!(
            ValidationIssue::DegenerateTriangles { count: 1 }.to_string(),
            "1 degenerate triangles"
        );
    }
}
